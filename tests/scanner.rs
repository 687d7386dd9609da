#[cfg(test)]
mod scanner_tests {
    use rox::error::ErrorKind;
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let tokens: Vec<Token> = scan(source).expect("source should scan");

        assert_eq!(tokens.len(), expected.len(), "tokens: {:?}", tokens);

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_arithmetic() {
        assert_token_sequence(
            "1 + 2 * 3;",
            &[
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::PLUS, "+"),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::STAR, "*"),
                (TokenType::NUMBER(3.0), "3"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_compound_and_optional_operators() {
        assert_token_sequence(
            "a += 1; b?.c %= 2; [x] != y",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::PLUS_EQUAL, "+="),
                (TokenType::NUMBER(1.0), "1"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::QUESTION_DOT, "?."),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::PERCENT_EQUAL, "%="),
                (TokenType::NUMBER(2.0), "2"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::LEFT_BRACKET, "["),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::RIGHT_BRACKET, "]"),
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::IDENTIFIER, "y"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_03_keywords_ignore_case() {
        assert_token_sequence(
            "VAR x = Nil; TypeOf x;",
            &[
                (TokenType::VAR, "VAR"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::EQUAL, "="),
                (TokenType::NIL, "Nil"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::TYPEOF, "TypeOf"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SEMICOLON, ";"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_comments_are_skipped() {
        assert_token_sequence(
            "a // line comment\n/* block\ncomment */ b",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_positions_are_one_based() {
        let tokens = scan("var a;\n  b /* x\n */ c").unwrap();

        let b = &tokens[3];
        assert_eq!(b.lexeme, "b");
        assert_eq!((b.line, b.column), (2, 3));

        let c = &tokens[4];
        assert_eq!(c.lexeme, "c");
        assert_eq!((c.line, c.column), (3, 5));
    }

    #[test]
    fn test_string_escapes_are_resolved() {
        let tokens = scan(r#""a\nb\"c" "\q""#).unwrap();

        match &tokens[0].token_type {
            TokenType::STRING(s) => assert_eq!(s, "a\nb\"c"),
            other => panic!("expected string, got {:?}", other),
        }

        match &tokens[1].token_type {
            TokenType::STRING(s) => assert_eq!(s, "\\q"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn test_token_display() {
        let tokens = scan("3 2.5 \"hi\" and").unwrap();
        let lines: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();

        assert_eq!(
            lines,
            vec![
                "NUMBER 3 3.0",
                "NUMBER 2.5 2.5",
                "STRING \"hi\" hi",
                "AND and null",
                "EOF  null",
            ]
        );
    }

    #[test]
    fn test_unterminated_string_reports_start() {
        let err = scan("x = \"abc").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Lexical);
        assert_eq!(
            err.to_string(),
            "[line 1, column 5] Syntax error: Unterminated string"
        );
    }

    #[test]
    fn test_unterminated_comment() {
        let err = scan("a\n  /* never closed").unwrap_err();

        assert_eq!(err.message(), Some("Unterminated comment"));
        assert_eq!((err.line(), err.column()), (Some(2), Some(3)));
    }

    #[test]
    fn test_invalid_characters() {
        let err = scan("a @ b").unwrap_err();
        assert_eq!(err.message(), Some("Invalid character '@'"));
        assert_eq!(err.column(), Some(3));

        let err = scan("a ? b").unwrap_err();
        assert_eq!(err.message(), Some("Invalid character '?'"));
    }

    #[test]
    fn test_iterator_stops_after_first_error() {
        let results: Vec<_> = Scanner::new(",.$(#").collect();

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(results[2].is_err());
    }
}
