#[cfg(test)]
mod parser_tests {
    use rox::ast::{Expr, Stmt};
    use rox::ast_printer::AstPrinter;
    use rox::error::{ErrorKind, LoxError};
    use rox::parser::Parser;
    use rox::scanner::scan;

    fn parse_program(source: &str) -> Result<Vec<Stmt>, LoxError> {
        let tokens = scan(source)?;
        Parser::new(&tokens).parse()
    }

    fn parse_expr(source: &str) -> Result<Expr, LoxError> {
        let tokens = scan(source)?;
        Parser::new(&tokens).parse_expression()
    }

    fn printed_expr(source: &str) -> String {
        AstPrinter::print(&parse_expr(source).expect("expression should parse"))
    }

    fn printed_program(source: &str) -> String {
        AstPrinter::print_program(&parse_program(source).expect("program should parse"))
    }

    fn parse_error(source: &str) -> LoxError {
        let err = parse_program(source).expect_err("program should not parse");
        assert_eq!(err.kind(), ErrorKind::Syntax);
        err
    }

    #[test]
    fn test_precedence() {
        assert_eq!(printed_expr("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(printed_expr("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
        assert_eq!(printed_expr("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(printed_expr("-a % 2 == 1"), "(== (% (- a) 2) 1)");
        assert_eq!(printed_expr("a or b and !c"), "(or a (and b (! c)))");
        assert_eq!(printed_expr("1 < 2 != false"), "(!= (< 1 2) false)");
    }

    #[test]
    fn test_typeof_binds_tighter_than_factor() {
        assert_eq!(printed_expr("typeof 1 + 2"), "(+ (typeof 1) 2)");
        assert_eq!(printed_expr("typeof -x"), "(typeof (- x))");
    }

    #[test]
    fn test_calls_properties_and_arrays() {
        assert_eq!(printed_expr("f(1, 2)(3)"), "(call (call f 1 2) 3)");
        assert_eq!(printed_expr("a.b?.c"), "(?. (. a b) c)");
        assert_eq!(printed_expr("[1, \"two\", []]"), "[1 \"two\" []]");
        assert_eq!(
            printed_expr("fun (a, b) { return a; }"),
            "(fun (a, b) { (return a) })"
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(printed_expr("a = b = 1"), "(= a (= b 1))");
        assert_eq!(printed_expr("a.b = 2"), "(= (. a b) 2)");
    }

    #[test]
    fn test_compound_assignment_desugars() {
        assert_eq!(printed_expr("x += 2"), "(= x (+ x 2))");
        assert_eq!(printed_expr("x %= 3"), "(= x (% x 3))");
        assert_eq!(printed_expr("a.b -= 1"), "(= (. a b) (- (. a b) 1))");
    }

    #[test]
    fn test_for_desugars_to_while() {
        assert_eq!(
            printed_program("for (var i = 0; i < 3; i = i + 1) f(i);"),
            "{ (var i 0) (while (< i 3) { (call f i); (= i (+ i 1)); }) }"
        );

        assert_eq!(printed_program("for (;;) f();"), "(while true (call f);)");
    }

    #[test]
    fn test_declarations() {
        assert_eq!(
            printed_program("class B < A { init(x) { this.x = x; } get() { return super.get(); } }"),
            "(class B < A (method init(x) { (= (. this x) x); }) (method get() { (return (call (super get))) }))"
        );

        assert_eq!(
            printed_program("var a; if (a) b(); else { c(); }"),
            "(var a)\n(if a (call b); { (call c); })"
        );
    }

    #[test]
    fn test_parameter_and_argument_caps() {
        let names: Vec<String> = (0..255).map(|i| format!("p{}", i)).collect();
        let ok = format!("fun f({}) {{}}", names.join(", "));
        assert!(parse_program(&ok).is_ok());

        let names: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let too_many = format!("fun f({}) {{}}", names.join(", "));
        assert_eq!(
            parse_error(&too_many).message(),
            Some("Can't have more than 255 parameters.")
        );

        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let call = format!("f({});", args.join(", "));
        assert_eq!(
            parse_error(&call).message(),
            Some("Can't have more than 255 arguments.")
        );
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        let err = parse_error("var a = 1\nvar b = 2;");
        assert_eq!(err.message(), Some("Expect ';' after variable declaration."));
        assert_eq!((err.line(), err.column()), (Some(2), Some(1)));

        assert_eq!(
            parse_error("1 = 2;").message(),
            Some("Invalid assignment target.")
        );
        assert_eq!(
            parse_error("(a + b) += 1;").message(),
            Some("Invalid assignment target.")
        );
        assert_eq!(parse_error("a b;").message(), Some("Expect ';' after expression."));
        assert_eq!(parse_error("var x = ;").message(), Some("Expect expression."));
    }

    #[test]
    fn test_expression_mode_rejects_trailing_tokens() {
        let err = parse_expr("1 + 2 3").unwrap_err();
        assert_eq!(err.message(), Some("Expect end of expression."));
    }
}
