//! Module `scanner` implements a one‑pass, streaming lexer for the Rox language.
//!
//! It transforms a UTF‑8 source string into a sequence of [`Token`]s, skipping
//! whitespace and comments, and emitting exactly one `EOF` token at the end.
//! Designed as a `FusedIterator`, it can be chained safely with other iterator
//! adapters.
//!
//! # Public API
//!
//! - `scan(source: &str) -> Result<Vec<Token>>`
//!   Tokenize a whole source text, aborting at the first lexical error.
//!
//! - `Scanner::new(src: &'a str) -> Scanner<'a>`
//!   Create a new lexer over the input buffer.
//!
//! - `impl Iterator for Scanner<'a>`
//!   Yields `Result<Token, LoxError>` on each `.next()`.  A lexical error is
//!   fatal: the scanner yields it once and then terminates.
//!
//! # Token Recognition (`scan_token`)
//!
//! - Single‑character tokens: `(`, `)`, `{`, `}`, `[`, `]`, `,`, `.`, `;`.
//! - One‑or‑two character operators: `+ += - -= * *= / /= % %= ! != = == < <= > >= ?.`.
//! - String literals: `"` … `"`, multi‑line, with `\" \\ \n \r \t` escapes
//!   resolved in place; unknown escapes are kept verbatim.
//! - Numeric literals: integer and optional fractional part (no exponent/hex).
//! - Identifiers/keywords: ASCII alphanumeric/_ sequences; keywords are matched
//!   case‑insensitively through a perfect‑hash `KEYWORDS` map.
//! - Comments: `//` to end of line and non‑nesting `/* … */` blocks.
//! - Errors: any other character, an unterminated string or an unterminated
//!   block comment yields `LoxError::Lex` with the 1‑based line and column.
//!
//! # Performance
//!
//! - Bulk comment skipping via `memchr`/`memmem` for rapid terminator search.
//! - `#[inline(always)]` on hot path helpers.

use crate::error::{LoxError, Result};
use crate::token::{Token, TokenType};
use log::{debug, info};
use memchr::{memchr, memchr_iter, memmem};
use phf::phf_map;
use std::iter::FusedIterator;

// ─────────────────────────────────────────────────────────────────────────────
// Static keyword map (compile‑time perfect hash, lowercase keys)
// ─────────────────────────────────────────────────────────────────────────────

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and"    => TokenType::AND,
    "class"  => TokenType::CLASS,
    "else"   => TokenType::ELSE,
    "false"  => TokenType::FALSE,
    "for"    => TokenType::FOR,
    "fun"    => TokenType::FUN,
    "if"     => TokenType::IF,
    "nil"    => TokenType::NIL,
    "or"     => TokenType::OR,
    "return" => TokenType::RETURN,
    "super"  => TokenType::SUPER,
    "this"   => TokenType::THIS,
    "true"   => TokenType::TRUE,
    "typeof" => TokenType::TYPEOF,
    "var"    => TokenType::VAR,
    "while"  => TokenType::WHILE,
};

/// Tokenize `source` completely.  The returned vector always ends in `EOF`.
pub fn scan(source: &str) -> Result<Vec<Token>> {
    let tokens: Vec<Token> = Scanner::new(source).collect::<Result<Vec<Token>>>()?;

    info!("Scanned {} token(s)", tokens.len());

    Ok(tokens)
}

/// Is `b` a UTF‑8 continuation byte (does not start a new character)?
#[inline(always)]
const fn is_continuation(b: u8) -> bool {
    b & 0xC0 == 0x80
}

/// A single pass **scanner / lexer** that converts source text into a
/// sequence of [`Token`]s.
pub struct Scanner<'a> {
    src: &'a str,               // entire source text
    start: usize,               // byte index of the *first* byte of the current lexeme
    curr: usize,                // byte index *one past* the last byte examined
    line: usize,                // 1‑based line counter (\n increments)
    column: usize,              // 1‑based column of `curr` (resets after \n)
    start_line: usize,          // position of `start`, reported on the token
    start_column: usize,
    pending: Option<TokenType>, // recognised token kind waiting to be emitted
    finished: bool,             // EOF emitted or fatal error reported
}

impl<'a> Scanner<'a> {
    /// Create a new lexer over `src`.
    #[inline]
    pub fn new(src: &'a str) -> Self {
        info!("Scanner created over {} bytes", src.len());

        Self {
            src,
            start: 0,
            curr: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
            pending: None,
            finished: false,
        }
    }

    // ───────────────────────────── primitive helpers ────────────────────────

    #[inline(always)]
    fn bytes(&self) -> &'a [u8] {
        self.src.as_bytes()
    }

    /// Are we at (or past) the end of input?
    #[inline(always)]
    fn is_at_end(&self) -> bool {
        self.curr >= self.src.len()
    }

    /// Advance one byte and return it, keeping line and column current.
    /// Higher‑level code always guards with [`is_at_end`].
    #[inline(always)]
    fn advance(&mut self) -> u8 {
        let b = self.bytes()[self.curr];
        self.curr += 1;

        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else if !is_continuation(b) {
            self.column += 1;
        }

        b
    }

    /// Peek at the current byte without consuming it.  Returns `0` if past EOF
    /// to avoid branching at call‑site.
    #[inline(always)]
    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.bytes()[self.curr]
        }
    }

    /// Peek one byte beyond [`peek`].  Safe at EOF.
    #[inline(always)]
    fn peek_next(&self) -> u8 {
        if self.curr + 1 >= self.src.len() {
            0
        } else {
            self.bytes()[self.curr + 1]
        }
    }

    /// Conditionally consume a byte **iff** it matches `expected`.
    #[inline(always)]
    fn match_byte(&mut self, expected: u8) -> bool {
        if !self.is_at_end() && self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Jump to byte index `end`, updating line and column for the skipped span.
    fn skip_to(&mut self, end: usize) {
        let skipped: &[u8] = &self.bytes()[self.curr..end];
        let newlines: Vec<usize> = memchr_iter(b'\n', skipped).collect();

        let tail: &[u8] = match newlines.last() {
            Some(&last) => {
                self.line += newlines.len();
                self.column = 1;
                &skipped[last + 1..]
            }
            None => skipped,
        };

        self.column += tail.iter().filter(|b| !is_continuation(**b)).count();
        self.curr = end;
    }

    fn error_at_start<S: Into<String>>(&self, message: S) -> LoxError {
        LoxError::lex(self.start_line, self.start_column, message)
    }

    // ───────────────────────────── core lexing ─────────────────────────────

    /// Scan a *single* token starting at `self.curr`.  If the lexeme produces an
    /// actual token the kind is stored in `self.pending`.  Whitespace and
    /// comments are skipped by returning `Ok(())` with `pending = None`.
    fn scan_token(&mut self) -> Result<()> {
        let b = self.advance();

        let tt: TokenType = match b {
            // ── single‑character punctuators ──────────────────────────────
            b'(' => TokenType::LEFT_PAREN,
            b')' => TokenType::RIGHT_PAREN,
            b'{' => TokenType::LEFT_BRACE,
            b'}' => TokenType::RIGHT_BRACE,
            b'[' => TokenType::LEFT_BRACKET,
            b']' => TokenType::RIGHT_BRACKET,
            b',' => TokenType::COMMA,
            b'.' => TokenType::DOT,
            b';' => TokenType::SEMICOLON,

            // ── one‑or‑two character operators ───────────────────────────
            b'-' => self.either(b'=', TokenType::MINUS_EQUAL, TokenType::MINUS),
            b'+' => self.either(b'=', TokenType::PLUS_EQUAL, TokenType::PLUS),
            b'*' => self.either(b'=', TokenType::STAR_EQUAL, TokenType::STAR),
            b'%' => self.either(b'=', TokenType::PERCENT_EQUAL, TokenType::PERCENT),
            b'!' => self.either(b'=', TokenType::BANG_EQUAL, TokenType::BANG),
            b'=' => self.either(b'=', TokenType::EQUAL_EQUAL, TokenType::EQUAL),
            b'<' => self.either(b'=', TokenType::LESS_EQUAL, TokenType::LESS),
            b'>' => self.either(b'=', TokenType::GREATER_EQUAL, TokenType::GREATER),

            b'?' => {
                if !self.match_byte(b'.') {
                    return Err(self.error_at_start("Invalid character '?'"));
                }

                TokenType::QUESTION_DOT
            }

            // ── whitespace / newline ─────────────────────────────────────
            b' ' | b'\r' | b'\t' | b'\n' => {
                return Ok(()); // skip insignificants
            }

            // ── comments or slash operators ──────────────────────────────
            b'/' => {
                if self.match_byte(b'/') {
                    // Fast‑forward to the next newline; the newline itself is
                    // consumed by the main loop so line tracking stays in one place.
                    let end: usize = match memchr(b'\n', &self.bytes()[self.curr..]) {
                        Some(pos) => self.curr + pos,
                        None => self.src.len(),
                    };
                    self.skip_to(end);

                    return Ok(());
                }

                if self.match_byte(b'*') {
                    return self.skip_block_comment();
                }

                self.either(b'=', TokenType::SLASH_EQUAL, TokenType::SLASH)
            }

            // ── string literal " … " ─────────────────────────────────────
            b'"' => self.parse_string()?,

            // ── number literal (digit‑leading) ───────────────────────────
            b'0'..=b'9' => self.parse_number(),

            // ── identifiers / keywords (alpha or underscore‑leading) ─────
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.parse_identifier(),

            // ── unexpected character ─────────────────────────────────────
            _ => {
                let ch: char = self.src[self.start..].chars().next().unwrap_or('\u{FFFD}');

                return Err(self.error_at_start(format!("Invalid character '{}'", ch)));
            }
        };

        self.pending = Some(tt);

        Ok(())
    }

    /// `second` if the next byte is `expected` (consuming it), otherwise `single`.
    #[inline(always)]
    fn either(&mut self, expected: u8, second: TokenType, single: TokenType) -> TokenType {
        if self.match_byte(expected) {
            second
        } else {
            single
        }
    }

    /// Skip a `/* … */` comment whose opener has already been consumed.
    fn skip_block_comment(&mut self) -> Result<()> {
        match memmem::find(&self.bytes()[self.curr..], b"*/") {
            Some(pos) => {
                let end: usize = self.curr + pos + 2;
                self.skip_to(end);

                Ok(())
            }
            None => Err(self.error_at_start("Unterminated comment")),
        }
    }

    /// Parse a double‑quoted string literal, resolving escape sequences.
    ///
    /// * `self.start` still points to the opening `"`.
    /// * When we return, `self.curr` points **past** the closing `"`.
    fn parse_string(&mut self) -> Result<TokenType> {
        let mut buf: Vec<u8> = Vec::new();

        while !self.is_at_end() && self.peek() != b'"' {
            let b = self.advance();

            if b == b'\\' {
                let escaped: Option<u8> = match self.peek() {
                    b'"' => Some(b'"'),
                    b'\\' => Some(b'\\'),
                    b'n' => Some(b'\n'),
                    b'r' => Some(b'\r'),
                    b't' => Some(b'\t'),
                    _ => None,
                };

                if let Some(resolved) = escaped {
                    self.advance();
                    buf.push(resolved);
                    continue;
                }
            }

            buf.push(b);
        }

        if self.is_at_end() {
            return Err(self.error_at_start("Unterminated string"));
        }

        self.advance(); // consume closing quote

        // Only ASCII escape pairs were rewritten, so the bytes stay valid UTF‑8.
        let s: String = String::from_utf8(buf)?;

        Ok(TokenType::STRING(s))
    }

    /// Parse a numeric literal (`123`, `3.14`).  Fractions are optional.
    fn parse_number(&mut self) -> TokenType {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Optional fractional part.
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance(); // consume "."

            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let s: &str = &self.src[self.start..self.curr];
        let n: f64 = s.parse::<f64>().unwrap_or(0.0); // parse never fails (checked digits)

        TokenType::NUMBER(n)
    }

    /// Parse an identifier and decide if it is a **keyword** or a generic
    /// `IDENTIFIER` token.  Keywords are case‑insensitive.
    fn parse_identifier(&mut self) -> TokenType {
        while {
            let c: u8 = self.peek();
            c.is_ascii_alphanumeric() || c == b'_'
        } {
            self.advance();
        }

        let lowered: String = self.src[self.start..self.curr].to_ascii_lowercase();

        KEYWORDS
            .get(lowered.as_str())
            .cloned()
            .unwrap_or(TokenType::IDENTIFIER)
    }
}

// ───────────────────────── Iterator implementation ─────────────────────────

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        // Loop until we either emit a token, hit EOF, or see an error.
        loop {
            // 1. EOF guard – emit exactly one EOF then terminate.
            if self.is_at_end() {
                self.finished = true;
                return Some(Ok(Token::new(TokenType::EOF, "", self.line, self.column)));
            }

            // 2. Reset per‑token state.
            self.start = self.curr;
            self.start_line = self.line;
            self.start_column = self.column;
            self.pending = None;

            // 3. Attempt to scan a token.  Lexical errors are fatal.
            if let Err(e) = self.scan_token() {
                self.finished = true;
                return Some(Err(e));
            }

            // 4. If a real token was recognised, build and return it.
            if let Some(tt) = self.pending.take() {
                let lexeme: &str = &self.src[self.start..self.curr];
                debug!("Scanned token ({}) at {}:{}", tt.name(), self.start_line, self.start_column);

                return Some(Ok(Token::new(tt, lexeme, self.start_line, self.start_column)));
            }
            // Otherwise it was whitespace / comment → continue loop.
        }
    }
}

impl<'a> FusedIterator for Scanner<'a> {}
