//! Centralised error hierarchy for the **Rox interpreter**.
//!
//! Every pipeline stage (scanner, parser, resolver, runtime) converts its
//! failure modes into one of the variants defined here.  The four stage
//! variants are structurally identical: a message plus the 1‑based line and
//! column of the offending token.  This enables a uniform `Result<T>` alias
//! throughout the crate and ergonomic inter‑operation with `anyhow` in the CLI.
//!
//! The module **does not** print diagnostics itself

use std::io;
use thiserror::Error;

use log::debug;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Compile,
    Runtime,
    Io,
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error: invalid character, unterminated string or comment.
    #[error("[line {line}, column {column}] Syntax error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,

        /// 1‑based column where the error occurred.
        column: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}, column {column}] Parse error: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Static‑analysis failure reported by the resolver.
    #[error("[line {line}, column {column}] Compile error: {message}")]
    Resolve {
        message: String,
        line: usize,
        column: usize,
    },

    /// Runtime evaluation error.
    #[error("[line {line}, column {column}] Runtime error: {message}")]
    Runtime {
        message: String,
        line: usize,
        column: usize,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Lex error: {}:{} {}", line, column, message);

        LoxError::Lex {
            message,
            line,
            column,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Parse error: {}:{} {}", line, column, message);

        LoxError::Parse {
            message,
            line,
            column,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Resolve error: {}:{} {}", line, column, message);

        LoxError::Resolve {
            message,
            line,
            column,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        debug!("Creating Runtime error: {}:{} {}", line, column, message);

        LoxError::Runtime {
            message,
            line,
            column,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoxError::Lex { .. } => ErrorKind::Lexical,
            LoxError::Parse { .. } => ErrorKind::Syntax,
            LoxError::Resolve { .. } => ErrorKind::Compile,
            LoxError::Runtime { .. } => ErrorKind::Runtime,
            LoxError::Io(_) | LoxError::Utf8(_) => ErrorKind::Io,
        }
    }

    /// The bare message without the position prefix, if this is a stage error.
    pub fn message(&self) -> Option<&str> {
        match self {
            LoxError::Lex { message, .. }
            | LoxError::Parse { message, .. }
            | LoxError::Resolve { message, .. }
            | LoxError::Runtime { message, .. } => Some(message),
            LoxError::Io(_) | LoxError::Utf8(_) => None,
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.position().map(|(line, _)| line)
    }

    pub fn column(&self) -> Option<usize> {
        self.position().map(|(_, column)| column)
    }

    fn position(&self) -> Option<(usize, usize)> {
        match self {
            LoxError::Lex { line, column, .. }
            | LoxError::Parse { line, column, .. }
            | LoxError::Resolve { line, column, .. }
            | LoxError::Runtime { line, column, .. } => Some((*line, *column)),
            LoxError::Io(_) | LoxError::Utf8(_) => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_stage_and_position() {
        let err = LoxError::runtime(3, 14, "Operands must be numbers.");

        assert_eq!(
            err.to_string(),
            "[line 3, column 14] Runtime error: Operands must be numbers."
        );
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.column(), Some(14));
    }

    #[test]
    fn io_errors_have_no_position() {
        let err = LoxError::from(io::Error::new(io::ErrorKind::NotFound, "missing"));

        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.line(), None);
        assert_eq!(err.message(), None);
    }
}
