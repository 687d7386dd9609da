//! Rox: a tree‑walking interpreter for a small dynamically‑typed scripting
//! language with closures, classes, single inheritance and arrays.
//!
//! The pipeline is `scanner → parser → resolver → interpreter`; each stage
//! reports failures as a positioned [`LoxError`](error::LoxError).

use std::io::Write;

use log::info;

pub mod ast;
pub mod ast_printer;
pub mod builtins;
pub mod environment;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use error::Result;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;

/// Scans, parses, resolves and executes `source` with a fresh interpreter
/// whose output goes to `out`.
pub fn run(source: &str, out: Box<dyn Write>) -> Result<()> {
    let mut interpreter = Interpreter::new(out);
    run_with(&mut interpreter, source)
}

/// Like [`run`], on a caller‑configured interpreter.  Nothing executes
/// unless every static stage succeeds.
pub fn run_with(interpreter: &mut Interpreter, source: &str) -> Result<()> {
    let tokens = scanner::scan(source)?;
    info!("Scanned {} tokens", tokens.len());

    let statements = Parser::new(&tokens).parse()?;
    Resolver::new().resolve_all(&statements)?;

    interpreter.execute(&statements)
}
