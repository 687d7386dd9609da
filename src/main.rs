use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::slice;
use std::thread;

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast::Stmt;
use rox::ast_printer::AstPrinter;
use rox::error::{ErrorKind, LoxError};
use rox::interpreter::{Interpreter, DEFAULT_MAX_CALL_DEPTH};
use rox::parser::Parser;
use rox::resolver::Resolver;
use rox::scanner::{self, Scanner};
use rox::token::Token;

/// Stack for the interpreter thread; deep (but bounded) recursion in scripts
/// needs more than the platform default.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Rox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum nesting of function calls before a "Stack overflow." error
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a program and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Rox program
    Run { filename: PathBuf },
}

/// Maps the contents of a file into memory and validates it as UTF-8.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;

    // SAFETY: the map is read once, immediately copied, and dropped.
    let map = unsafe { Mmap::map(&file) }.context(format!("Failed to map file {:?}", filename))?;

    let source = std::str::from_utf8(&map)
        .context(format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

/// 65 for static errors, 70 for runtime errors, 74 for I/O.
fn exit_code(error: &LoxError) -> i32 {
    match error.kind() {
        ErrorKind::Lexical | ErrorKind::Syntax | ErrorKind::Compile => 65,
        ErrorKind::Runtime => 70,
        ErrorKind::Io => 74,
    }
}

fn report(error: LoxError) -> i32 {
    debug!("Reporting {:?} error", error.kind());
    eprintln!("{}", error);
    exit_code(&error)
}

fn tokenize(source: &str, json: bool) -> Result<i32> {
    if json {
        return match scanner::scan(source) {
            Ok(tokens) => {
                println!("{}", serde_json::to_string_pretty(&tokens)?);
                Ok(0)
            }
            Err(e) => Ok(report(e)),
        };
    }

    // Print every token up to the first error.
    for token in Scanner::new(source) {
        match token {
            Ok(token) => println!("{}", token),
            Err(e) => return Ok(report(e)),
        }
    }

    Ok(0)
}

fn parse(source: &str) -> Result<i32> {
    let outcome = scanner::scan(source).and_then(|tokens| Parser::new(&tokens).parse());

    match outcome {
        Ok(statements) => {
            println!("{}", AstPrinter::print_program(&statements));
            Ok(0)
        }
        Err(e) => Ok(report(e)),
    }
}

fn evaluate(source: &str, max_call_depth: usize) -> Result<i32> {
    let tokens: Vec<Token> = match scanner::scan(source) {
        Ok(tokens) => tokens,
        Err(e) => return Ok(report(e)),
    };

    let expr = match Parser::new(&tokens).parse_expression() {
        Ok(expr) => expr,
        Err(e) => return Ok(report(e)),
    };

    let program = Stmt::Expression(expr);
    if let Err(e) = Resolver::new().resolve_all(slice::from_ref(&program)) {
        return Ok(report(e));
    }

    let Stmt::Expression(expr) = &program else {
        return Err(anyhow!("expression statement expected"));
    };

    let mut interpreter =
        Interpreter::new(Box::new(io::stdout())).with_max_call_depth(max_call_depth);

    match interpreter.evaluate(expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
            Ok(0)
        }
        Err(e) => Ok(report(e)),
    }
}

fn run(source: &str, max_call_depth: usize) -> Result<i32> {
    let mut interpreter =
        Interpreter::new(Box::new(io::stdout())).with_max_call_depth(max_call_depth);

    match rox::run_with(&mut interpreter, source) {
        Ok(()) => {
            info!("Program executed successfully");
            Ok(0)
        }
        Err(e) => Ok(report(e)),
    }
}

fn dispatch(args: Cli) -> Result<i32> {
    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");
            tokenize(&read_source(&filename)?, json)
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");
            parse(&read_source(&filename)?)
        }

        Commands::Evaluate { filename } => {
            info!("Running Evaluate subcommand");
            evaluate(&read_source(&filename)?, args.max_call_depth)
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            run(&read_source(&filename)?, args.max_call_depth)
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let worker = thread::Builder::new()
        .name("rox-interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || dispatch(args))
        .context("Failed to spawn interpreter thread")?;

    let code: i32 = worker
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    io::stdout().flush()?;

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
