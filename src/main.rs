use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rox::ast_printer::AstPrinter;
use rox::error::LoxError;
use rox::interpreter::Interpreter;
use rox::parser::{parse, Parser};
use rox::resolver::resolve;
use rox::scanner::{scan, Scanner};
use rox::token::Token;

/// Exit status for lexical, syntax and resolution errors.
const EXIT_STATIC: i32 = 65;

/// Exit status for runtime errors.
const EXIT_RUNTIME: i32 = 70;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: Option<PathBuf>,

        /// Print the tokens as a JSON array instead
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a program and prints its AST
    Parse { filename: Option<PathBuf> },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: Option<PathBuf> },

    /// Runs input from a file as a Lox program (starts a REPL without a file)
    Run { filename: Option<PathBuf> },

    /// Starts an interactive session
    Repl,
}

/// Outcome of running one unit of source.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Success,
    StaticError,
    RuntimeError,
}

/// Reads a source file through a read-only memory map.
fn read_file(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read-only and dropped before this function returns;
    // the contents are copied out first.
    let mmap = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map file {:?}", filename))?;

    let source = std::str::from_utf8(&mmap)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?
        .to_owned();

    info!("Read {} bytes from {:?}", source.len(), filename);

    Ok(source)
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'rox::' from module path
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

fn report(errors: &[LoxError]) {
    for e in errors {
        debug!("Reporting diagnostic: {}", e);
        eprintln!("{}", e);
    }
}

/// Scans, parses, resolves and runs `source` as one unit on `interpreter`.
/// Nothing executes if any static stage reported an error.
fn run_source(source: &str, interpreter: &mut Interpreter) -> Outcome {
    let (tokens, lex_errors) = scan(source);
    let (statements, parse_errors) = parse(&tokens);

    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        report(&lex_errors);
        report(&parse_errors);
        return Outcome::StaticError;
    }

    info!("Parsed {} statements", statements.len());

    let (locals, resolve_errors) = resolve(&statements);
    if !resolve_errors.is_empty() {
        report(&resolve_errors);
        return Outcome::StaticError;
    }

    interpreter.resolve(locals);

    match interpreter.interpret(&statements) {
        Ok(()) => {
            info!("Program executed successfully");
            Outcome::Success
        }
        Err(e) => {
            debug!("Runtime debug: {}", e);
            eprintln!("{}", e);
            Outcome::RuntimeError
        }
    }
}

fn tokenize(filename: &Path, json: bool) -> Result<()> {
    info!("Running Tokenize subcommand");
    let source = read_file(filename)?;

    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", rendered);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_STATIC);
        process::exit(EXIT_STATIC);
    }

    info!("Tokenization completed successfully");
    Ok(())
}

fn parse_program(filename: &Path) -> Result<()> {
    info!("Running Parse subcommand");
    let source = read_file(filename)?;

    let (tokens, lex_errors) = scan(&source);
    let (statements, parse_errors) = parse(&tokens);

    if !lex_errors.is_empty() || !parse_errors.is_empty() {
        report(&lex_errors);
        report(&parse_errors);
        process::exit(EXIT_STATIC);
    }

    for stmt in &statements {
        let ast_str = AstPrinter::print_stmt(stmt);
        debug!("AST: {}", ast_str);
        println!("{}", ast_str);
    }

    info!("Parse subcommand completed");
    Ok(())
}

fn evaluate(filename: &Path) -> Result<()> {
    info!("Running Evaluate subcommand");
    let source = read_file(filename)?;

    let (tokens, lex_errors) = scan(&source);
    let (expr, parse_errors) = Parser::new(&tokens).parse_expression();

    let expr = match expr {
        Some(expr) if lex_errors.is_empty() && parse_errors.is_empty() => expr,
        _ => {
            report(&lex_errors);
            report(&parse_errors);
            process::exit(EXIT_STATIC);
        }
    };

    debug!("AST: {}", AstPrinter::print(&expr));

    let mut interpreter = Interpreter::new();

    match interpreter.evaluate_expression(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
        }

        Err(e) => {
            debug!("Evaluation debug: {}", e);
            eprintln!("{}", e);
            process::exit(EXIT_RUNTIME);
        }
    }

    info!("Evaluate subcommand completed");
    Ok(())
}

fn run_file(filename: &Path) -> Result<()> {
    info!("Running Run subcommand");
    let source = read_file(filename)?;
    info!("Provided input:\n {}", source);

    let mut interpreter = Interpreter::new();

    match run_source(&source, &mut interpreter) {
        Outcome::Success => Ok(()),
        Outcome::StaticError => process::exit(EXIT_STATIC),
        Outcome::RuntimeError => process::exit(EXIT_RUNTIME),
    }
}

/// One persistent interpreter; every line is its own unit, and errors are
/// reported without ending the session.
fn repl() -> Result<()> {
    info!("Starting REPL");

    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush prompt")?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line.context("Failed to read line")?;

        let outcome = run_source(&line, &mut interpreter);
        debug!("REPL line finished: {:?}", outcome);
    }

    info!("REPL finished");
    Ok(())
}

fn no_input() -> Result<()> {
    println!("No input filepath was provided. Exiting...");
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => match filename {
            Some(filename) => tokenize(&filename, json),
            None => no_input(),
        },

        Commands::Parse { filename } => match filename {
            Some(filename) => parse_program(&filename),
            None => no_input(),
        },

        Commands::Evaluate { filename } => match filename {
            Some(filename) => evaluate(&filename),
            None => no_input(),
        },

        Commands::Run { filename } => match filename {
            Some(filename) => run_file(&filename),
            None => repl(),
        },

        Commands::Repl => repl(),
    }
}
