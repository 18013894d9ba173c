use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use rlox::ast_printer::AstPrinter;
use rlox::parser::Parser;
use rlox::scanner::{scan_tokens, Scanner};
use rlox::session::{EXIT_STATIC_ERROR, EXIT_USAGE};
use rlox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about = "Lox language interpreter", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    commands: Option<Commands>,

    /// Script to run; starts the REPL when omitted
    script: Option<PathBuf>,

    /// Enable logging to rlox.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the token stream as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Lox program
    Run { filename: PathBuf },

    /// Starts an interactive prompt
    Repl,
}

/// Memory‑maps a source file and copies it out as UTF‑8 text.
fn read_source(filename: &Path) -> Result<String> {
    info!("Reading file: {:?}", filename);

    let file = File::open(filename).with_context(|| format!("Failed to open file {:?}", filename))?;

    let len: u64 = file
        .metadata()
        .with_context(|| format!("Failed to stat file {:?}", filename))?
        .len();

    // Mapping a zero-length file fails on some platforms.
    if len == 0 {
        return Ok(String::new());
    }

    // SAFETY: the map is read-only and copied out before it is dropped.
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("Failed to map file {:?}", filename))?;

    let text: &str = std::str::from_utf8(&map)
        .map_err(rlox::error::LoxError::from)
        .with_context(|| format!("File {:?} is not valid UTF-8", filename))?;

    info!("Read {} bytes from {:?}", len, filename);

    Ok(text.to_owned())
}

fn init_logger() -> Result<()> {
    let log_file = File::create("rlox.log").context("Failed to create rlox.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("rlox::")
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
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized, writing to rlox.log");
    Ok(())
}

fn tokenize(filename: &Path, json: bool) -> Result<i32> {
    let source = read_source(filename)?;

    if json {
        let (tokens, errors) = scan_tokens(&source);

        for e in &errors {
            eprintln!("{}", e);
        }

        println!("{}", serde_json::to_string_pretty(&tokens)?);

        return Ok(if errors.is_empty() { 0 } else { EXIT_STATIC_ERROR });
    }

    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => println!("{}", token),

            Err(e) => {
                tokenized = false;
                eprintln!("{}", e);
            }
        }
    }

    Ok(if tokenized { 0 } else { EXIT_STATIC_ERROR })
}

fn parse(filename: &Path) -> Result<i32> {
    let source = read_source(filename)?;
    let (tokens, errors) = scan_tokens(&source);

    for e in &errors {
        eprintln!("{}", e);
    }

    let mut parser = Parser::new(&tokens);

    match parser.parse_expression() {
        Ok(expr) if errors.is_empty() => {
            let ast_str = AstPrinter::print(&expr);
            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
            Ok(0)
        }

        Ok(_) => Ok(EXIT_STATIC_ERROR),

        Err(e) => {
            eprintln!("{}", e);
            Ok(EXIT_STATIC_ERROR)
        }
    }
}

fn evaluate(filename: &Path) -> Result<i32> {
    let source = read_source(filename)?;
    let mut lox = Lox::new();

    if let Some(value) = lox.evaluate_expression(&source)? {
        debug!("Evaluated to: {}", value);
        println!("{}", value);
    }

    Ok(lox.exit_code().unwrap_or(0))
}

fn run(filename: &Path) -> Result<i32> {
    let source = read_source(filename)?;
    let mut lox = Lox::new();

    lox.run(&source)?;

    Ok(lox.exit_code().unwrap_or(0))
}

fn repl() -> Result<i32> {
    info!("Starting REPL");

    let mut lox = Lox::new();
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            break;
        }

        lox.run(&line)?;
        lox.reset_error();
    }

    Ok(0)
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() { EXIT_USAGE } else { 0 };
            e.print()?;
            std::process::exit(code);
        }
    };

    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let code: i32 = match (args.commands, args.script) {
        (Some(Commands::Tokenize { filename, json }), _) => tokenize(&filename, json)?,
        (Some(Commands::Parse { filename }), _) => parse(&filename)?,
        (Some(Commands::Evaluate { filename }), _) => evaluate(&filename)?,
        (Some(Commands::Run { filename }), _) | (None, Some(filename)) => run(&filename)?,
        (Some(Commands::Repl), _) | (None, None) => repl()?,
    };

    debug!("Exiting with code {}", code);

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
