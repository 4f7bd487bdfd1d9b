//! OpalDB command-line shell.
//!
//! # Usage
//!
//! ```bash
//! # Start the interactive shell
//! opal
//!
//! # Execute a single script string
//! opal -c "CREATE TABLE t (id INT PRIMARY KEY); SELECT * FROM t;"
//!
//! # Execute statements from a file
//! opal -f setup.sql
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use opal_sql::Session;

mod formatter;
mod repl;

use repl::Repl;

/// OpalDB command-line shell
#[derive(Parser, Debug)]
#[command(
    name = "opal",
    version,
    about = "Interactive SQL shell for OpalDB",
    long_about = "An interactive shell over an in-memory OpalDB session.\n\n\
                  Statements are executed in order; use it for interactive\n\
                  sessions or for running SQL scripts."
)]
struct Args {
    /// Execute a single SQL script string and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Execute SQL statements from a file and exit
    #[arg(short = 'f', long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Suppress the banner (for scripting)
    #[arg(short = 'q', long)]
    quiet: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    if let Some(command) = &args.command {
        execute_command(command)
    } else if let Some(file) = &args.file {
        execute_file(file)
    } else {
        run_repl(args.quiet)
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("opal_cli=debug,opal_sql=debug")
    } else {
        EnvFilter::new("opal_cli=warn,opal_sql=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn execute_command(sql: &str) -> Result<()> {
    let mut repl = Repl::new(Session::new())?;
    repl.execute_and_print(sql);
    Ok(())
}

fn execute_file(path: &PathBuf) -> Result<()> {
    let mut repl = Repl::new(Session::new())?;
    let response = repl.session_mut().parse_file(path).clone();
    if response.failed() {
        anyhow::bail!("{}", response.error);
    }
    println!("{}", formatter::format_response(&response));
    println!("({} rows)", response.records.len());
    Ok(())
}

fn run_repl(quiet: bool) -> Result<()> {
    let mut repl = Repl::new(Session::new())?;
    if !quiet {
        repl.print_banner();
    }
    repl.run()
}
