//! ReplikV - A Replicated Transactional Key-Value Store Simulator
//!
//! This is the main entry point for the ReplikV command-line driver.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use replikv::db::{Database, Runner, RunnerConfig};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut script: Option<PathBuf> = None;
    let mut execute: Option<String> = None;
    let mut verbose = false;
    let mut config = RunnerConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-e" | "--execute" => {
                i += 1;
                if i < args.len() {
                    execute = Some(args[i].clone());
                }
            }
            "--json" => {
                config.json = true;
            }
            "--echo" => {
                config.echo = true;
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("ReplikV v0.1.0");
                return ExitCode::SUCCESS;
            }
            arg => {
                if !arg.starts_with('-') {
                    script = Some(PathBuf::from(arg));
                } else {
                    eprintln!("Unknown option: {}", arg);
                    return ExitCode::FAILURE;
                }
            }
        }
        i += 1;
    }

    init_tracing(verbose);

    let db = Database::new();
    let mut runner = Runner::with_config(db, config);
    let mut stdout = io::stdout();

    let result = if let Some(command) = execute {
        runner.run_reader(command.as_bytes(), &mut stdout)
    } else if let Some(path) = script {
        runner.run_file(&path, &mut stdout)
    } else {
        let stdin = io::stdin();
        runner.run_reader(stdin.lock(), &mut stdout)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "replikv=debug" } else { "replikv=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_help() {
    println!("ReplikV - A Replicated Transactional Key-Value Store Simulator");
    println!();
    println!("Usage: replikv [OPTIONS] [SCRIPT]");
    println!();
    println!("Reads driver commands from SCRIPT, or from stdin when no script");
    println!("is given, one command per line:");
    println!("  begin(T1) beginRO(T2) R(T1,x4) W(T1,x4,101) end(T1)");
    println!("  fail(2) recover(2) dump()");
    println!();
    println!("Options:");
    println!("  -e, --execute CMD      Execute one command and exit");
    println!("      --echo             Echo each input line before its results");
    println!("      --json             Emit outcomes as JSON lines");
    println!("  -v, --verbose          Enable debug logging (stderr)");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Examples:");
    println!("  replikv script.txt              Run a script file");
    println!("  replikv -e 'dump()'             Print the initial cluster state");
    println!("  echo 'dump()' | replikv --json  JSON dump on stdout");
}
