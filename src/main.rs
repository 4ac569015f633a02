use std::{fs, path::PathBuf, process};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use conker::{exit_code, failure_diagnostic, run_code};

#[derive(Parser, Debug)]
#[command(name = "conker")]
#[command(about = "Run a Conker program")]
#[command(version)]
struct Args {
    /// Conker source file to run
    #[arg(value_name = "FILE")]
    program: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let source = match fs::read_to_string(&args.program) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("conker: {}: {e}", args.program.display());
            process::exit(1);
        }
    };

    match run_code(&source) {
        Ok(results) => {
            if let Some(diagnostic) = failure_diagnostic(&results) {
                eprintln!("conker: {diagnostic}");
            }
            process::exit(exit_code(&results));
        }
        Err(e) => {
            eprintln!("conker: {e}");
            process::exit(1);
        }
    }
}
