//! Technique CLI - check and run procedure files
//!
//! `check` compiles a file and reports the first diagnostic. `run` compiles
//! and evaluates it with the standard builtins.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use technique::runtime::{RuntimeConfig, load_or_init_config};
use technique::{Evaluator, Registry, Source, Subroutine, compile};

/// Exit code for a procedure that failed while running
const RUNTIME_FAILURE: i32 = 64;

#[derive(Parser)]
#[command(name = "technique")]
#[command(about = "Compile and run Technique procedures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a file and report problems
    Check {
        /// Procedure file
        file: PathBuf,

        /// Print the compiled steps as JSON
        #[arg(long)]
        emit_ir: bool,
    },

    /// Compile and evaluate a file
    Run {
        /// Procedure file
        file: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Runtime configuration file, created with defaults if missing
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Run {
            config: Some(path), ..
        } => load_or_init_config(path)?,
        _ => RuntimeConfig::default(),
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(config.log_level().parse()?),
        )
        .init();

    let registry = Arc::new(Registry::standard());

    match cli.command {
        Commands::Check { file, emit_ir } => {
            let subroutine = compile_or_exit(&file, Arc::clone(&registry))?;
            if emit_ir {
                let json = serde_json::to_string_pretty(&subroutine)
                    .context("Failed to serialize compiled procedure")?;
                println!("{}", json);
            } else {
                println!(
                    "{}: ok ({} steps, {} procedures)",
                    file.display(),
                    subroutine.sequence.len(),
                    subroutine.library.len()
                );
            }
        }

        Commands::Run { file, json, .. } => {
            let subroutine = compile_or_exit(&file, Arc::clone(&registry))?;
            let evaluator = Evaluator::new(registry);
            match evaluator.evaluate_blocking(&subroutine, &config)? {
                Ok(value) if json => {
                    let json = serde_json::to_string_pretty(&value)
                        .context("Failed to serialize result")?;
                    println!("{}", json);
                }
                Ok(value) => println!("{}", value),
                Err(failure) => {
                    eprintln!("{}: {}", file.display(), failure);
                    process::exit(RUNTIME_FAILURE);
                }
            }
        }
    }

    Ok(())
}

/// Compile `path`, exiting with the failure's code after printing its diagnostic.
fn compile_or_exit(path: &Path, registry: Arc<Registry>) -> Result<Subroutine> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("Failed to read file: {:?}", path))?;
    let source = Source::new(contents, path);
    match compile(&source, registry) {
        Ok(subroutine) => Ok(subroutine),
        Err(error) => {
            eprintln!("{}", error.render());
            process::exit(error.exit_code());
        }
    }
}
