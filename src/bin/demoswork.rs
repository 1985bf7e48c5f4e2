use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use demoswork::Executor;
use demoswork::actions::builtin::FixtureHandler;
use demoswork::actions::http::Web2Handler;
use demoswork::config::{Settings, load_settings};
use demoswork::document::loader::load_script;
use demoswork::dsl::{Operation, StepKind};
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a script document without running it
    Validate {
        /// Path to the script (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// Print the steps and operations of a script
    Inspect {
        /// Path to the script (.json, .yaml or .yml)
        file: PathBuf,
    },

    /// Execute a script and print the results map as JSON
    Run {
        /// Path to the script (.json, .yaml or .yml)
        file: PathBuf,

        /// Settings file (YAML)
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
}

fn build_executor(settings: &Settings) -> Result<Executor> {
    let mut executor = Executor::new();
    for kind in [StepKind::Xm, StepKind::Native, StepKind::Web2] {
        executor.register_handler(Arc::new(FixtureHandler::new(kind, settings.fixtures.clone())));
    }
    if settings.live_web2 {
        info!(timeout_secs = settings.http.timeout_secs, "Sending live web2 requests");
        executor.register_handler(Arc::new(Web2Handler::with_timeout(settings.http.timeout())?));
    }
    Ok(executor)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { file } => {
            let script = load_script(&file)?;
            println!(
                "{}: ok ({} steps, {} operations)",
                file.display(),
                script.steps().len(),
                script.operations().len()
            );
        }

        Commands::Inspect { file } => {
            let script = load_script(&file)?;
            println!("Steps:");
            for step in script.steps().values() {
                println!("  {} [{}] {}", step.id, step.kind(), step.description.as_deref().unwrap_or(""));
            }
            println!("Operations:");
            for operation in script.operations().values() {
                match operation {
                    Operation::Base(op) => println!("  {} base, {} items", op.id, op.order.len()),
                    Operation::Conditional(op) => println!(
                        "  {} conditional, {} conditions{}",
                        op.id,
                        op.order.len(),
                        if op.default.is_some() { ", with default" } else { "" }
                    ),
                }
            }
            println!("Root order:");
            for item in script.root_order() {
                println!("  {} {}", item.kind, item.uid);
            }
        }

        Commands::Run { file, config } => {
            let settings = match config {
                Some(path) => load_settings(&path)?,
                None => Settings::default(),
            };
            let script = load_script(&file)?;
            let executor = build_executor(&settings)?;

            info!("Running {}", file.display());
            let report = executor.execute(&script).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
