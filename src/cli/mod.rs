//! Command line entry point: serve the HTTP adapter or run the pipeline once.
//!
//! ```sh
//! inference-endpoint start
//! inference-endpoint run --persist
//! inference-endpoint export --output story.rdf
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueHint};
use colored::Colorize;

use crate::{
    boot,
    environment::{resolve_from_env, Environment, DEFAULT_ENVIRONMENT},
    ontology::exchange::{self, ExchangeFormat},
    pipeline::Publication,
    Error, Result,
};

#[derive(Parser)]
#[command(version, about, name = "inference-endpoint")]
/// Materializes the entailed closure of a knowledge graph
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Specify the environment
    #[arg(short, long, global = true, help = &format!("Specify the environment [default: {}]", DEFAULT_ENVIRONMENT))]
    environment: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP adapter
    Start {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the configured binding
        #[arg(short, long)]
        binding: Option<String>,
    },
    /// Run the pipeline once and print the outcome
    Run {
        /// Write the materialized graph back to the store instead of
        /// answering the serve query
        #[arg(long)]
        persist: bool,
    },
    /// Download the current store content
    Export {
        /// Destination file, standard output when omitted
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: Option<PathBuf>,
        /// Serialization syntax
        #[arg(short, long, default_value = "rdf-xml")]
        format: String,
    },
}

/// Parses the arguments and runs the selected command.
///
/// # Errors
///
/// Returns the first failure of the command.
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let environment: Environment = cli.environment.unwrap_or_else(resolve_from_env).into();
    let mut ctx = boot::bootstrap(&environment).await?;

    match cli.command {
        Commands::Start { port, binding } => {
            if let Some(port) = port {
                ctx.config.server.port = port;
            }
            if let Some(binding) = binding {
                ctx.config.server.binding = binding;
            }
            boot::start(ctx).await?;
        }
        Commands::Run { persist } => {
            let report = boot::run_once(&ctx, persist).await?;
            match &report.publication {
                Publication::Rows { rows } => {
                    println!("{}", serde_json::to_string_pretty(rows)?);
                }
                Publication::Persisted { location, triples } => {
                    println!(
                        "{} {} triples persisted to {}",
                        "✔".green(),
                        triples,
                        location.bold()
                    );
                }
            }
            eprintln!(
                "{} {} entailments added, {} axioms sanitized ({})",
                "inference".cyan(),
                report.materialization.total(),
                report.sanitize.removed,
                report.invocation
            );
        }
        Commands::Export { output, format } => {
            let format = format
                .parse::<ExchangeFormat>()
                .map_err(|err| Error::BadRequest(err.to_string()))?;
            let exported = boot::export(&ctx).await?;
            let bytes = if format == ExchangeFormat::RdfXml {
                exported.bytes
            } else {
                let graph = exchange::from_bytes(&exported.bytes, ExchangeFormat::RdfXml)
                    .map_err(Error::wrap)?;
                exchange::to_bytes(&graph, format).map_err(Error::wrap)?
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, &bytes)?;
                    eprintln!(
                        "{} exported graph written to {}",
                        "✔".green(),
                        path.display().to_string().bold()
                    );
                }
                None => {
                    use std::io::Write;
                    std::io::stdout().write_all(&bytes)?;
                }
            }
        }
    }
    Ok(())
}
