//! porthub: replay and inspection binary for the agent registry.

use clap::Parser;
use porthub_core::RegistryConfig;
use porthub_runtime::RegistryActor;
use porthub_runtime::replay::{self, Scenario};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("PORTHUB_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => RegistryConfig::load(path)?,
        None => RegistryConfig::default(),
    };

    match args.command {
        cli::Command::Replay(opts) => {
            let scenario = Scenario::load(&opts.scenario).await?;
            let (handle, join) = RegistryActor::spawn(&config)?;

            let mut report = replay::run(&handle, &scenario).await?;
            handle.shutdown().await?;
            join.await?;

            if !opts.events {
                report.events.clear();
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        cli::Command::Pages(opts) => {
            if let Some(manifest) = opts.manifest {
                config.manifest = Some(manifest);
            }
            let descriptors = config.descriptors()?;
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
        }
    }

    Ok(())
}
