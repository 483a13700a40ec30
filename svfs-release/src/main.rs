use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use svfs_release::builder::ReleaseBuilder;
use svfs_release::cli::{Command, ReleaseCli};

fn main() -> Result<()> {
    let cli = ReleaseCli::parse();

    // Initialize tracing; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if cli.verbose {
        tracing::info!("Running svfs-release with verbose output");
    }

    let command = cli.command.clone();
    let builder = ReleaseBuilder::new(cli.into())?;

    match command {
        Some(Command::Targets { json }) => {
            let targets = builder.targets()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&targets)?);
            } else {
                for target in targets {
                    println!("{target}");
                }
            }
        }
        Some(Command::Render { template, to }) => {
            builder.render(&template, &to)?;
        }
        None => {
            // Default behavior: build and package the whole matrix
            let artifacts = builder.run()?;
            for artifact in artifacts {
                println!("{}", artifact.display());
            }
        }
    }

    Ok(())
}
