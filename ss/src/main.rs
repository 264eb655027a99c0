use std::io::Read;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use slicestore::SliceStore;
use slicestore::cli::{Cli, Command};
use slicestore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);

    info!("slicestore starting at {}", store_path.display());
    let store = SliceStore::open(&store_path)?;

    match cli.command {
        Command::List => {
            let slices = store.list()?;
            if slices.is_empty() {
                println!("No slices found");
            } else {
                for slice in slices {
                    println!("{} {}", slice.key.cyan(), format!("{} bytes", slice.bytes).dimmed());
                }
            }
        }
        Command::Get { key } => match store.read_raw(&key)? {
            Some(content) => {
                if config.pretty
                    && let Ok(value) = serde_json::from_str::<serde_json::Value>(&content)
                {
                    println!("{}", serde_json::to_string_pretty(&value)?);
                } else {
                    println!("{}", content);
                }
            }
            None => return Err(eyre::eyre!("Slice not found: {}", key)),
        },
        Command::Set { key, value } => {
            let raw = if value == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                value
            };
            let parsed: serde_json::Value = serde_json::from_str(&raw).context("Value is not valid JSON")?;
            store.save(&key, &parsed)?;
            println!("{} Wrote slice: {}", "✓".green(), key.cyan());
        }
        Command::Remove { key } => {
            if store.remove(&key)? {
                println!("{} Removed slice: {}", "✓".green(), key);
            } else {
                println!("Slice not found: {}", key);
            }
        }
        Command::Path => {
            println!("{}", store.path().display());
        }
    }

    Ok(())
}
