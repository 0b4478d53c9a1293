mod args;
mod demo;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use args::{Args, Command};
use scopecache::config::AppConfig;
use scopecache::logging::init_logging;
use scopecache::modules::codec;

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::load_from(path.clone()),
        None => AppConfig::load(),
    }
    .context("failed to load configuration")?;

    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    match args.command {
        Command::Inspect { file, normalize } => inspect(&file, normalize),
        Command::Settings => {
            print_settings(&config);
            Ok(())
        }
        Command::Demo => demo::run(&config),
    }
}

fn inspect(file: &Path, normalize: bool) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let modules = codec::parse(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    if normalize {
        println!("{}", codec::serialize(&modules));
        return Ok(());
    }

    if modules.is_empty() {
        println!("(no modules)");
    }
    for (index, module) in modules.iter().enumerate() {
        println!("{:>3}. {}", index + 1, module);
    }
    Ok(())
}

fn print_settings(config: &AppConfig) {
    println!("[registry]");
    println!("refresh_period_secs = {}", config.registry.refresh_period.as_secs());
    println!();
    println!("[logging]");
    println!("level = \"{}\"", config.logging.level.as_str().to_lowercase());
    println!("format = \"{}\"", config.logging.format);
}
