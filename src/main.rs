mod audio;
mod cli;
mod config;
mod error;
mod export;
mod pipeline;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use cli::Cli;
use config::Config;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    let mut cfg = match find_config(cli.config.clone()) {
        Some(path) => {
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };
    cli.apply_overrides(&mut cfg);

    let input = cfg
        .io
        .input
        .clone()
        .context("Input audio file is required (argument or io.input in config)")?;

    log::info!("beatmap - onset timestamps for video cuts");
    log::info!("Input: {}", input.display());
    if !cli.dry_run {
        log::info!("Output: {}", cfg.io.output.display());
    }

    let beat_map = pipeline::run(&cfg, cli.dry_run)
        .with_context(|| format!("Beat analysis of {} failed", input.display()))?;

    if cli.dry_run {
        println!("{}", export::to_json(&beat_map.timestamps));
    }

    if let Some(stats) = beat_map.stats {
        log::info!("Interval range: {:.2}s - {:.2}s", stats.min, stats.max);
        log::info!("Average interval: {:.2}s", stats.mean);
    }
    if let Some(last) = beat_map.frames.last() {
        log::debug!("Last onset frame: {}", last);
    }

    log::info!(
        "Done! Generated {} beat timestamps over {:.2}s",
        beat_map.timestamps.len(),
        beat_map.duration
    );
    Ok(())
}

/// Explicit `--config` path, else `beatmap.toml` in the working directory,
/// else the per-user config file.
fn find_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let local = PathBuf::from("beatmap.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(home) = dirs::home_dir() {
            let xdg = home.join(".config").join("beatmap").join("config.toml");
            if xdg.exists() {
                return Some(xdg);
            }
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("beatmap").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    })
}
