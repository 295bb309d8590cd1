// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod naming;
pub mod params;
pub mod queue;
pub mod relaunch;
pub mod stage;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::cli::{CliArgs, Command};
use crate::config::{load_and_validate, RawRunConfig, RunConfig};
use crate::queue::{dialect_for_queue, QstatStatus, QueueDialect};
use crate::relaunch::{RelaunchOptions, Relauncher};

/// High-level entry point used by `main.rs`.
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_config(Path::new(&args.config))?;

    match args.command {
        Command::Relaunch { test, tries, dirs } => {
            let mut options = RelaunchOptions::from(&cfg.relaunch);
            options.test_only |= test;
            if let Some(tries) = tries {
                anyhow::ensure!(tries >= 1, "--tries must be >= 1");
                options.tries = tries;
            }

            let dialect: Arc<dyn QueueDialect> = Arc::from(dialect_for_queue(cfg.queue.as_deref()));
            let status = Arc::new(QstatStatus::new(Arc::clone(&dialect)));
            let relauncher = Relauncher::new(options, dialect, status);

            let summary = relauncher.relaunch_all(&dirs).await?;
            println!(
                "done: {}, running: {}, relaunched: {}, skipped: {}",
                summary.done, summary.running, summary.relaunched, summary.skipped
            );
            Ok(())
        }
    }
}

/// The config file if it exists, built-in defaults otherwise.
fn load_config(path: &Path) -> Result<RunConfig> {
    if path.exists() {
        info!(config = ?path, "loading config");
        Ok(load_and_validate(path)?)
    } else {
        debug!(config = ?path, "no config file; using defaults");
        Ok(RunConfig::try_from(RawRunConfig::default())?)
    }
}
