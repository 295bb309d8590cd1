// src/relaunch/mod.rs

//! Relaunch monitor.
//!
//! Runs independently of the engine, over a run directory it produced
//! earlier. Every stage directory that has neither its completion marker
//! nor a live batch job gets its latest submission script re-invoked.
//! Running the pass twice is harmless: a relaunched job is alive on the
//! second pass.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::config::RelaunchSection;
use crate::errors::{Result, StagehandError};
use crate::exec::script::{latest_script, SUBMIT_SCRIPT_PREFIX};
pub use crate::queue::{JobStatus, QstatStatus};
use crate::queue::QueueDialect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchOptions {
    pub tries: u32,
    /// Report only; resubmit nothing.
    pub test_only: bool,
    pub marker: String,
    /// Files removed from a directory before resubmitting it.
    pub clean: Vec<String>,
}

impl Default for RelaunchOptions {
    fn default() -> Self {
        Self::from(&RelaunchSection::default())
    }
}

impl From<&RelaunchSection> for RelaunchOptions {
    fn from(section: &RelaunchSection) -> Self {
        Self {
            tries: section.tries,
            test_only: section.test,
            marker: section.marker.clone(),
            clean: section.clean.clone(),
        }
    }
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaunchSummary {
    pub done: usize,
    pub running: usize,
    /// Resubmitted, or would have been in test mode.
    pub relaunched: usize,
    pub skipped: usize,
}

impl RelaunchSummary {
    fn absorb(&mut self, other: &RelaunchSummary) {
        self.done += other.done;
        self.running += other.running;
        self.relaunched += other.relaunched;
        self.skipped += other.skipped;
    }
}

pub struct Relauncher {
    options: RelaunchOptions,
    dialect: Arc<dyn QueueDialect>,
    status: Arc<dyn JobStatus>,
}

impl Relauncher {
    pub fn new(options: RelaunchOptions, dialect: Arc<dyn QueueDialect>, status: Arc<dyn JobStatus>) -> Self {
        Self {
            options,
            dialect,
            status,
        }
    }

    pub fn options(&self) -> &RelaunchOptions {
        &self.options
    }

    /// One pass over the immediate subdirectories of `run_dir`, in name order.
    pub async fn relaunch(&self, run_dir: &Path) -> Result<RelaunchSummary> {
        let mut entries: Vec<PathBuf> = fs::read_dir(run_dir)
            .with_context(|| format!("reading run directory {}", run_dir.display()))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<_>>()?;
        entries.sort();

        let mut summary = RelaunchSummary::default();
        for dir in entries {
            if dir.join(&self.options.marker).exists() {
                debug!(dir = ?dir, "done");
                summary.done += 1;
                continue;
            }
            if !dir.is_dir() {
                continue;
            }

            let Some(script) = latest_script(&dir, SUBMIT_SCRIPT_PREFIX)? else {
                warn!(dir = ?dir, "no submission script; skipping");
                summary.skipped += 1;
                continue;
            };
            let text = fs::read_to_string(&script).with_context(|| format!("reading {}", script.display()))?;

            if let Some(job) = self.dialect.job_name_from_submit(&text)
                && self.status.is_alive(&job).await
            {
                debug!(dir = ?dir, job = %job, "still running");
                summary.running += 1;
                continue;
            }

            if self.options.test_only {
                info!(dir = ?dir, script = ?script, "would relaunch");
            } else {
                self.resubmit(&dir, &script).await?;
            }
            summary.relaunched += 1;
        }

        info!(
            run_dir = ?run_dir,
            done = summary.done,
            running = summary.running,
            relaunched = summary.relaunched,
            skipped = summary.skipped,
            test_only = self.options.test_only,
            "relaunch pass finished"
        );
        Ok(summary)
    }

    /// Run [`relaunch`](Self::relaunch) over several run directories and add
    /// up the counts. Stops at the first failing directory.
    pub async fn relaunch_all(&self, run_dirs: &[PathBuf]) -> Result<RelaunchSummary> {
        let mut total = RelaunchSummary::default();
        for dir in run_dirs {
            total.absorb(&self.relaunch(dir).await?);
        }
        Ok(total)
    }

    async fn resubmit(&self, dir: &Path, script: &Path) -> Result<()> {
        for name in &self.options.clean {
            let path = dir.join(name);
            match fs::remove_file(&path) {
                Ok(()) => debug!(file = ?path, "removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        for attempt in 1..=self.options.tries {
            info!(dir = ?dir, script = ?script, attempt, "relaunching");
            let status = Command::new("bash")
                .arg(script)
                .current_dir(dir)
                .stdin(Stdio::null())
                .status()
                .await
                .with_context(|| format!("running {}", script.display()))?;
            if status.success() {
                return Ok(());
            }
            warn!(dir = ?dir, attempt, exit_code = ?status.code(), "resubmission rejected");
        }

        error!(dir = ?dir, attempts = self.options.tries, "giving up");
        Err(StagehandError::RelaunchFailed {
            dir: dir.to_path_buf(),
            attempts: self.options.tries,
        })
    }
}
