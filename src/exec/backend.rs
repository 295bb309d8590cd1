// src/exec/backend.rs

//! Pluggable stage execution backend.
//!
//! The engine hands every stage that needs running to a `StageBackend`:
//! - [`LocalBackend`](super::local::LocalBackend) runs the script right away
//!   with `bash` and waits for it.
//! - [`QueueBackend`](super::submit::QueueBackend) submits it to the batch
//!   system and returns as soon as the submission is accepted.
//!
//! Tests can provide their own backend that records launches instead of
//! spawning processes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::errors::Result;
use crate::stage::EffectiveResources;

/// Everything a backend needs to run one stage.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    /// Display name.
    pub stage: String,
    /// Batch-system job name.
    pub job_name: String,
    pub work_dir: PathBuf,
    /// The persisted experiment script.
    pub script: PathBuf,
    pub resources: EffectiveResources,
    /// Job names this stage must wait for (queue mode only).
    pub holds: Vec<String>,
    pub marker: String,
    /// Only persist and log; run nothing.
    pub dry_run: bool,
}

/// What happened to a launched stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The script ran to completion with exit code 0.
    Finished,
    /// The batch system accepted the job.
    Submitted {
        job_name: String,
        teardown_script: PathBuf,
    },
    /// Dry run: nothing was executed.
    Skipped,
}

pub trait StageBackend: Send {
    /// Whether launches go to a batch queue (as opposed to running inline).
    fn is_queued(&self) -> bool;

    /// Run or submit one stage.
    fn launch(
        &mut self,
        req: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LaunchOutcome>> + Send + '_>>;

    /// Name of a still-alive earlier submission for the stage directory, if
    /// any. Backends without persistent submissions have none.
    fn live_submission(
        &self,
        _work_dir: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
        Box::pin(async { Ok(None) })
    }
}
