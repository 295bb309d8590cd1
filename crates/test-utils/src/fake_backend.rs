use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stagehand::errors::{Result, StagehandError};
use stagehand::exec::{LaunchOutcome, LaunchRequest, StageBackend};

/// A fake backend that:
/// - records every launch request
/// - "succeeds" by touching the stage's marker file
/// - fails the stages listed in `failing`
///
/// In queued mode it reports `Submitted` instead and touches nothing, the
/// way a real batch system leaves completion for later.
#[derive(Default)]
pub struct FakeBackend {
    launched: Arc<Mutex<Vec<LaunchRequest>>>,
    failing: HashSet<String>,
    queued: bool,
    live: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue-mode fake: launches become submissions.
    pub fn queued() -> Self {
        Self {
            queued: true,
            ..Self::default()
        }
    }

    pub fn failing(mut self, stage: &str) -> Self {
        self.failing.insert(stage.to_string());
        self
    }

    /// Report a live earlier submission (named `live-<dir name>`) for the
    /// stage directory `dir`.
    pub fn with_live_submission(self, dir: impl Into<PathBuf>) -> Self {
        self.live.lock().unwrap().insert(dir.into());
        self
    }

    /// Shared handle to the recorded launches.
    pub fn launched(&self) -> Arc<Mutex<Vec<LaunchRequest>>> {
        Arc::clone(&self.launched)
    }
}

impl StageBackend for FakeBackend {
    fn is_queued(&self) -> bool {
        self.queued
    }

    fn launch(
        &mut self,
        req: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LaunchOutcome>> + Send + '_>> {
        Box::pin(async move {
            self.launched.lock().unwrap().push(req.clone());

            if req.dry_run {
                return Ok(LaunchOutcome::Skipped);
            }
            if self.failing.contains(&req.stage) {
                return Err(if self.queued {
                    StagehandError::SubmissionFailed {
                        stage: req.stage,
                        exit_code: 1,
                    }
                } else {
                    StagehandError::ExecutionFailed {
                        stage: req.stage,
                        exit_code: 1,
                        log_tail: String::new(),
                    }
                });
            }
            if self.queued {
                return Ok(LaunchOutcome::Submitted {
                    teardown_script: req.work_dir.join("qdel-script_000.sh"),
                    job_name: req.job_name,
                });
            }

            std::fs::write(req.work_dir.join(&req.marker), b"")?;
            Ok(LaunchOutcome::Finished)
        })
    }

    fn live_submission(
        &self,
        work_dir: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
        Box::pin(async move {
            if !self.live.lock().unwrap().contains(&work_dir) {
                return Ok(None);
            }
            let name = work_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Some(format!("live-{name}")))
        })
    }
}
