// src/exec/submit.rs

//! Queue execution: submit each stage to the batch system.

use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::errors::{Result, StagehandError};
use crate::exec::backend::{LaunchOutcome, LaunchRequest, StageBackend};
use crate::exec::script::{
    latest_script, relative_to, write_script, CD_TO_SCRIPT_PARENT, STDOUT_FILE,
    SUBMIT_SCRIPT_PREFIX,
};
use crate::naming::TEARDOWN_PREFIX;
use crate::queue::{JobStatus, QueueDialect, SubmitRequest};

pub struct QueueBackend {
    dialect: Arc<dyn QueueDialect>,
    /// Liveness source used to avoid resubmitting a stage whose earlier
    /// submission is still queued or running.
    status: Option<Arc<dyn JobStatus>>,
}

impl QueueBackend {
    pub fn new(dialect: Arc<dyn QueueDialect>) -> Self {
        Self {
            dialect,
            status: None,
        }
    }

    pub fn with_status(mut self, status: Arc<dyn JobStatus>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn dialect(&self) -> &Arc<dyn QueueDialect> {
        &self.dialect
    }

    async fn submit(&self, req: LaunchRequest) -> Result<LaunchOutcome> {
        let stdout = PathBuf::from(STDOUT_FILE);
        let script = relative_to(&req.script, &req.work_dir);
        let submit_cmd = self.dialect.submit_command(&SubmitRequest {
            job_name: &req.job_name,
            resources: &req.resources,
            stdout: &stdout,
            script: &script,
            holds: &req.holds,
        });

        let submit_script = write_script(
            &req.work_dir,
            SUBMIT_SCRIPT_PREFIX,
            &format!("{CD_TO_SCRIPT_PARENT}\n{submit_cmd}"),
        )?;
        info!(stage = %req.stage, cmd = %submit_cmd, "submitting stage");
        if req.dry_run {
            return Ok(LaunchOutcome::Skipped);
        }

        let status = Command::new("bash")
            .arg(&submit_script)
            .current_dir(&req.work_dir)
            .stdin(Stdio::null())
            .status()
            .await
            .with_context(|| format!("running submit script of stage '{}'", req.stage))?;
        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            error!(stage = %req.stage, exit_code, "submission rejected");
            return Err(StagehandError::SubmissionFailed {
                stage: req.stage,
                exit_code,
            });
        }

        let teardown_script = write_script(
            &req.work_dir,
            TEARDOWN_PREFIX,
            &self.dialect.cancel_command(&req.job_name),
        )?;
        debug!(stage = %req.stage, job = %req.job_name, teardown = ?teardown_script, "stage submitted");
        Ok(LaunchOutcome::Submitted {
            job_name: req.job_name,
            teardown_script,
        })
    }
}

impl StageBackend for QueueBackend {
    fn is_queued(&self) -> bool {
        true
    }

    fn launch(
        &mut self,
        req: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LaunchOutcome>> + Send + '_>> {
        Box::pin(async move { self.submit(req).await })
    }

    fn live_submission(
        &self,
        work_dir: PathBuf,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + '_>> {
        Box::pin(async move {
            let Some(status) = &self.status else {
                return Ok(None);
            };
            let Some(script) = latest_script(&work_dir, SUBMIT_SCRIPT_PREFIX)? else {
                return Ok(None);
            };
            let text = fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let Some(job_name) = self.dialect.job_name_from_submit(&text) else {
                return Ok(None);
            };
            if status.is_alive(&job_name).await {
                Ok(Some(job_name))
            } else {
                Ok(None)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{SgeDialect, SgePrograms};
    use crate::stage::EffectiveResources;

    #[cfg(unix)]
    fn fake_program(dir: &std::path::Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn accepted_submission_writes_teardown_script() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let args_log = bin.path().join("args");
        let qsub = fake_program(bin.path(), "qsub", &format!("echo \"$@\" > {}", args_log.display()));
        let dialect = SgeDialect::for_queue(Some("wisp-mem")).with_programs(SgePrograms {
            qsub,
            ..SgePrograms::default()
        });
        let mut backend = QueueBackend::new(Arc::new(dialect));

        let script = work.path().join("experiment-script_000.sh");
        fs::write(&script, "true\n").unwrap();
        let outcome = backend
            .launch(LaunchRequest {
                stage: "s".into(),
                job_name: "s_a".into(),
                work_dir: work.path().to_path_buf(),
                script,
                resources: EffectiveResources {
                    queue: Some("wisp-mem".into()),
                    threads: 2,
                    mem_mb: 8192,
                    minutes: 480,
                },
                holds: vec!["p_1".into()],
                marker: "DONE".into(),
                dry_run: false,
            })
            .await
            .unwrap();

        let teardown = work.path().join("qdel-script_000.sh");
        assert_eq!(
            outcome,
            LaunchOutcome::Submitted {
                job_name: "s_a".into(),
                teardown_script: teardown.clone(),
            }
        );
        assert_eq!(fs::read_to_string(teardown).unwrap(), "qdel s_a\n");

        let args = fs::read_to_string(args_log).unwrap();
        assert!(args.contains("-N s_a"), "{args}");
        assert!(args.contains("-hold_jid p_1"), "{args}");
        assert!(args.contains("bash 'experiment-script_000.sh'"), "{args}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejected_submission_is_an_error() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let qsub = fake_program(bin.path(), "qsub", "exit 3");
        let dialect = SgeDialect::for_queue(None).with_programs(SgePrograms {
            qsub,
            ..SgePrograms::default()
        });
        let mut backend = QueueBackend::new(Arc::new(dialect));

        let err = backend
            .launch(LaunchRequest {
                stage: "s".into(),
                job_name: "s_a".into(),
                work_dir: work.path().to_path_buf(),
                script: work.path().join("experiment-script_000.sh"),
                resources: EffectiveResources {
                    queue: None,
                    threads: 1,
                    mem_mb: 1,
                    minutes: 1,
                },
                holds: Vec::new(),
                marker: "DONE".into(),
                dry_run: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StagehandError::SubmissionFailed { exit_code: 3, .. }));
        assert!(!work.path().join("qdel-script_000.sh").exists());
    }
}
