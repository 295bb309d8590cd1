// src/exec/local.rs

//! Sequential execution: run each stage script with `bash` and wait.

use std::fs::File;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{error, info};

use crate::errors::{Result, StagehandError};
use crate::exec::backend::{LaunchOutcome, LaunchRequest, StageBackend};
use crate::exec::script::{tail_lines, STDOUT_FILE};

/// Number of log lines attached to an execution failure by default.
pub const DEFAULT_TAIL_LINES: usize = 15;

#[derive(Debug, Clone)]
pub struct LocalBackend {
    /// Also copy stage output to this process's stdout.
    print_to_console: bool,
    tail_lines: usize,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new(false, DEFAULT_TAIL_LINES)
    }
}

impl LocalBackend {
    pub fn new(print_to_console: bool, tail_lines: usize) -> Self {
        Self {
            print_to_console,
            tail_lines,
        }
    }
}

impl StageBackend for LocalBackend {
    fn is_queued(&self) -> bool {
        false
    }

    fn launch(
        &mut self,
        req: LaunchRequest,
    ) -> Pin<Box<dyn Future<Output = Result<LaunchOutcome>> + Send + '_>> {
        Box::pin(async move { self.run_script(req).await })
    }
}

impl LocalBackend {
    async fn run_script(&self, req: LaunchRequest) -> Result<LaunchOutcome> {
        info!(
            stage = %req.stage,
            cmd = %format!("bash {}", req.script.display()),
            "running stage"
        );
        if req.dry_run {
            return Ok(LaunchOutcome::Skipped);
        }

        let stdout_path = req.work_dir.join(STDOUT_FILE);
        let mut log = File::create(&stdout_path)
            .with_context(|| format!("creating {}", stdout_path.display()))?;

        let mut cmd = Command::new("bash");
        cmd.current_dir(&req.work_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let status = if self.print_to_console {
            // Merge stderr into stdout inside bash so both can be teed.
            cmd.arg("-c")
                .arg(r#"exec 2>&1; exec bash "$0""#)
                .arg(&req.script)
                .stdout(Stdio::piped())
                .stderr(Stdio::null());

            let mut child = cmd
                .spawn()
                .with_context(|| format!("spawning script of stage '{}'", req.stage))?;

            if let Some(out) = child.stdout.take() {
                // Output is not necessarily UTF-8: log the raw bytes, print lossily.
                let mut reader = BufReader::new(out);
                let mut buf = Vec::new();
                while reader.read_until(b'\n', &mut buf).await? > 0 {
                    log.write_all(&buf)?;
                    print!("{}", String::from_utf8_lossy(&buf));
                    buf.clear();
                }
            }
            child.wait().await?
        } else {
            let err = log.try_clone()?;
            cmd.arg(&req.script)
                .stdout(Stdio::from(log))
                .stderr(Stdio::from(err));
            cmd.status()
                .await
                .with_context(|| format!("running script of stage '{}'", req.stage))?
        };

        if status.success() {
            info!(stage = %req.stage, "stage finished");
            return Ok(LaunchOutcome::Finished);
        }

        let exit_code = status.code().unwrap_or(-1);
        let log_tail = tail_lines(&stdout_path, self.tail_lines);
        error!(stage = %req.stage, exit_code, "stage failed\n{log_tail}");
        Err(StagehandError::ExecutionFailed {
            stage: req.stage,
            exit_code,
            log_tail,
        })
    }
}
