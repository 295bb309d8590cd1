// src/queue/status.rs

//! Job liveness queries.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::queue::dialect::QueueDialect;

/// Asks the batch system whether a job is still alive (queued or running).
///
/// The answer is taken on trust: implementations report whatever the batch
/// system says, and anything that is not a positive answer (including the
/// query tool failing to start) counts as "not alive". A job the batch
/// system has lost track of will therefore be relaunched.
pub trait JobStatus: Send + Sync {
    fn is_alive<'a>(&'a self, job_name: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;
}

/// `qstat -j <name>`: exit code 0 means alive.
#[derive(Debug, Clone)]
pub struct QstatStatus {
    dialect: Arc<dyn QueueDialect>,
}

impl QstatStatus {
    pub fn new(dialect: Arc<dyn QueueDialect>) -> Self {
        Self { dialect }
    }
}

impl JobStatus for QstatStatus {
    fn is_alive<'a>(&'a self, job_name: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            let (program, args) = self.dialect.status_command(job_name);
            let status = Command::new(&program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;

            match status {
                Ok(status) => {
                    debug!(job = %job_name, exit_code = ?status.code(), "status query finished");
                    status.success()
                }
                Err(e) => {
                    warn!(job = %job_name, program = %program, error = %e, "status query could not run");
                    false
                }
            }
        })
    }
}
