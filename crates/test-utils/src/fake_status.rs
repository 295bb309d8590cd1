use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use stagehand::queue::JobStatus;

/// Scripted liveness: a job is alive iff its name was marked alive.
/// Every query is recorded.
#[derive(Debug, Default, Clone)]
pub struct FakeStatus {
    alive: Arc<Mutex<HashSet<String>>>,
    queried: Arc<Mutex<Vec<String>>>,
}

impl FakeStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alive(jobs: &[&str]) -> Self {
        let status = Self::default();
        for job in jobs {
            status.set_alive(job, true);
        }
        status
    }

    pub fn set_alive(&self, job: &str, alive: bool) {
        let mut set = self.alive.lock().unwrap();
        if alive {
            set.insert(job.to_string());
        } else {
            set.remove(job);
        }
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

impl JobStatus for FakeStatus {
    fn is_alive<'a>(&'a self, job_name: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            self.queried.lock().unwrap().push(job_name.to_string());
            self.alive.lock().unwrap().contains(job_name)
        })
    }
}
