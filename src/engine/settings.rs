// src/engine/settings.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::RunConfig;
use crate::queue::ResourceDefaults;

/// Run-wide options for [`PipelineRunner`](super::PipelineRunner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Prefix of the numbered run directory.
    pub name: String,
    /// `None` runs every stage locally, one at a time.
    pub queue: Option<String>,
    pub root_dir: PathBuf,
    /// Fixed run directory; `None` creates `<root_dir>/exp/<name>_NNN`.
    pub run_dir: Option<PathBuf>,
    pub setupenv: Option<PathBuf>,
    pub defaults: ResourceDefaults,
    pub dry_run: bool,
    /// How often a fan-out stage re-checks its prerequisites.
    pub poll_interval: Duration,
    pub max_wait: Option<Duration>,
}

impl RunSettings {
    /// Sequential run rooted at `root_dir` with preset defaults.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: "experiments".to_string(),
            queue: None,
            root_dir: root_dir.into(),
            run_dir: None,
            setupenv: None,
            defaults: ResourceDefaults::for_queue(None),
            dry_run: false,
            poll_interval: Duration::from_secs(3),
            max_wait: None,
        }
    }

    /// Switch to queue mode, taking that queue's preset defaults.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        let queue = queue.into();
        self.defaults = ResourceDefaults::for_queue(Some(&queue));
        self.queue = Some(queue);
        self
    }

    pub fn with_run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.run_dir = Some(run_dir.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl From<&RunConfig> for RunSettings {
    fn from(cfg: &RunConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            queue: cfg.queue.clone(),
            root_dir: cfg.root_dir.clone(),
            run_dir: cfg.run_dir.clone(),
            setupenv: cfg.setupenv.clone(),
            defaults: cfg.resources,
            dry_run: cfg.dry_run,
            poll_interval: cfg.poll_interval,
            max_wait: cfg.max_wait,
        }
    }
}
