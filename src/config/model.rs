// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::queue::ResourceDefaults;

/// Run configuration as read from a TOML file.
///
/// ```toml
/// [run]
/// name = "crf-sweep"
/// queue = "wisp-mem"
/// setupenv = "setupenv.sh"
///
/// [resources]
/// mem_mb = 4096
///
/// [fanout]
/// poll_interval = "10s"
/// max_wait = "2h"
///
/// [relaunch]
/// tries = 3
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRunConfig {
    #[serde(default)]
    pub run: RunSection,

    #[serde(default)]
    pub resources: ResourcesSection,

    #[serde(default)]
    pub fanout: FanoutSection,

    #[serde(default)]
    pub relaunch: RelaunchSection,
}

/// `[run]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    /// Prefix of the numbered run directory under `<root_dir>/exp`.
    #[serde(default = "default_run_name")]
    pub name: String,

    /// Batch queue class; absent means sequential local execution.
    #[serde(default)]
    pub queue: Option<String>,

    /// Project root; defaults to the current directory.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// Fixed run directory. Reusing it resumes an earlier run.
    #[serde(default)]
    pub run_dir: Option<PathBuf>,

    /// Script sourced at the start of every stage script.
    #[serde(default)]
    pub setupenv: Option<PathBuf>,

    #[serde(default)]
    pub print_to_console: bool,

    #[serde(default)]
    pub dry_run: bool,

    /// Lines of stage output attached to an execution failure.
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
}

fn default_run_name() -> String {
    "experiments".to_string()
}

fn default_tail_lines() -> usize {
    15
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            name: default_run_name(),
            queue: None,
            root_dir: None,
            run_dir: None,
            setupenv: None,
            print_to_console: false,
            dry_run: false,
            tail_lines: default_tail_lines(),
        }
    }
}

/// `[resources]` section: overrides for the queue-class preset.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourcesSection {
    #[serde(default)]
    pub threads: Option<u32>,
    #[serde(default)]
    pub mem_mb: Option<u64>,
    #[serde(default)]
    pub minutes: Option<u64>,
}

/// `[fanout]` section. Durations are strings like `"500ms"`, `"3s"`, `"2h"`.
#[derive(Debug, Clone, Deserialize)]
pub struct FanoutSection {
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Give up waiting for prerequisites after this long. Unset waits forever.
    #[serde(default)]
    pub max_wait: Option<String>,
}

fn default_poll_interval() -> String {
    "3s".to_string()
}

impl Default for FanoutSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_wait: None,
        }
    }
}

/// `[relaunch]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RelaunchSection {
    /// Attempts per directory before the pass fails.
    #[serde(default = "default_tries")]
    pub tries: u32,

    /// Only report what would be relaunched.
    #[serde(default)]
    pub test: bool,

    #[serde(default = "default_marker")]
    pub marker: String,

    /// Files removed from a directory before it is resubmitted.
    #[serde(default = "default_clean")]
    pub clean: Vec<String>,
}

fn default_tries() -> u32 {
    1
}

fn default_marker() -> String {
    crate::stage::DEFAULT_MARKER.to_string()
}

fn default_clean() -> Vec<String> {
    vec![crate::exec::script::STDOUT_FILE.to_string()]
}

impl Default for RelaunchSection {
    fn default() -> Self {
        Self {
            tries: default_tries(),
            test: false,
            marker: default_marker(),
            clean: default_clean(),
        }
    }
}

/// Validated run configuration.
///
/// Paths are absolute, durations parsed and resource defaults resolved.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub queue: Option<String>,
    pub root_dir: PathBuf,
    pub run_dir: Option<PathBuf>,
    pub setupenv: Option<PathBuf>,
    pub print_to_console: bool,
    pub dry_run: bool,
    pub tail_lines: usize,
    pub resources: ResourceDefaults,
    pub poll_interval: Duration,
    pub max_wait: Option<Duration>,
    pub relaunch: RelaunchSection,
}
