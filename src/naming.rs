// src/naming.rs

//! Submission naming and teardown scripts.
//!
//! Two runs of the same pipeline produce stages with identical display
//! names. The batch system must still be able to tell their jobs apart, so
//! every stage gets a disambiguator at registration time and its submission
//! name is `<display name>_<hex disambiguator>`.

use std::fmt;
use std::path::{Path, PathBuf};

use rand::Rng;

/// Hands out per-stage disambiguators.
pub trait IdAllocator: Send + fmt::Debug {
    fn next_id(&mut self) -> u64;
}

/// Random disambiguators in `0..=i64::MAX`, the production default.
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdAllocator for RandomIds {
    fn next_id(&mut self) -> u64 {
        rand::rng().random_range(0..=i64::MAX as u64)
    }
}

/// Deterministic disambiguators counting up from a start value.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }
}

impl IdAllocator for SequentialIds {
    fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Batch-system job name for a stage.
///
/// Job names must start with a letter, so anything else gets an `a` prefix.
pub fn submission_name(display_name: &str, disambiguator: u64) -> String {
    let name = format!("{display_name}_{disambiguator:x}");
    if name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name
    } else {
        format!("a{name}")
    }
}

/// Body of the run-level teardown script: one `bash <script>` per stage.
pub fn global_teardown_script(scripts: &[PathBuf]) -> String {
    scripts
        .iter()
        .map(|p| format!("bash {}\n", p.display()))
        .collect()
}

/// Prefix of the per-stage teardown script files.
pub const TEARDOWN_PREFIX: &str = "qdel-script";

/// Prefix of the run-level teardown script file.
pub const GLOBAL_TEARDOWN_PREFIX: &str = "global-qdel-script";

/// Name of the stage subdirectory for a stage inside a run directory.
pub fn stage_dir(run_dir: &Path, display_name: &str) -> PathBuf {
    run_dir.join(display_name)
}
