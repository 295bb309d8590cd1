// src/engine/state.rs

use std::path::PathBuf;

/// Where a stage ended up after one pass of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    /// Not visited yet.
    Pending,
    /// Already complete on disk; nothing was written or run.
    Skipped,
    /// Handed to the batch queue (or an earlier submission is still alive).
    Running,
    /// Ran to completion and left its marker.
    Complete,
    /// Ran successfully but did not leave its marker.
    Unmarked,
    /// Dry run: scripts were written, nothing was executed.
    Planned,
    Failed,
}

/// Per-stage record of one engine pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageRecord {
    pub name: String,
    pub state: StageState,
    pub work_dir: PathBuf,
    pub job_name: Option<String>,
}

/// Outcome of [`PipelineRunner::run_pipeline`](super::PipelineRunner::run_pipeline).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub run_dir: PathBuf,
    /// Visited stages in execution order; fan-out children appear right
    /// before their parent.
    pub stages: Vec<StageRecord>,
    pub global_teardown: Option<PathBuf>,
}

impl RunReport {
    pub fn state_of(&self, name: &str) -> Option<StageState> {
        self.stages.iter().find(|r| r.name == name).map(|r| r.state)
    }

    pub fn count(&self, state: StageState) -> usize {
        self.stages.iter().filter(|r| r.state == state).count()
    }

    /// Names of the stages that ended in `state`, in execution order.
    pub fn names_in(&self, state: StageState) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|r| r.state == state)
            .map(|r| r.name.as_str())
            .collect()
    }
}
