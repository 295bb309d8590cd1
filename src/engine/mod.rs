// src/engine/mod.rs

//! Execution engine: walks the scheduled stages and runs or submits them.

pub mod fanout;
pub mod runner;
pub mod settings;
pub mod state;

pub use runner::{PipelineRunner, RUNS_DIR};
pub use settings::RunSettings;
pub use state::{RunReport, StageRecord, StageState};
