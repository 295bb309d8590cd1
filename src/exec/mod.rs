// src/exec/mod.rs

//! Running stages.
//!
//! - [`script`] composes and persists the generated scripts
//! - [`backend`] defines the [`StageBackend`] seam used by the engine
//! - [`local`] runs scripts sequentially with `bash`
//! - [`submit`] hands scripts to a batch queue

pub mod backend;
pub mod local;
pub mod script;
pub mod submit;

pub use backend::{LaunchOutcome, LaunchRequest, StageBackend};
pub use local::{LocalBackend, DEFAULT_TAIL_LINES};
pub use script::{checked_command, compose_script, write_script};
pub use submit::QueueBackend;
