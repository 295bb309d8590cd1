// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagehandError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Multiple stages have the same name: {name} ({copies} copies); all stages: {all:?}")]
    DuplicateStageName {
        name: String,
        copies: usize,
        all: Vec<String>,
    },

    #[error("Stage name '{0}' cannot be used as a directory name")]
    InvalidStageName(String),

    #[error("Cycle detected in stage graph: {0}")]
    DagCycle(String),

    #[error("Stage '{stage}' failed with exit code {exit_code}\n{log_tail}")]
    ExecutionFailed {
        stage: String,
        exit_code: i32,
        log_tail: String,
    },

    #[error("Submission of stage '{stage}' was rejected (exit code {exit_code})")]
    SubmissionFailed { stage: String, exit_code: i32 },

    #[error("Fan-out stage '{stage}' gave up waiting for prerequisites after {waited_secs}s")]
    FanOutTimeout { stage: String, waited_secs: u64 },

    #[error("No shard files match pattern: {0}")]
    NoShards(String),

    #[error("Relaunch of {dir:?} failed after {attempts} attempt(s)")]
    RelaunchFailed { dir: PathBuf, attempts: u32 },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, StagehandError>;
