// src/stage/mod.rs

//! Stage model.
//!
//! - [`graph`] holds the [`StageGraph`] arena and [`Stage`] itself.
//! - [`capability`] holds the per-stage [`ScriptBody`] and
//!   [`CompletionPolicy`] traits.
//! - [`resources`] holds requested and effective resources.
//! - [`fanout`] holds shard discovery for fan-out stages.
//! - [`escalation`] builds doubled-memory retry chains.

pub mod capability;
pub mod escalation;
pub mod fanout;
pub mod graph;
pub mod resources;

pub use capability::{
    script_fn, ChainedScript, CompletionPolicy, MarkerFile, ScriptBody, ScriptFn, StageContext,
    StaticScript, DEFAULT_MARKER, RELAUNCH_MARKER,
};
pub use escalation::memory_escalation_chain;
pub use fanout::{discover_shards, shard_fn, FanOut, Shard, ShardScript};
pub use graph::{Stage, StageGraph, StageId, StageIdentity, Submission, ROOT_STAGE_NAME};
pub use resources::{EffectiveResources, ResourceRequest};
