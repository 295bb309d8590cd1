// src/queue/mod.rs

//! Batch queue support: resource presets, the resource cascade, the SGE
//! command dialects and job liveness queries.

pub mod dialect;
pub mod presets;
pub mod status;

pub use dialect::{
    dialect_for_queue, QueueDialect, SgeDialect, SgeFlavor, SgePrograms, SubmitRequest,
};
pub use presets::{hrt, resolve, ResourceDefaults, DEFAULT_MINUTES};
pub use status::{JobStatus, QstatStatus};
