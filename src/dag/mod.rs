// src/dag/mod.rs

//! Scheduling over the stage graph.
//!
//! - [`topo`] computes the execution order (Kahn's algorithm from the root)
//! - [`validate`] checks and normalises the ordered stages

pub mod topo;
pub mod validate;

use tracing::{debug, info};

use crate::errors::Result;
use crate::stage::{StageGraph, StageId};

pub use topo::{reachable_from, topo_order};
pub use validate::{shorten_stage_names, validate_unique_names};

/// Order the graph, shorten parameter stage names across the whole run and
/// reject duplicate names. Nothing is touched on disk.
pub fn schedule(graph: &mut StageGraph) -> Result<Vec<StageId>> {
    let order = topo_order(graph)?;
    shorten_stage_names(graph, &order);
    validate_unique_names(graph, &order)?;

    for id in &order {
        debug!(stage = %graph.name_of(*id), "scheduled");
    }
    info!(stages = order.len(), "stage order computed");
    Ok(order)
}
