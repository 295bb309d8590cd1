// src/dag/topo.rs

//! Topological ordering of the stages reachable from the root.

use std::collections::{HashSet, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::errors::{Result, StagehandError};
use crate::stage::{StageGraph, StageId};

/// Every stage reachable from `start` through dependent edges, `start`
/// included.
pub fn reachable_from(graph: &StageGraph, start: StageId) -> HashSet<StageId> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        if seen.insert(id) {
            stack.extend(graph.dependents_of(id).iter().copied());
        }
    }
    seen
}

/// Kahn's algorithm seeded with the graph root.
///
/// Each stage comes after all of its prerequisites. If edges are left over
/// the graph has a cycle, and no partial order is returned.
pub fn topo_order(graph: &StageGraph) -> Result<Vec<StageId>> {
    let root = graph.root();
    let reachable = reachable_from(graph, root);

    let mut edges: HashSet<(StageId, StageId)> = reachable
        .iter()
        .flat_map(|&n| graph.dependents_of(n).iter().map(move |&m| (n, m)))
        .collect();

    let mut order = Vec::with_capacity(reachable.len());
    let mut queued: HashSet<StageId> = HashSet::from([root]);
    let mut todo = VecDeque::from([root]);

    while let Some(n) = todo.pop_front() {
        order.push(n);
        for &m in graph.dependents_of(n) {
            edges.remove(&(n, m));
            let ready = graph
                .prereqs_of(m)
                .iter()
                .all(|&p| !edges.contains(&(p, m)));
            if ready && queued.insert(m) {
                todo.push_back(m);
            }
        }
    }

    if !edges.is_empty() {
        return Err(StagehandError::DagCycle(describe_cycles(graph, &edges)));
    }

    debug!(stages = order.len(), "computed topological order");
    Ok(order)
}

/// Names of the stages on cycles among the leftover edges, one group per
/// strongly connected component.
fn describe_cycles(graph: &StageGraph, edges: &HashSet<(StageId, StageId)>) -> String {
    let mut g: DiGraphMap<StageId, ()> = DiGraphMap::new();
    for &(a, b) in edges {
        g.add_edge(a, b, ());
    }

    let mut groups: Vec<Vec<String>> = kosaraju_scc(&g)
        .into_iter()
        .filter(|scc| scc.len() > 1 || g.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut names: Vec<String> = scc.into_iter().map(|id| graph.name_of(id)).collect();
            names.sort();
            names
        })
        .collect();
    groups.sort();

    if groups.is_empty() {
        // Leftover edges always contain a cycle; name the stages blocked on it.
        let mut names: Vec<String> = edges.iter().map(|&(_, m)| graph.name_of(m)).collect();
        names.sort();
        names.dedup();
        return format!("stages blocked by a cycle: {}", names.join(", "));
    }

    groups
        .iter()
        .map(|names| names.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}
