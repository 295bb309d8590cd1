#![allow(dead_code)]

use stagehand::naming::SequentialIds;
use stagehand::params::ParamSet;
use stagehand::stage::{Stage, StageGraph, StageId};

/// Graph with sequential ids starting at 1, so submission names are stable.
pub fn graph() -> StageGraph {
    StageGraph::with_allocator(Box::new(SequentialIds::starting_at(1)))
}

/// Handles of the stages in [`diamond`].
pub struct Diamond {
    pub graph: StageGraph,
    pub a: StageId,
    pub b: StageId,
    pub c: StageId,
    pub d: StageId,
}

/// `root -> a -> {b, c} -> d`, every stage running `script(name)`.
pub fn diamond(script: impl Fn(&str) -> String) -> Diamond {
    let mut graph = graph();
    let root = graph.root();
    let a = graph.add_stage(Stage::script("a", script("a")));
    let b = graph.add_stage(Stage::script("b", script("b")));
    let c = graph.add_stage(Stage::script("c", script("c")));
    let d = graph.add_stage(Stage::script("d", script("d")));
    graph.add_prereq(a, root);
    graph.add_prereqs(b, [a]);
    graph.add_prereqs(c, [a]);
    graph.add_prereqs(d, [b, c]);
    Diamond { graph, a, b, c, d }
}

/// `root -> s0 -> s1 -> ... -> s{n-1}`.
pub fn chain(n: usize, script: impl Fn(&str) -> String) -> (StageGraph, Vec<StageId>) {
    let mut graph = graph();
    let mut prev = graph.root();
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let name = format!("s{i}");
        let id = graph.add_stage(Stage::script(name.clone(), script(&name)));
        graph.add_prereq(id, prev);
        ids.push(id);
        prev = id;
    }
    (graph, ids)
}

/// Parameter set from string pairs, e.g. `params(&[("lr", "0.1")])`.
pub fn params(pairs: &[(&str, &str)]) -> ParamSet {
    ParamSet::from_pairs(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
}
