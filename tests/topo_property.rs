// tests/topo_property.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use stagehand::dag::topo_order;
use stagehand::stage::{Stage, StageGraph, StageId};
use stagehand_test_utils::builders::graph;

// Acyclic by construction: stage N only depends on stages 0..N. Stages with
// no prerequisite hang off the root.
fn dag_strategy(max_stages: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_stages).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let deps: HashSet<usize> =
                            deps.into_iter().filter(|_| i > 0).map(|d| d % i.max(1)).collect();
                        deps.into_iter().collect()
                    })
                    .collect()
            },
        )
    })
}

fn build(deps: &[Vec<usize>]) -> (StageGraph, Vec<StageId>) {
    let mut g = graph();
    let root = g.root();
    let mut ids = Vec::with_capacity(deps.len());
    for (i, stage_deps) in deps.iter().enumerate() {
        let id = g.add_stage(Stage::script(format!("s{i}"), ""));
        if stage_deps.is_empty() {
            g.add_prereq(id, root);
        }
        for d in stage_deps {
            g.add_prereq(id, ids[*d]);
        }
        ids.push(id);
    }
    (g, ids)
}

proptest! {
    #[test]
    fn every_stage_follows_its_prerequisites(deps in dag_strategy(12)) {
        let (g, ids) = build(&deps);
        let order = topo_order(&g).unwrap();

        prop_assert_eq!(order.len(), ids.len() + 1);
        prop_assert_eq!(order[0], g.root());

        let position: HashMap<StageId, usize> =
            order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for id in &ids {
            for p in g.prereqs_of(*id) {
                prop_assert!(position[p] < position[id]);
            }
        }
    }

    #[test]
    fn back_edge_is_always_a_cycle(deps in dag_strategy(8)) {
        prop_assume!(deps.len() > 1);
        let (mut g, ids) = build(&deps);
        let first = ids[0];
        let last = ids[ids.len() - 1];

        g.add_prereq(last, first);
        g.add_prereq(first, last);
        prop_assert!(topo_order(&g).is_err());
    }
}
