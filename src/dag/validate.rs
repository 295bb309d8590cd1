// src/dag/validate.rs

use std::collections::HashMap;

use tracing::error;

use crate::errors::{Result, StagehandError};
use crate::params::shortened_key_orders;
use crate::stage::{StageGraph, StageId};

/// Reject orders in which two stages share a display name (they would share
/// a directory), or in which a name is not a single path component.
pub fn validate_unique_names(graph: &StageGraph, order: &[StageId]) -> Result<()> {
    let all: Vec<String> = order.iter().map(|id| graph.name_of(*id)).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &all {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    // Report the first duplicate in scheduling order.
    if let Some(name) = all.iter().find(|n| counts[n.as_str()] > 1) {
        let copies = counts[name.as_str()];
        error!(stage = %name, copies, "multiple stages have the same name");
        return Err(StagehandError::DuplicateStageName {
            name: name.clone(),
            copies,
            all: all.clone(),
        });
    }

    if let Some(name) = all.iter().find(|n| !is_dir_component(n)) {
        error!(stage = %name, "stage name is not a usable directory name");
        return Err(StagehandError::InvalidStageName(name.clone()));
    }
    Ok(())
}

fn is_dir_component(name: &str) -> bool {
    !matches!(name, "" | "." | "..") && !name.contains('/')
}

/// Shorten the display names of every parameter stage in `order` as one
/// cohort.
pub fn shorten_stage_names(graph: &mut StageGraph, order: &[StageId]) {
    let param_stages: Vec<StageId> = order
        .iter()
        .copied()
        .filter(|id| graph.stage(*id).params().is_some())
        .collect();

    let orders = {
        let cohort: Vec<_> = param_stages
            .iter()
            .filter_map(|id| graph.stage(*id).params())
            .collect();
        shortened_key_orders(&cohort)
    };

    for (id, key_order) in param_stages.into_iter().zip(orders) {
        if let Some(params) = graph.stage_mut(id).params_mut() {
            params.set_key_order(Some(key_order));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SequentialIds;
    use crate::params::ParamSet;
    use crate::stage::{Stage, StaticScript};

    #[test]
    fn duplicate_names_are_rejected_with_counts() {
        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let root = g.root();
        let a1 = g.add_stage(Stage::script("a", ""));
        let a2 = g.add_stage(Stage::script("a", ""));
        g.add_dependents(root, [a1, a2]);

        let err = validate_unique_names(&g, &[root, a1, a2]).unwrap_err();
        match err {
            StagehandError::DuplicateStageName { name, copies, all } => {
                assert_eq!(name, "a");
                assert_eq!(copies, 2);
                assert_eq!(all, vec!["root_stage", "a", "a"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn names_that_are_not_directory_components_are_rejected() {
        for bad in ["", ".", "..", "a/b", "/abs"] {
            let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
            let root = g.root();
            let s = g.add_stage(Stage::script(bad, ""));
            g.add_prereq(s, root);

            match validate_unique_names(&g, &[root, s]) {
                Err(StagehandError::InvalidStageName(name)) => assert_eq!(name, bad),
                other => panic!("{bad:?} gave {other:?}"),
            }
        }
    }

    #[test]
    fn lone_parameter_stage_with_shortened_away_keys_is_rejected() {
        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let root = g.root();
        let p = ParamSet::from_pairs([("lr", 0.1)]);
        let id = g.add_stage(Stage::from_params(p, StaticScript::default()));
        g.add_prereq(id, root);

        shorten_stage_names(&mut g, &[root, id]);
        assert!(matches!(
            validate_unique_names(&g, &[root, id]),
            Err(StagehandError::InvalidStageName(name)) if name.is_empty()
        ));
    }

    #[test]
    fn parameter_stage_names_are_shortened_together() {
        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let root = g.root();
        let mut ids = vec![root];
        for seed in 1..=2 {
            let mut p = ParamSet::new();
            p.insert("lr", 0.1);
            p.insert("seed", seed);
            let id = g.add_stage(Stage::from_params(p, StaticScript::default()));
            g.add_prereq(id, root);
            ids.push(id);
        }

        shorten_stage_names(&mut g, &ids);
        assert_eq!(g.name_of(ids[1]), "1");
        assert_eq!(g.name_of(ids[2]), "2");
    }
}
