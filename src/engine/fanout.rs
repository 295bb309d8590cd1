// src/engine/fanout.rs

//! Run-time expansion of fan-out stages.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::errors::{Result, StagehandError};
use crate::stage::fanout::child_name;
use crate::stage::{Stage, StageGraph, StageId};

/// Poll until every prerequisite of `id` is complete.
///
/// Fails with [`StagehandError::FanOutTimeout`] once `max_wait` has passed;
/// without a maximum it waits forever.
pub async fn wait_for_prereqs(
    graph: &StageGraph,
    id: StageId,
    poll_interval: Duration,
    max_wait: Option<Duration>,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let pending: Vec<String> = graph
            .prereqs_of(id)
            .iter()
            .filter(|p| !graph.is_complete(**p))
            .map(|p| graph.name_of(*p))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let waited = start.elapsed();
        if max_wait.is_some_and(|max| waited >= max) {
            return Err(StagehandError::FanOutTimeout {
                stage: graph.name_of(id),
                waited_secs: waited.as_secs(),
            });
        }

        debug!(stage = %graph.name_of(id), ?pending, "waiting for prerequisites");
        sleep(poll_interval).await;
    }
}

/// Discover the shards of fan-out stage `id` and register one child per
/// shard as a prerequisite of it. Returns the children in shard order.
pub fn expand_children(graph: &mut StageGraph, id: StageId) -> Result<Vec<StageId>> {
    let parent = graph.stage(id);
    let Some(fan_out) = parent.fan_out_spec().cloned() else {
        return Ok(Vec::new());
    };
    let parent_name = parent.name();
    let resources = *parent.resources();

    let shards = fan_out.discover()?;
    info!(stage = %parent_name, shards = shards.len(), "expanding fan-out stage");

    // Children are reported by name, so they must not shadow an existing stage.
    let existing: Vec<String> = graph.ids().map(|s| graph.name_of(s)).collect();
    if let Some(name) = shards
        .iter()
        .map(|shard| child_name(&parent_name, &shard.number))
        .find(|name| existing.contains(name))
    {
        error!(stage = %parent_name, child = %name, "fan-out child name is already taken");
        return Err(StagehandError::DuplicateStageName {
            name,
            copies: 2,
            all: existing,
        });
    }

    let mut children = Vec::with_capacity(shards.len());
    for shard in shards {
        let name = child_name(&parent_name, &shard.number);
        let child = Stage::named(name, fan_out.child_body(shard)).with_resources(resources);
        let child_id = graph.add_stage(child);
        graph.add_prereq(id, child_id);
        children.push(child_id);
    }
    Ok(children)
}

/// Working directory of a shard child inside its parent's directory.
pub fn child_dir(parent_dir: &Path, child_name: &str) -> PathBuf {
    parent_dir.join(format!("shard-{child_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SequentialIds;
    use crate::stage::{shard_fn, FanOut, StaticScript};

    #[tokio::test]
    async fn waiting_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let pre = g.add_stage(Stage::script("pre", ""));
        g.stage_mut(pre).set_work_dir(dir.path().join("pre"));
        let fan = g.add_stage(Stage::script("fan", ""));
        g.add_prereq(fan, pre);

        let err = wait_for_prereqs(
            &g,
            fan,
            Duration::from_millis(10),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
        match err {
            StagehandError::FanOutTimeout { stage, .. } => assert_eq!(stage, "fan"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_prereqs_return_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let pre = g.add_stage(Stage::script("pre", ""));
        std::fs::write(dir.path().join("DONE"), b"").unwrap();
        g.stage_mut(pre).set_work_dir(dir.path().to_path_buf());
        let fan = g.add_stage(Stage::script("fan", ""));
        g.add_prereq(fan, pre);

        wait_for_prereqs(&g, fan, Duration::from_secs(3600), None).await.unwrap();
    }

    #[test]
    fn children_become_prereqs_of_the_parent() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["1", "2"] {
            std::fs::write(dir.path().join(format!("in_{n}.shard")), b"").unwrap();
        }
        let fan_out = FanOut::new(
            format!("{}/in_*.shard", dir.path().display()),
            shard_fn(|_, shard| Ok(format!("process {}\n", shard.input.display()))),
        );

        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        let fan = g.add_stage(Stage::fan_out("split", fan_out, StaticScript::default()).with_threads(3));
        let children = expand_children(&mut g, fan).unwrap();

        let names: Vec<String> = children.iter().map(|c| g.name_of(*c)).collect();
        assert_eq!(names, vec!["split-1", "split-2"]);
        assert_eq!(g.prereqs_of(fan), children.as_slice());
        assert_eq!(g.stage(children[0]).resources().threads, Some(3));
        assert_eq!(child_dir(Path::new("/r/split"), "split-1"), Path::new("/r/split/shard-split-1"));
    }

    #[test]
    fn child_names_may_not_shadow_existing_stages() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("in_1.shard"), b"").unwrap();
        let fan_out = FanOut::new(
            format!("{}/in_*.shard", dir.path().display()),
            shard_fn(|_, _| Ok(String::new())),
        );

        let mut g = StageGraph::with_allocator(Box::new(SequentialIds::default()));
        g.add_stage(Stage::script("split-1", ""));
        let fan = g.add_stage(Stage::fan_out("split", fan_out, StaticScript::default()));
        let before = g.ids().count();

        match expand_children(&mut g, fan).unwrap_err() {
            StagehandError::DuplicateStageName { name, copies, .. } => {
                assert_eq!(name, "split-1");
                assert_eq!(copies, 2);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(g.ids().count(), before);
        assert!(g.prereqs_of(fan).is_empty());
    }
}
