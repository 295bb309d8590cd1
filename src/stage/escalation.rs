// src/stage/escalation.rs

//! Memory escalation chains.
//!
//! A stage that might run out of memory is followed by copies of itself with
//! doubled memory. Each copy waits on its predecessor: if the predecessor
//! finished, the copy just marks itself done; if it died with an
//! `OutOfMemoryError`, the copy runs; any other failure stops the chain.

use std::sync::Arc;

use crate::params::ParamSet;
use crate::stage::capability::{ChainedScript, ScriptBody, StageContext};
use crate::stage::graph::{StageGraph, StageId, StageIdentity};

/// Parameter holding the memory budget of a parameter stage.
pub const WORK_MEM_KEY: &str = "work_mem_megs";

/// Parameter added to each escalated copy so its name differs.
pub const MEMORY_KEY: &str = "memory";

const PREDECESSOR_GRACE_SECS: u32 = 30;
const OOM_SCAN_LINES: u32 = 1000;

/// Prepended to every escalated copy: decide whether this copy needs to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredecessorCheck;

impl ScriptBody for PredecessorCheck {
    fn render(&self, ctx: &StageContext<'_>) -> anyhow::Result<String> {
        let mut script = String::from("\n");
        for dir in &ctx.prereq_dirs {
            script.push_str(&format!(
                r#"PREREQ_DIR={dir}
echo "Sleeping for {grace} seconds"
sleep {grace}
if [[ -e $PREREQ_DIR/{marker} ]] ; then
    echo "Previous stage ran successfully. Marking {marker} and exiting."
    touch {marker}
    exit 0
elif [[ `tail -n {lines} $PREREQ_DIR/stdout | grep "OutOfMemoryError"` ]] ; then
    echo "Previous stage failed on OutOfMemoryError. Running this stage."
else
    echo "Previous stage failed with a different error. Not marking {marker} and exiting."
    exit 1
fi
"#,
                dir = dir.display(),
                grace = PREDECESSOR_GRACE_SECS,
                marker = ctx.marker,
                lines = OOM_SCAN_LINES,
            ));
        }
        Ok(script)
    }
}

/// Register doubled-memory copies of `stage`, each a dependent of the
/// previous one. Returns the whole chain, `stage` first.
///
/// The starting budget is the `work_mem_megs` parameter when present, else
/// the stage's memory request; with neither, the chain is just `stage`.
/// Doubling stops after `max_doublings` or once the budget would exceed
/// `max_mem_mb`.
pub fn memory_escalation_chain(
    graph: &mut StageGraph,
    stage: StageId,
    max_mem_mb: u64,
    max_doublings: u32,
) -> Vec<StageId> {
    let mut chain = vec![stage];
    let base = graph.stage(stage);
    let start = base
        .params()
        .and_then(|p| p.get(WORK_MEM_KEY))
        .and_then(|v| v.as_f64())
        .map(|v| v as u64)
        .or(base.resources().mem_mb);
    let Some(mut mem) = start else {
        return chain;
    };

    for _ in 0..max_doublings {
        mem = mem.saturating_mul(2);
        if mem > max_mem_mb {
            break;
        }
        let copy = escalated_copy(graph, stage, mem);
        let id = graph.add_stage(copy);
        if let Some(&previous) = chain.last() {
            graph.add_prereq(id, previous);
        }
        chain.push(id);
    }
    chain
}

fn escalated_copy(graph: &StageGraph, stage: StageId, mem: u64) -> crate::stage::Stage {
    let base = graph.stage(stage);
    let mut copy = base.detached();
    copy.resources_mut().mem_mb = Some(mem);

    let identity = match base.identity() {
        StageIdentity::Params(params) => {
            let mut params: ParamSet = params.copy_with([(WORK_MEM_KEY, mem)]);
            params.set(MEMORY_KEY, format!("{mem}M"), true, false);
            StageIdentity::Params(params)
        }
        StageIdentity::Named(name) => StageIdentity::Named(format!("{name}-{mem}M")),
        StageIdentity::Root => StageIdentity::Root,
    };
    copy.set_identity(identity);

    let body: Arc<dyn ScriptBody> = Arc::new(ChainedScript(vec![
        Arc::new(PredecessorCheck),
        Arc::clone(base.body()),
    ]));
    copy.with_shared_body(body)
}
