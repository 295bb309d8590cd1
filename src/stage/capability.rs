// src/stage/capability.rs

//! Capabilities a stage carries: how to produce its script body, and how to
//! tell whether it has completed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::params::ParamSet;
use crate::stage::resources::EffectiveResources;

/// Default completion marker file name.
pub const DEFAULT_MARKER: &str = "DONE";

/// Marker used by stages that the relaunch monitor should always resubmit.
pub const RELAUNCH_MARKER: &str = "DONE_BUT_RELAUNCH";

/// Everything a script body may need to know about the stage being run.
#[derive(Debug, Clone)]
pub struct StageContext<'a> {
    pub name: &'a str,
    pub work_dir: &'a Path,
    pub params: Option<&'a ParamSet>,
    pub resources: &'a EffectiveResources,
    /// Name of the marker file the engine will touch on success.
    pub marker: &'a str,
    /// Working directories of the prerequisites that have one (not the root).
    pub prereq_dirs: Vec<PathBuf>,
}

/// Produces the stage-specific part of the executable script.
pub trait ScriptBody: Send + Sync {
    fn render(&self, ctx: &StageContext<'_>) -> anyhow::Result<String>;
}

/// A fixed script body.
#[derive(Debug, Clone, Default)]
pub struct StaticScript(pub String);

impl ScriptBody for StaticScript {
    fn render(&self, _ctx: &StageContext<'_>) -> anyhow::Result<String> {
        Ok(self.0.clone())
    }
}

/// Script body backed by a closure. Build it with [`script_fn`].
pub struct ScriptFn<F>(F);

/// Wrap a closure as a [`ScriptBody`].
pub fn script_fn<F>(f: F) -> ScriptFn<F>
where
    F: Fn(&StageContext<'_>) -> anyhow::Result<String> + Send + Sync,
{
    ScriptFn(f)
}

impl<F> ScriptBody for ScriptFn<F>
where
    F: Fn(&StageContext<'_>) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, ctx: &StageContext<'_>) -> anyhow::Result<String> {
        (self.0)(ctx)
    }
}

/// Several bodies rendered one after another.
#[derive(Clone, Default)]
pub struct ChainedScript(pub Vec<Arc<dyn ScriptBody>>);

impl ScriptBody for ChainedScript {
    fn render(&self, ctx: &StageContext<'_>) -> anyhow::Result<String> {
        let mut script = String::new();
        for part in &self.0 {
            script.push_str(&part.render(ctx)?);
        }
        Ok(script)
    }
}

/// Decides whether a stage's own work is done.
///
/// Transitive completion (all prerequisites complete too) is handled by the
/// graph; a policy only looks at the stage's own directory.
pub trait CompletionPolicy: Send + Sync + fmt::Debug {
    /// File the composed script touches on success.
    fn marker(&self) -> &str;

    fn is_marked(&self, work_dir: &Path) -> bool {
        work_dir.join(self.marker()).exists()
    }
}

/// The standard policy: a zero-byte marker file in the stage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerFile {
    name: String,
}

impl MarkerFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// A marker the relaunch monitor never recognises, so the stage is
    /// resubmitted on every relaunch pass.
    pub fn always_relaunch() -> Self {
        Self::new(RELAUNCH_MARKER)
    }
}

impl Default for MarkerFile {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl CompletionPolicy for MarkerFile {
    fn marker(&self) -> &str {
        &self.name
    }
}
