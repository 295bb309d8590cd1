// src/stage/graph.rs

//! Stage arena and dependency edges.
//!
//! Stages are owned by a [`StageGraph`] and addressed by [`StageId`]. The
//! synthetic root is created with the graph and is always `StageId(0)`;
//! every other stage should hang off it (directly or transitively) to be
//! picked up by the scheduler.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::naming::{self, IdAllocator, RandomIds};
use crate::params::ParamSet;
use crate::stage::capability::{CompletionPolicy, MarkerFile, ScriptBody, StaticScript};
use crate::stage::fanout::FanOut;
use crate::stage::resources::{EffectiveResources, ResourceRequest};

/// Reserved display name of the root stage.
pub const ROOT_STAGE_NAME: &str = "root_stage";

/// Handle to a stage inside a [`StageGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) usize);

impl StageId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a stage's display name comes from.
#[derive(Debug, Clone)]
pub enum StageIdentity {
    Root,
    Named(String),
    Params(ParamSet),
}

/// What the engine recorded when it handed a stage to a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_name: String,
    /// `None` when the stage reused a live submission from an earlier pass.
    pub teardown_script: Option<PathBuf>,
    pub reused: bool,
}

/// A unit of work.
#[derive(Clone)]
pub struct Stage {
    identity: StageIdentity,
    prereqs: Vec<StageId>,
    dependents: Vec<StageId>,
    resources: ResourceRequest,
    completion: Arc<dyn CompletionPolicy>,
    body: Arc<dyn ScriptBody>,
    fan_out: Option<FanOut>,
    disambiguator: Option<u64>,

    work_dir: Option<PathBuf>,
    effective: Option<EffectiveResources>,
    submission: Option<Submission>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name())
            .field("prereqs", &self.prereqs)
            .field("dependents", &self.dependents)
            .field("resources", &self.resources)
            .field("completion", &self.completion)
            .field("fan_out", &self.fan_out.is_some())
            .field("work_dir", &self.work_dir)
            .finish_non_exhaustive()
    }
}

impl Stage {
    fn with_identity(identity: StageIdentity, body: Arc<dyn ScriptBody>) -> Self {
        Self {
            identity,
            prereqs: Vec::new(),
            dependents: Vec::new(),
            resources: ResourceRequest::default(),
            completion: Arc::new(MarkerFile::default()),
            body,
            fan_out: None,
            disambiguator: None,
            work_dir: None,
            effective: None,
            submission: None,
        }
    }

    fn root() -> Self {
        Self::with_identity(StageIdentity::Root, Arc::new(StaticScript::default()))
    }

    /// A stage with a fixed name and a generated body.
    pub fn named(name: impl Into<String>, body: impl ScriptBody + 'static) -> Self {
        Self::with_identity(StageIdentity::Named(name.into()), Arc::new(body))
    }

    /// A stage with a fixed name and a literal script body.
    pub fn script(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self::named(name, StaticScript(script.into()))
    }

    /// A stage named after its parameter set.
    pub fn from_params(params: ParamSet, body: impl ScriptBody + 'static) -> Self {
        Self::with_identity(StageIdentity::Params(params), Arc::new(body))
    }

    /// A stage that expands into one child per input shard before running
    /// its own body.
    pub fn fan_out(name: impl Into<String>, fan_out: FanOut, body: impl ScriptBody + 'static) -> Self {
        let mut stage = Self::named(name, body);
        stage.fan_out = Some(fan_out);
        stage
    }

    pub fn with_resources(mut self, resources: ResourceRequest) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_mem_mb(mut self, mem_mb: u64) -> Self {
        self.resources.mem_mb = Some(mem_mb);
        self
    }

    pub fn with_threads(mut self, threads: u32) -> Self {
        self.resources.threads = Some(threads);
        self
    }

    pub fn with_minutes(mut self, minutes: u64) -> Self {
        self.resources.minutes = Some(minutes);
        self
    }

    pub fn with_completion(mut self, policy: impl CompletionPolicy + 'static) -> Self {
        self.completion = Arc::new(policy);
        self
    }

    /// Pin the disambiguator instead of drawing one at registration.
    pub fn with_disambiguator(mut self, id: u64) -> Self {
        self.disambiguator = Some(id);
        self
    }

    pub fn with_body(mut self, body: impl ScriptBody + 'static) -> Self {
        self.body = Arc::new(body);
        self
    }

    pub(crate) fn with_shared_body(mut self, body: Arc<dyn ScriptBody>) -> Self {
        self.body = body;
        self
    }

    pub fn is_root(&self) -> bool {
        matches!(self.identity, StageIdentity::Root)
    }

    pub fn identity(&self) -> &StageIdentity {
        &self.identity
    }

    /// Display name: also the stage directory name.
    pub fn name(&self) -> String {
        match &self.identity {
            StageIdentity::Root => ROOT_STAGE_NAME.to_string(),
            StageIdentity::Named(name) => name.clone(),
            StageIdentity::Params(params) => params.display_name(),
        }
    }

    pub fn params(&self) -> Option<&ParamSet> {
        match &self.identity {
            StageIdentity::Params(params) => Some(params),
            _ => None,
        }
    }

    pub fn params_mut(&mut self) -> Option<&mut ParamSet> {
        match &mut self.identity {
            StageIdentity::Params(params) => Some(params),
            _ => None,
        }
    }

    pub fn prereqs(&self) -> &[StageId] {
        &self.prereqs
    }

    pub fn dependents(&self) -> &[StageId] {
        &self.dependents
    }

    pub fn resources(&self) -> &ResourceRequest {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut ResourceRequest {
        &mut self.resources
    }

    pub fn completion(&self) -> &Arc<dyn CompletionPolicy> {
        &self.completion
    }

    pub fn marker(&self) -> &str {
        self.completion.marker()
    }

    pub fn body(&self) -> &Arc<dyn ScriptBody> {
        &self.body
    }

    pub fn fan_out_spec(&self) -> Option<&FanOut> {
        self.fan_out.as_ref()
    }

    pub fn disambiguator(&self) -> Option<u64> {
        self.disambiguator
    }

    /// Batch-system job name. Stages not yet registered in a graph use 0.
    pub fn submission_name(&self) -> String {
        naming::submission_name(&self.name(), self.disambiguator.unwrap_or(0))
    }

    pub fn work_dir(&self) -> Option<&Path> {
        self.work_dir.as_deref()
    }

    pub fn effective_resources(&self) -> Option<&EffectiveResources> {
        self.effective.as_ref()
    }

    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    pub(crate) fn set_work_dir(&mut self, dir: PathBuf) {
        self.work_dir = Some(dir);
    }

    pub(crate) fn set_effective_resources(&mut self, resources: EffectiveResources) {
        self.effective = Some(resources);
    }

    pub(crate) fn set_submission(&mut self, submission: Submission) {
        self.submission = Some(submission);
    }

    /// Whether this stage's own marker is present. Ignores prerequisites.
    pub fn is_marked(&self) -> bool {
        match (&self.identity, &self.work_dir) {
            (StageIdentity::Root, _) => true,
            (_, Some(dir)) => self.completion.is_marked(dir),
            (_, None) => false,
        }
    }

    /// A fresh copy without edges, run-time state or disambiguator.
    pub(crate) fn detached(&self) -> Self {
        let mut copy = self.clone();
        copy.prereqs.clear();
        copy.dependents.clear();
        copy.disambiguator = None;
        copy.work_dir = None;
        copy.effective = None;
        copy.submission = None;
        copy
    }

    pub(crate) fn set_identity(&mut self, identity: StageIdentity) {
        self.identity = identity;
    }
}

/// Arena of stages with symmetric prerequisite/dependent edges.
pub struct StageGraph {
    stages: Vec<Stage>,
    ids: Box<dyn IdAllocator>,
}

impl fmt::Debug for StageGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageGraph")
            .field("stages", &self.stages)
            .field("ids", &self.ids)
            .finish()
    }
}

impl Default for StageGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StageGraph {
    /// An empty graph (just the root) drawing random disambiguators.
    pub fn new() -> Self {
        Self::with_allocator(Box::new(RandomIds))
    }

    pub fn with_allocator(ids: Box<dyn IdAllocator>) -> Self {
        Self {
            stages: vec![Stage::root()],
            ids,
        }
    }

    pub fn root(&self) -> StageId {
        StageId(0)
    }

    /// Register a stage and draw its disambiguator unless it already has one.
    pub fn add_stage(&mut self, mut stage: Stage) -> StageId {
        if stage.disambiguator.is_none() {
            stage.disambiguator = Some(self.ids.next_id());
        }
        let id = StageId(self.stages.len());
        self.stages.push(stage);
        id
    }

    /// `stage` runs after `prereq`. Adding an existing edge is a no-op.
    pub fn add_prereq(&mut self, stage: StageId, prereq: StageId) {
        if self.stages[stage.0].prereqs.contains(&prereq) {
            return;
        }
        self.stages[stage.0].prereqs.push(prereq);
        self.stages[prereq.0].dependents.push(stage);
    }

    pub fn add_prereqs(&mut self, stage: StageId, prereqs: impl IntoIterator<Item = StageId>) {
        for prereq in prereqs {
            self.add_prereq(stage, prereq);
        }
    }

    /// `dependent` runs after `stage`.
    pub fn add_dependent(&mut self, stage: StageId, dependent: StageId) {
        self.add_prereq(dependent, stage);
    }

    pub fn add_dependents(&mut self, stage: StageId, dependents: impl IntoIterator<Item = StageId>) {
        for dependent in dependents {
            self.add_dependent(stage, dependent);
        }
    }

    pub fn get(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(id.0)
    }

    /// # Panics
    ///
    /// If `id` was not produced by this graph.
    pub fn stage(&self, id: StageId) -> &Stage {
        &self.stages[id.0]
    }

    pub fn stage_mut(&mut self, id: StageId) -> &mut Stage {
        &mut self.stages[id.0]
    }

    pub fn prereqs_of(&self, id: StageId) -> &[StageId] {
        &self.stages[id.0].prereqs
    }

    pub fn dependents_of(&self, id: StageId) -> &[StageId] {
        &self.stages[id.0].dependents
    }

    pub fn name_of(&self, id: StageId) -> String {
        self.stages[id.0].name()
    }

    pub fn ids(&self) -> impl Iterator<Item = StageId> + '_ {
        (0..self.stages.len()).map(StageId)
    }

    /// Number of stages, root included.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.len() <= 1
    }

    /// A stage is complete iff its marker exists and every transitive
    /// prerequisite is complete. Always read from disk.
    pub fn is_complete(&self, id: StageId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            if !self.stages[current.0].is_marked() {
                return false;
            }
            stack.extend(self.stages[current.0].prereqs.iter().copied());
        }
        true
    }

    /// Working directories of a stage's prerequisites, root excluded.
    pub fn prereq_dirs(&self, id: StageId) -> Vec<PathBuf> {
        self.stages[id.0]
            .prereqs
            .iter()
            .filter_map(|p| self.stages[p.0].work_dir.clone())
            .collect()
    }

    pub(crate) fn draw_id(&mut self) -> u64 {
        self.ids.next_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::SequentialIds;

    fn graph() -> StageGraph {
        StageGraph::with_allocator(Box::new(SequentialIds::starting_at(1)))
    }

    #[test]
    fn root_is_zero_and_reserved() {
        let g = graph();
        assert_eq!(g.root(), StageId(0));
        assert_eq!(g.name_of(g.root()), ROOT_STAGE_NAME);
        assert!(g.is_complete(g.root()));
        assert!(g.is_empty());
    }

    #[test]
    fn edges_are_symmetric_and_deduplicated() {
        let mut g = graph();
        let root = g.root();
        let a = g.add_stage(Stage::script("a", "true"));
        let b = g.add_stage(Stage::script("b", "true"));
        g.add_prereq(a, root);
        g.add_dependent(a, b);
        g.add_prereq(b, a);

        assert_eq!(g.prereqs_of(b), &[a]);
        assert_eq!(g.dependents_of(a), &[b]);
        assert_eq!(g.dependents_of(root), &[a]);
    }

    #[test]
    fn registration_draws_disambiguators() {
        let mut g = graph();
        let a = g.add_stage(Stage::script("a", "true"));
        let b = g.add_stage(Stage::script("b", "true").with_disambiguator(99));
        assert_eq!(g.stage(a).disambiguator(), Some(1));
        assert_eq!(g.stage(b).disambiguator(), Some(99));
        assert_eq!(g.stage(a).submission_name(), "a_1");
    }

    #[test]
    fn completion_requires_transitive_markers() {
        let dir = tempfile::tempdir().unwrap();
        let mut g = graph();
        let root = g.root();
        let a = g.add_stage(Stage::script("a", "true"));
        let b = g.add_stage(Stage::script("b", "true"));
        g.add_prereq(a, root);
        g.add_prereq(b, a);

        for (id, name) in [(a, "a"), (b, "b")] {
            let d = dir.path().join(name);
            std::fs::create_dir_all(&d).unwrap();
            g.stage_mut(id).set_work_dir(d);
        }
        assert!(!g.is_complete(b));

        std::fs::write(dir.path().join("b/DONE"), b"").unwrap();
        assert!(!g.is_complete(b), "a is not complete yet");

        std::fs::write(dir.path().join("a/DONE"), b"").unwrap();
        assert!(g.is_complete(b));
    }

    #[test]
    fn stage_without_work_dir_is_incomplete() {
        let mut g = graph();
        let a = g.add_stage(Stage::script("a", "true"));
        assert!(!g.is_complete(a));
    }
}
