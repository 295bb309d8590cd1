// src/engine/runner.rs

//! The pipeline runner.
//!
//! One pass over the topological order. For every stage:
//!
//! 1. assign its working directory and effective resources
//! 2. skip it if it is already complete on disk
//! 3. expand it if it is a fan-out stage (children run first)
//! 4. compose, persist and launch its script
//!
//! Sequential failures and rejected submissions abort the pass; whatever
//! was recorded up to that point stays available through
//! [`PipelineRunner::report`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use crate::config::RunConfig;
use crate::dag;
use crate::engine::fanout::{child_dir, expand_children, wait_for_prereqs};
use crate::engine::settings::RunSettings;
use crate::engine::state::{RunReport, StageRecord, StageState};
use crate::errors::Result;
use crate::exec::script::{
    compose_script, new_directory, write_script, EXPERIMENT_SCRIPT_PREFIX,
};
use crate::exec::{LaunchOutcome, LaunchRequest, LocalBackend, QueueBackend, StageBackend};
use crate::naming::{global_teardown_script, stage_dir, GLOBAL_TEARDOWN_PREFIX};
use crate::params::PARAMS_FILE;
use crate::queue::{dialect_for_queue, resolve, QstatStatus, QueueDialect};
use crate::stage::{StageContext, StageGraph, StageId, Submission};

/// Name of the directory under the root that holds numbered run directories.
pub const RUNS_DIR: &str = "exp";

pub struct PipelineRunner {
    settings: RunSettings,
    backend: Box<dyn StageBackend>,
    report: RunReport,
    teardowns: Vec<PathBuf>,
}

impl PipelineRunner {
    pub fn new(settings: RunSettings, backend: Box<dyn StageBackend>) -> Self {
        Self {
            settings,
            backend,
            report: RunReport::default(),
            teardowns: Vec::new(),
        }
    }

    /// Runner with the backend the configuration asks for: local `bash`
    /// without a queue, SGE submission with one.
    pub fn from_config(cfg: &RunConfig) -> Self {
        let backend: Box<dyn StageBackend> = match cfg.queue.as_deref() {
            None => Box::new(LocalBackend::new(cfg.print_to_console, cfg.tail_lines)),
            Some(queue) => {
                let dialect: Arc<dyn QueueDialect> = Arc::from(dialect_for_queue(Some(queue)));
                let status = Arc::new(QstatStatus::new(Arc::clone(&dialect)));
                Box::new(QueueBackend::new(dialect).with_status(status))
            }
        };
        Self::new(RunSettings::from(cfg), backend)
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Record of the latest (possibly aborted) pass.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Run every stage reachable from the graph root.
    pub async fn run_pipeline(&mut self, graph: &mut StageGraph) -> Result<RunReport> {
        let order = dag::schedule(graph)?;
        let run_dir = self.prepare_run_dir()?;
        info!(
            run_dir = ?run_dir,
            stages = order.len().saturating_sub(1),
            queued = self.backend.is_queued(),
            dry_run = self.settings.dry_run,
            "starting pipeline"
        );

        self.teardowns.clear();
        self.report = RunReport {
            run_dir: run_dir.clone(),
            stages: order
                .iter()
                .filter(|id| !graph.stage(**id).is_root())
                .map(|id| {
                    let name = graph.name_of(*id);
                    StageRecord {
                        work_dir: stage_dir(&run_dir, &name),
                        name,
                        state: StageState::Pending,
                        job_name: None,
                    }
                })
                .collect(),
            global_teardown: None,
        };

        for id in order {
            if graph.stage(id).is_root() {
                continue;
            }
            let work_dir = stage_dir(&run_dir, &graph.name_of(id));
            self.visit(graph, id, work_dir).await?;
        }

        if self.backend.is_queued() {
            let script = write_script(
                &run_dir,
                GLOBAL_TEARDOWN_PREFIX,
                &global_teardown_script(&self.teardowns),
            )?;
            info!(script = ?script, "wrote global teardown script");
            self.report.global_teardown = Some(script);
        }

        info!(
            complete = self.report.count(StageState::Complete),
            skipped = self.report.count(StageState::Skipped),
            submitted = self.report.count(StageState::Running),
            "pipeline pass finished"
        );
        Ok(self.report.clone())
    }

    fn prepare_run_dir(&self) -> Result<PathBuf> {
        match &self.settings.run_dir {
            Some(dir) => {
                fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
                Ok(dir.clone())
            }
            None => new_directory(&self.settings.root_dir.join(RUNS_DIR), &self.settings.name),
        }
    }

    async fn visit(&mut self, graph: &mut StageGraph, id: StageId, work_dir: PathBuf) -> Result<()> {
        let result = self.visit_inner(graph, id, work_dir).await;
        if result.is_err() {
            self.record(&graph.name_of(id), StageState::Failed, None);
        }
        result
    }

    async fn visit_inner(&mut self, graph: &mut StageGraph, id: StageId, work_dir: PathBuf) -> Result<()> {
        if self.skip_if_complete(graph, id, &work_dir)? {
            return Ok(());
        }

        if graph.stage(id).fan_out_spec().is_some() {
            if !self.settings.dry_run {
                wait_for_prereqs(graph, id, self.settings.poll_interval, self.settings.max_wait).await?;
            }
            let children = expand_children(graph, id)?;
            self.insert_child_records(graph, id, &children, &work_dir);

            for child in children {
                let child_work_dir = child_dir(&work_dir, &graph.name_of(child));
                let result = self.run_leaf(graph, child, child_work_dir).await;
                if result.is_err() {
                    self.record(&graph.name_of(child), StageState::Failed, None);
                }
                result?;
            }
        }

        self.launch_stage(graph, id, &work_dir).await
    }

    async fn run_leaf(&mut self, graph: &mut StageGraph, id: StageId, work_dir: PathBuf) -> Result<()> {
        if self.skip_if_complete(graph, id, &work_dir)? {
            return Ok(());
        }
        self.launch_stage(graph, id, &work_dir).await
    }

    /// Assign directory and resources; returns `true` if the stage is
    /// already complete.
    fn skip_if_complete(&mut self, graph: &mut StageGraph, id: StageId, work_dir: &Path) -> Result<bool> {
        fs::create_dir_all(work_dir).with_context(|| format!("creating {}", work_dir.display()))?;

        let stage = graph.stage_mut(id);
        stage.set_work_dir(work_dir.to_path_buf());
        let effective = resolve(
            stage.resources(),
            &self.settings.defaults,
            self.settings.queue.as_deref(),
        );
        stage.set_effective_resources(effective);

        if graph.is_complete(id) {
            let name = graph.name_of(id);
            info!(stage = %name, marker = %graph.stage(id).marker(), "skipping completed stage");
            self.record(&name, StageState::Skipped, None);
            return Ok(true);
        }
        Ok(false)
    }

    async fn launch_stage(&mut self, graph: &mut StageGraph, id: StageId, work_dir: &Path) -> Result<()> {
        let stage = graph.stage(id);
        let name = stage.name();
        let job_name = stage.submission_name();
        let marker = stage.marker().to_string();
        let Some(resources) = stage.effective_resources().cloned() else {
            return Err(anyhow::anyhow!("stage '{name}' has no resolved resources").into());
        };

        if self.backend.is_queued()
            && let Some(live) = self.backend.live_submission(work_dir.to_path_buf()).await?
        {
            info!(stage = %name, job = %live, "earlier submission still alive; not resubmitting");
            graph.stage_mut(id).set_submission(Submission {
                job_name: live.clone(),
                teardown_script: None,
                reused: true,
            });
            self.record(&name, StageState::Running, Some(live));
            return Ok(());
        }

        let body = {
            let stage = graph.stage(id);
            let ctx = StageContext {
                name: &name,
                work_dir,
                params: stage.params(),
                resources: &resources,
                marker: &marker,
                prereq_dirs: graph.prereq_dirs(id),
            };
            stage
                .body()
                .render(&ctx)
                .with_context(|| format!("rendering script for stage '{name}'"))?
        };
        if let Some(params) = graph.stage(id).params() {
            params.write_to(work_dir.join(PARAMS_FILE))?;
        }

        let script = write_script(
            work_dir,
            EXPERIMENT_SCRIPT_PREFIX,
            &compose_script(self.settings.setupenv.as_deref(), &body, &marker),
        )?;

        let holds: Vec<String> = graph
            .prereqs_of(id)
            .iter()
            .filter_map(|p| graph.stage(*p).submission().map(|s| s.job_name.clone()))
            .collect();

        let outcome = self
            .backend
            .launch(LaunchRequest {
                stage: name.clone(),
                job_name,
                work_dir: work_dir.to_path_buf(),
                script,
                resources,
                holds,
                marker,
                dry_run: self.settings.dry_run,
            })
            .await?;

        match outcome {
            LaunchOutcome::Finished => {
                if graph.stage(id).is_marked() {
                    self.record(&name, StageState::Complete, None);
                } else {
                    warn!(stage = %name, "stage exited successfully but left no completion marker");
                    self.record(&name, StageState::Unmarked, None);
                }
            }
            LaunchOutcome::Submitted {
                job_name,
                teardown_script,
            } => {
                graph.stage_mut(id).set_submission(Submission {
                    job_name: job_name.clone(),
                    teardown_script: Some(teardown_script.clone()),
                    reused: false,
                });
                self.teardowns.push(teardown_script);
                self.record(&name, StageState::Running, Some(job_name));
            }
            LaunchOutcome::Skipped => self.record(&name, StageState::Planned, None),
        }
        Ok(())
    }

    fn insert_child_records(
        &mut self,
        graph: &StageGraph,
        parent: StageId,
        children: &[StageId],
        parent_dir: &Path,
    ) {
        let parent_name = graph.name_of(parent);
        let at = self
            .report
            .stages
            .iter()
            .position(|r| r.name == parent_name)
            .unwrap_or(self.report.stages.len());
        let records = children.iter().map(|c| {
            let name = graph.name_of(*c);
            StageRecord {
                work_dir: child_dir(parent_dir, &name),
                name,
                state: StageState::Pending,
                job_name: None,
            }
        });
        self.report.stages.splice(at..at, records);
    }

    fn record(&mut self, name: &str, state: StageState, job_name: Option<String>) {
        if let Some(rec) = self.report.stages.iter_mut().find(|r| r.name == name) {
            rec.state = state;
            if job_name.is_some() {
                rec.job_name = job_name;
            }
        }
    }
}
