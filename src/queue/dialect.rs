// src/queue/dialect.rs

//! Batch-system command dialects.
//!
//! A [`QueueDialect`] turns effective resources into the batch system's
//! native submit/cancel/status commands. Only Sun Grid Engine is provided;
//! the flavour (which site's queue layout) is chosen from the queue name by
//! [`dialect_for_queue`].

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::queue::presets::hrt;
use crate::stage::EffectiveResources;

/// Everything needed to render one submit command.
#[derive(Debug, Clone)]
pub struct SubmitRequest<'a> {
    pub job_name: &'a str,
    pub resources: &'a EffectiveResources,
    /// Stdout file, relative to the stage directory when possible.
    pub stdout: &'a Path,
    /// Experiment script, relative to the stage directory when possible.
    pub script: &'a Path,
    /// Job names this submission must wait for.
    pub holds: &'a [String],
}

pub trait QueueDialect: Send + Sync + fmt::Debug {
    /// Native resource arguments for the given resources.
    fn resource_args(&self, resources: &EffectiveResources) -> String;

    /// Full submit command line.
    fn submit_command(&self, req: &SubmitRequest<'_>) -> String;

    /// Command that cancels the named job.
    fn cancel_command(&self, job_name: &str) -> String;

    /// Program and arguments of the liveness query for the named job.
    fn status_command(&self, job_name: &str) -> (String, Vec<String>);

    /// Recover the job name from the text of a persisted submit script.
    fn job_name_from_submit(&self, script: &str) -> Option<String>;
}

/// Which site layout an SGE queue name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SgeFlavor {
    /// `clsp-*` queues: parallel environment plus arch/ram constraints.
    Clsp,
    /// `wisp-*` queues: the `text.q` queue.
    Wisp,
    /// Everything else: `all.q` with `num_proc`.
    Willow,
}

impl SgeFlavor {
    pub fn for_queue(queue: Option<&str>) -> Self {
        match queue {
            Some(q) if q.starts_with("clsp-") => SgeFlavor::Clsp,
            Some(q) if q.starts_with("wisp-") => SgeFlavor::Wisp,
            _ => SgeFlavor::Willow,
        }
    }
}

/// Paths of the SGE command-line tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgePrograms {
    pub qsub: String,
    pub qdel: String,
    pub qstat: String,
}

impl Default for SgePrograms {
    fn default() -> Self {
        Self {
            qsub: "qsub".to_string(),
            qdel: "qdel".to_string(),
            qstat: "qstat".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SgeDialect {
    flavor: SgeFlavor,
    programs: SgePrograms,
}

impl SgeDialect {
    pub fn new(flavor: SgeFlavor) -> Self {
        Self {
            flavor,
            programs: SgePrograms::default(),
        }
    }

    pub fn for_queue(queue: Option<&str>) -> Self {
        Self::new(SgeFlavor::for_queue(queue))
    }

    pub fn with_programs(mut self, programs: SgePrograms) -> Self {
        self.programs = programs;
        self
    }

    pub fn flavor(&self) -> SgeFlavor {
        self.flavor
    }

    pub fn programs(&self) -> &SgePrograms {
        &self.programs
    }
}

impl QueueDialect for SgeDialect {
    fn resource_args(&self, r: &EffectiveResources) -> String {
        match self.flavor {
            SgeFlavor::Clsp => format!(
                "-q all.q -pe smp {threads} -l 'arch=*amd64' -l mem_free={mem}M,ram_free={mem}M",
                threads = r.threads,
                mem = r.mem_mb,
            ),
            SgeFlavor::Wisp => format!(
                "-q text.q -l num_proc={},mem_free={}M,h_rt={}",
                r.threads,
                r.mem_mb,
                hrt(r.minutes),
            ),
            SgeFlavor::Willow => format!(
                "-q all.q -l num_proc={},mem_free={}M,h_rt={}",
                r.threads,
                r.mem_mb,
                hrt(r.minutes),
            ),
        }
    }

    fn submit_command(&self, req: &SubmitRequest<'_>) -> String {
        let mut cmd = format!(
            "{qsub} {args} -cwd -j y -b y -V -N {name} -e stderr -o {stdout} ",
            qsub = self.programs.qsub,
            args = self.resource_args(req.resources),
            name = req.job_name,
            stdout = req.stdout.display(),
        );
        if !req.holds.is_empty() {
            cmd.push_str(&format!("-hold_jid {} ", req.holds.join(",")));
        }
        cmd.push_str(&format!("\"bash '{}'\"", req.script.display()));
        cmd
    }

    fn cancel_command(&self, job_name: &str) -> String {
        format!("{} {}", self.programs.qdel, job_name)
    }

    fn status_command(&self, job_name: &str) -> (String, Vec<String>) {
        (
            self.programs.qstat.clone(),
            vec!["-j".to_string(), job_name.to_string()],
        )
    }

    fn job_name_from_submit(&self, script: &str) -> Option<String> {
        let re = Regex::new(r" -N (\S+) ").ok()?;
        re.captures(script).map(|caps| caps[1].to_string())
    }
}

/// The one place that maps a queue name to its dialect.
pub fn dialect_for_queue(queue: Option<&str>) -> Box<dyn QueueDialect> {
    Box::new(SgeDialect::for_queue(queue))
}
