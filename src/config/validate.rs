// src/config/validate.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::model::{RawRunConfig, RunConfig};
use crate::errors::{Result, StagehandError};
use crate::queue::ResourceDefaults;
use crate::stage::ResourceRequest;

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = StagehandError;

    fn try_from(raw: RawRunConfig) -> std::result::Result<Self, Self::Error> {
        validate_run_section(&raw)?;
        validate_relaunch_section(&raw)?;

        let root_dir = absolute(raw.run.root_dir.as_deref().unwrap_or(Path::new(".")))?;
        let setupenv = raw
            .run
            .setupenv
            .as_deref()
            .map(|p| resolve_setupenv(&root_dir, p))
            .transpose()?;
        let run_dir = raw.run.run_dir.as_deref().map(|p| root_dir.join(p));

        let queue = raw.run.queue.clone();
        let resources = ResourceDefaults::for_queue(queue.as_deref()).overridden_by(&ResourceRequest {
            threads: raw.resources.threads,
            mem_mb: raw.resources.mem_mb,
            minutes: raw.resources.minutes,
        });

        let poll_interval = parse_duration(&raw.fanout.poll_interval)
            .map_err(|e| config_error(format!("[fanout].poll_interval: {e}")))?;
        if poll_interval.is_zero() {
            return Err(config_error("[fanout].poll_interval must be > 0"));
        }
        let max_wait = raw
            .fanout
            .max_wait
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(|e| config_error(format!("[fanout].max_wait: {e}")))?;

        Ok(RunConfig {
            name: raw.run.name,
            queue,
            root_dir,
            run_dir,
            setupenv,
            print_to_console: raw.run.print_to_console,
            dry_run: raw.run.dry_run,
            tail_lines: raw.run.tail_lines,
            resources,
            poll_interval,
            max_wait,
            relaunch: raw.relaunch,
        })
    }
}

fn config_error(msg: impl Into<String>) -> StagehandError {
    StagehandError::ConfigError(msg.into())
}

fn validate_run_section(cfg: &RawRunConfig) -> Result<()> {
    let name = &cfg.run.name;
    if name.is_empty() || name.contains('/') {
        return Err(config_error(format!(
            "[run].name must be a non-empty directory name (got '{name}')"
        )));
    }
    if cfg.run.queue.as_deref().is_some_and(|q| q.trim().is_empty()) {
        return Err(config_error("[run].queue must not be empty; omit it to run sequentially"));
    }
    Ok(())
}

fn validate_relaunch_section(cfg: &RawRunConfig) -> Result<()> {
    if cfg.relaunch.tries == 0 {
        return Err(config_error("[relaunch].tries must be >= 1 (got 0)"));
    }
    if cfg.relaunch.marker.is_empty() {
        return Err(config_error("[relaunch].marker must not be empty"));
    }
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(std::path::absolute(path)?)
}

fn resolve_setupenv(root_dir: &Path, path: &Path) -> Result<PathBuf> {
    let full = root_dir.join(path);
    if !full.is_file() {
        return Err(config_error(format!(
            "[run].setupenv file not found: {}",
            full.display()
        )));
    }
    Ok(full)
}

/// Parse `<n>ms`, `<n>s`, `<n>m` or `<n>h`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{num_part}': {e}"))?;

    let secs = |factor: u64| {
        value
            .checked_mul(factor)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };

    match unit_part.trim().to_lowercase().as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => secs(60),
        "h" => secs(60 * 60),
        unit => Err(format!(
            "unsupported duration unit '{unit}'; expected ms, s, m, or h"
        )),
    }
}
