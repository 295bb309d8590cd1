// src/stage/fanout.rs

//! Fan-out stages: one child stage per input shard, discovered at run time.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use regex::Regex;

use crate::errors::{Result, StagehandError};
use crate::stage::capability::{ScriptBody, StageContext};

const SHARD_NUMBER_PATTERN: &str = r"(\d+)\.shard";

/// One input shard of a fan-out stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Shard number taken from `<n>.shard` in the file name, or a running
    /// counter when the name carries none.
    pub number: String,
    pub input: PathBuf,
    pub output: Option<PathBuf>,
}

/// Renders the script of one shard child.
pub trait ShardScript: Send + Sync {
    fn render(&self, ctx: &StageContext<'_>, shard: &Shard) -> anyhow::Result<String>;
}

/// Shard script backed by a closure. Build it with [`shard_fn`].
pub struct ShardFn<F>(F);

pub fn shard_fn<F>(f: F) -> ShardFn<F>
where
    F: Fn(&StageContext<'_>, &Shard) -> anyhow::Result<String> + Send + Sync,
{
    ShardFn(f)
}

impl<F> ShardScript for ShardFn<F>
where
    F: Fn(&StageContext<'_>, &Shard) -> anyhow::Result<String> + Send + Sync,
{
    fn render(&self, ctx: &StageContext<'_>, shard: &Shard) -> anyhow::Result<String> {
        (self.0)(ctx, shard)
    }
}

/// How a fan-out stage finds its shards and what each child runs.
#[derive(Clone)]
pub struct FanOut {
    /// Glob pattern matching the input shard files.
    pub input_pattern: String,
    /// Where shard outputs go; `None` leaves `Shard::output` unset.
    pub output_prefix: Option<String>,
    script: Arc<dyn ShardScript>,
}

impl fmt::Debug for FanOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanOut")
            .field("input_pattern", &self.input_pattern)
            .field("output_prefix", &self.output_prefix)
            .finish_non_exhaustive()
    }
}

impl FanOut {
    pub fn new(input_pattern: impl Into<String>, script: impl ShardScript + 'static) -> Self {
        Self {
            input_pattern: input_pattern.into(),
            output_prefix: None,
            script: Arc::new(script),
        }
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = Some(prefix.into());
        self
    }

    /// Body of the child stage for `shard`.
    pub fn child_body(&self, shard: Shard) -> ShardBody {
        ShardBody {
            script: Arc::clone(&self.script),
            shard,
        }
    }

    pub fn discover(&self) -> Result<Vec<Shard>> {
        discover_shards(&self.input_pattern, self.output_prefix.as_deref())
    }
}

/// Display name of the child stage for shard `number` of `parent`.
pub fn child_name(parent: &str, number: &str) -> String {
    format!("{parent}-{number}")
}

/// [`ScriptBody`] of a shard child: the parent's shard script bound to one
/// shard.
#[derive(Clone)]
pub struct ShardBody {
    script: Arc<dyn ShardScript>,
    shard: Shard,
}

impl ShardBody {
    pub fn shard(&self) -> &Shard {
        &self.shard
    }
}

impl ScriptBody for ShardBody {
    fn render(&self, ctx: &StageContext<'_>) -> anyhow::Result<String> {
        self.script.render(ctx, &self.shard)
    }
}

/// Files matching `pattern`, sorted, turned into shards.
///
/// Fails with [`StagehandError::NoShards`] when nothing matches.
pub fn discover_shards(pattern: &str, output_prefix: Option<&str>) -> Result<Vec<Shard>> {
    let mut files: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("invalid shard pattern '{pattern}'"))?
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("reading shard files for '{pattern}'"))?;
    if files.is_empty() {
        return Err(StagehandError::NoShards(pattern.to_string()));
    }
    files.sort();

    let shard_number = Regex::new(SHARD_NUMBER_PATTERN).context("compiling shard number regex")?;
    let mut counter = 0u64;
    let shards = files
        .into_iter()
        .map(|input| {
            let file_name = input.to_string_lossy().into_owned();
            match shard_number.captures(&file_name) {
                Some(caps) => {
                    let number = caps[1].to_string();
                    let output = output_prefix
                        .map(|prefix| PathBuf::from(format!("{prefix}_{number}.shard")));
                    Shard { number, input, output }
                }
                None => {
                    counter += 1;
                    let output = output_prefix.map(|prefix| {
                        let base = input.file_name().map(PathBuf::from).unwrap_or_default();
                        PathBuf::from(prefix).join(base)
                    });
                    Shard {
                        number: counter.to_string(),
                        input,
                        output,
                    }
                }
            }
        })
        .collect();
    Ok(shards)
}
