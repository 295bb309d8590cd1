// src/queue/presets.rs

//! Queue-class resource presets and the resource cascade.

use crate::stage::{EffectiveResources, ResourceRequest};

/// Every preset runs for eight hours unless told otherwise.
pub const DEFAULT_MINUTES: u64 = 8 * 60;

/// Run-level resource defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceDefaults {
    pub threads: u32,
    pub mem_mb: u64,
    pub minutes: u64,
}

impl ResourceDefaults {
    /// Preset for a named queue class. `None` (sequential) and unknown
    /// queues share the smallest preset.
    pub fn for_queue(queue: Option<&str>) -> Self {
        let (threads, mem_mb) = match queue {
            Some("clsp-mem") => (4, 8192),
            Some("clsp-cpu") => (1, 2048),
            Some("cpu2x") => (4, 4096),
            Some("mem128") => (2, 120_000),
            Some("himem" | "wisp-himem") => (2, 16_384),
            Some("mem" | "wisp-mem") => (2, 8192),
            _ => (2, 2048),
        };
        Self {
            threads,
            mem_mb,
            minutes: DEFAULT_MINUTES,
        }
    }

    /// Replace the preset values with whatever the caller set explicitly.
    pub fn overridden_by(self, overrides: &ResourceRequest) -> Self {
        Self {
            threads: overrides.threads.unwrap_or(self.threads),
            mem_mb: overrides.mem_mb.unwrap_or(self.mem_mb),
            minutes: overrides.minutes.unwrap_or(self.minutes),
        }
    }
}

/// Fill unset stage fields from the run defaults.
pub fn resolve(
    request: &ResourceRequest,
    defaults: &ResourceDefaults,
    queue: Option<&str>,
) -> EffectiveResources {
    EffectiveResources {
        queue: queue.map(str::to_string),
        threads: request.threads.unwrap_or(defaults.threads),
        mem_mb: request.mem_mb.unwrap_or(defaults.mem_mb),
        minutes: request.minutes.unwrap_or(defaults.minutes),
    }
}

/// Minutes as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn hrt(total_minutes: u64) -> String {
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    format!("{hours:02}:{minutes:02}:00")
}
