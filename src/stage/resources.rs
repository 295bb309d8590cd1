// src/stage/resources.rs

/// What a stage asks for. `None` means "use the run default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceRequest {
    pub mem_mb: Option<u64>,
    pub threads: Option<u32>,
    pub minutes: Option<u64>,
}

/// What a stage actually gets once the cascade has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveResources {
    /// Destination queue; `None` for sequential local execution.
    pub queue: Option<String>,
    pub threads: u32,
    pub mem_mb: u64,
    pub minutes: u64,
}
