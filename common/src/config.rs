//! Configuration types for runtime, output and copy job preparation

use chrono::{DateTime, Utc};

use crate::storage::EncKeys;

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}

/// Everything needed to turn one copy invocation into copy jobs.
///
/// Built once per invocation; time bounds are already resolved to absolute timestamps.
#[derive(Debug, Clone, Default)]
pub struct PrepareOptions {
    pub sources: Vec<String>,
    pub target: String,
    pub recursive: bool,
    pub enc_keys: std::sync::Arc<EncKeys>,
    /// Drop objects modified before this instant
    pub not_before: Option<DateTime<Utc>>,
    /// Drop objects modified after this instant
    pub not_after: Option<DateTime<Utc>>,
    /// Reference time for point-in-time listings of versioned backends
    pub time_ref: Option<DateTime<Utc>>,
    pub version_id: Option<String>,
    /// Treat archive files as browsable directories
    pub archive: bool,
}

impl PrepareOptions {
    /// Validate option combinations that no backend could satisfy
    pub fn validate(&self) -> Result<(), String> {
        if self.sources.is_empty() {
            return Err("at least one source must be specified".to_string());
        }
        if self.version_id.is_some() && self.time_ref.is_some() {
            return Err("a version id cannot be combined with a reference time".to_string());
        }
        if self.version_id.is_some() && self.sources.len() > 1 {
            return Err("a version id can only be used with a single source".to_string());
        }
        if let (Some(not_before), Some(not_after)) = (self.not_before, self.not_after)
            && not_before > not_after
        {
            return Err(format!(
                "time bounds select nothing: not before {not_before} is after not after {not_after}"
            ));
        }
        Ok(())
    }
}
