//! Time-bound filtering of prepared copy jobs
//!
//! The filter runs as its own task between the job generator and the caller. It drops
//! successful jobs whose source modification time falls outside the configured bounds and
//! forwards everything else, errors included, in the order received.
//!
//! # Examples
//!
//! ```
//! use common::filter::TimeFilter;
//! use chrono::{TimeZone, Utc};
//!
//! let filter = TimeFilter {
//!     not_before: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
//!     not_after: None,
//! };
//! assert!(filter.admits_time(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
//! assert!(!filter.admits_time(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()));
//! ```

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::PrepareOptions;
use crate::prepare::{CHANNEL_CAPACITY, Job, recv_job, send_job};

/// Bounds on the source modification time of the jobs to keep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeFilter {
    /// objects modified before this instant are dropped
    pub not_before: Option<DateTime<Utc>>,
    /// objects modified after this instant are dropped
    pub not_after: Option<DateTime<Utc>>,
}

impl TimeFilter {
    pub fn from_options(options: &PrepareOptions) -> Self {
        Self {
            not_before: options.not_before,
            not_after: options.not_after,
        }
    }

    pub fn admits_time(&self, time: DateTime<Utc>) -> bool {
        if let Some(not_before) = self.not_before
            && time < not_before
        {
            return false;
        }
        if let Some(not_after) = self.not_after
            && time > not_after
        {
            return false;
        }
        true
    }

    /// Error jobs are always admitted.
    pub fn admits(&self, job: &Job) -> bool {
        match job {
            Ok(copy_job) => self.admits_time(copy_job.source.time),
            Err(_) => true,
        }
    }
}

/// Spawns the filter stage draining `jobs` and returns the caller-facing receiver.
pub fn spawn_time_filter(
    mut jobs: mpsc::Receiver<Job>,
    filter: TimeFilter,
    cancel: CancellationToken,
) -> mpsc::Receiver<Job> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let span = tracing::debug_span!("time_filter", ?filter);
    tokio::spawn(
        async move {
            let mut dropped = 0usize;
            while let Some(job) = recv_job(&mut jobs, &cancel).await {
                if !filter.admits(&job) {
                    dropped += 1;
                    continue;
                }
                if !send_job(&tx, job, &cancel).await {
                    break;
                }
            }
            tracing::debug!("filter stage done, {dropped} job(s) outside the time bounds");
        }
        .instrument(span),
    );
    rx
}
