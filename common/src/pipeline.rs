//! Orchestration of a copy invocation: classify, expand, filter
//!
//! ```text
//! classify ──> generator task ──(jobs)──> filter task ──(jobs)──> caller
//! ```
//!
//! Classification happens before any task is spawned; an invalid invocation is reported as
//! the `Err` of [`prepare_copy_jobs`] and no job is ever produced. Afterwards every failure
//! travels through the job channel. The returned receiver closes once the generator and the
//! filter are both done (or the cancellation token fires).

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

use crate::classify::{Classification, classify};
use crate::config::PrepareOptions;
use crate::error::Result;
use crate::filter::{TimeFilter, spawn_time_filter};
use crate::prepare::{
    CHANNEL_CAPACITY, Job, prepare_file_into_dir, prepare_multi_source, prepare_recursive,
    prepare_single_file, recv_job, send_job,
};
use crate::storage::Storage;

async fn generate(
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
    options: PrepareOptions,
    classification: Classification,
    tx: mpsc::Sender<Job>,
) {
    let mut jobs = match classification {
        Classification::SingleFile { version_id } => {
            let job = prepare_single_file(
                storage.as_ref(),
                &cancel,
                &options.sources[0],
                version_id,
                &options.target,
                options.enc_keys.clone(),
                options.archive,
            )
            .await;
            send_job(&tx, job, &cancel).await;
            return;
        }
        Classification::FileIntoDir { version_id } => {
            let job = prepare_file_into_dir(
                storage.as_ref(),
                &cancel,
                &options.sources[0],
                version_id,
                &options.target,
                options.enc_keys.clone(),
                options.archive,
            )
            .await;
            send_job(&tx, job, &cancel).await;
            return;
        }
        Classification::Recursive => prepare_recursive(
            storage,
            cancel.clone(),
            options.sources[0].clone(),
            options.target,
            options.time_ref,
            options.archive,
        ),
        Classification::MultiSource => prepare_multi_source(
            storage,
            cancel.clone(),
            options.sources,
            options.target,
            options.time_ref,
        ),
    };
    while let Some(job) = recv_job(&mut jobs, &cancel).await {
        if !send_job(&tx, job, &cancel).await {
            return;
        }
    }
}

/// Prepares the copy jobs of one invocation.
///
/// Returns the classification error if the invocation has no valid shape. Otherwise returns
/// the receiving end of the job stream; callers must drain it until it yields `None`.
#[instrument(skip(storage, cancel, options), fields(sources = ?options.sources, target = %options.target))]
pub async fn prepare_copy_jobs(
    storage: Arc<dyn Storage>,
    options: PrepareOptions,
    cancel: CancellationToken,
) -> Result<mpsc::Receiver<Job>> {
    let classification = classify(storage.as_ref(), &cancel, &options).await?;
    tracing::info!("copy operation type: {:?}", &classification);
    let filter = TimeFilter::from_options(&options);
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let span = tracing::debug_span!("generate", ?classification);
    tokio::spawn(generate(storage, cancel.clone(), options, classification, tx).instrument(span));
    Ok(spawn_time_filter(rx, filter, cancel))
}
