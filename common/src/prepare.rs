//! Expansion of a classified invocation into single-file copy jobs
//!
//! Types A and B produce exactly one job. Types C and D stream their jobs through a bounded
//! channel fed by a spawned task, so arbitrarily large listings are never held in memory.
//! Every send observes the cancellation token first, and a producer stops as soon as its
//! consumer goes away.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, instrument};

use crate::error::{Error, ErrorKind};
use crate::storage::{DirOpt, EncKeys, ListOptions, StatOptions, Storage};
use crate::url::{Content, Location, base_name, join_path, to_slash};

/// Capacity of every job channel; a producer can be at most one job ahead of its consumer.
pub const CHANNEL_CAPACITY: usize = 1;

/// A fully resolved single-file copy.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct CopyJob {
    pub source_alias: String,
    pub source: Content,
    pub target_alias: String,
    pub target: Location,
}

/// The unit flowing through the pipeline: a copy job or the error that replaced it.
pub type Job = Result<CopyJob, Error>;

/// Sends `job` unless cancellation comes first. Returns `false` when the producer should stop.
pub(crate) async fn send_job(
    tx: &mpsc::Sender<Job>,
    job: Job,
    cancel: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(job) => sent.is_ok(),
    }
}

pub(crate) async fn recv_job(
    rx: &mut mpsc::Receiver<Job>,
    cancel: &CancellationToken,
) -> Option<Job> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        job = rx.recv() => job,
    }
}

/// Builds the job for an already validated source; the target is not checked.
pub fn make_job(
    source_alias: String,
    source: Content,
    target_alias: String,
    target_path: String,
) -> Job {
    Ok(CopyJob {
        source_alias,
        source,
        target_alias,
        target: Location::new(target_path),
    })
}

async fn stat_source(
    storage: &dyn Storage,
    cancel: &CancellationToken,
    source_url: &str,
    version_id: Option<String>,
    enc_keys: Arc<EncKeys>,
    archive: bool,
) -> Result<Content, Error> {
    let options = StatOptions {
        version_id,
        follow_links: false,
        enc_keys,
        time_ref: None,
        archive,
    };
    storage
        .stat(cancel, source_url, &options)
        .await
        .map_err(|error| error.trace("prepare", [source_url]))
}

/// Type A: copy(f, f).
#[instrument(skip(storage, cancel, enc_keys))]
pub async fn prepare_single_file(
    storage: &dyn Storage,
    cancel: &CancellationToken,
    source_url: &str,
    version_id: Option<String>,
    target_url: &str,
    enc_keys: Arc<EncKeys>,
    archive: bool,
) -> Job {
    let (source_alias, _) = storage.expand_alias(source_url);
    let (target_alias, target_path) = storage.expand_alias(target_url);
    let source = stat_source(storage, cancel, source_url, version_id, enc_keys, archive).await?;
    if !source.entry_type.is_regular() {
        return Err(Error::new(ErrorKind::InvalidSource(source_url.to_string()))
            .trace("prepare", [source_url]));
    }
    make_job(source_alias, source, target_alias, target_path)
}

/// Type B: copy(f, d) -> copy(f, d/f).
#[instrument(skip(storage, cancel, enc_keys))]
pub async fn prepare_file_into_dir(
    storage: &dyn Storage,
    cancel: &CancellationToken,
    source_url: &str,
    version_id: Option<String>,
    target_url: &str,
    enc_keys: Arc<EncKeys>,
    archive: bool,
) -> Job {
    let (source_alias, _) = storage.expand_alias(source_url);
    let (target_alias, target_path) = storage.expand_alias(target_url);
    let source = stat_source(storage, cancel, source_url, version_id, enc_keys, archive).await?;
    if !source.entry_type.is_regular() {
        let kind = if source.entry_type.is_dir() {
            ErrorKind::SourceIsDir(source_url.to_string())
        } else {
            ErrorKind::InvalidSource(source_url.to_string())
        };
        return Err(Error::new(kind).trace("prepare", [source_url]));
    }
    let name = base_name(&source.location.path, source.location.separator).to_string();
    let target_path = join_path(&target_path, &name);
    make_job(source_alias, source, target_alias, target_path)
}

/// Target path of a listed entry under Type C.
///
/// The suffix kept from the entry's path starts right after the last separator of the source
/// argument, so `bucket/dir1` listing `bucket/dir1/sub/f` into `out` gives `out/dir1/sub/f`.
/// When that separator sits at index 0 or 1 nothing is stripped and the entry's full path is
/// appended.
pub fn recursive_target(source: &Location, entry: &Location, target_path: &str) -> String {
    let separator = source.separator;
    let trimmed = source.path.trim_end_matches(separator);
    let source_path = if trimmed.is_empty() {
        source.path.as_str()
    } else {
        trimmed
    };
    let listed = to_slash(&entry.path, entry.separator);
    let suffix = match source_path.rfind(separator) {
        Some(index) if index > 1 => {
            let prefix = to_slash(&source_path[..index], separator);
            match listed.strip_prefix(prefix.as_str()) {
                Some(rest) => rest.to_string(),
                None => listed,
            }
        }
        _ => listed,
    };
    join_path(target_path, &suffix)
}

async fn expand_recursive(
    storage: &dyn Storage,
    cancel: &CancellationToken,
    source_url: &str,
    target_url: &str,
    time_ref: Option<DateTime<Utc>>,
    archive: bool,
    tx: &mpsc::Sender<Job>,
) {
    let (source_alias, _) = storage.expand_alias(source_url);
    let (target_alias, target_path) = storage.expand_alias(target_url);
    let client = match storage.client(source_url) {
        Ok(client) => client,
        Err(error) => {
            send_job(tx, Err(error.trace("prepare", [source_url])), cancel).await;
            return;
        }
    };
    let mut listing = client.list(
        cancel.clone(),
        ListOptions {
            recursive: true,
            time_ref,
            show_dir: DirOpt::Never,
            archive,
        },
    );
    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            item = listing.next() => item,
        };
        let Some(item) = item else {
            break;
        };
        let job = match item {
            Err(error) => Err(error.trace("list", [client.url().path.as_str()])),
            Ok(content) if !content.entry_type.is_regular() => {
                tracing::trace!("skipping non-regular entry {:?}", &content.location.path);
                continue;
            }
            Ok(content) => {
                let target = recursive_target(client.url(), &content.location, &target_path);
                make_job(source_alias.clone(), content, target_alias.clone(), target)
            }
        };
        if !send_job(tx, job, cancel).await {
            return;
        }
    }
    tracing::debug!("listing of {source_url:?} complete");
}

/// Type C: copy(d1..., d2) -> []copy(f, d2/d1/f).
pub fn prepare_recursive(
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
    source_url: String,
    target_url: String,
    time_ref: Option<DateTime<Utc>>,
    archive: bool,
) -> mpsc::Receiver<Job> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let span = tracing::debug_span!("prepare_recursive", source = %source_url, target = %target_url);
    tokio::spawn(
        async move {
            expand_recursive(
                storage.as_ref(),
                &cancel,
                &source_url,
                &target_url,
                time_ref,
                archive,
                &tx,
            )
            .await;
        }
        .instrument(span),
    );
    rx
}

/// Type D: copy([](f|d), d) -> []C, one source after another in argument order.
pub fn prepare_multi_source(
    storage: Arc<dyn Storage>,
    cancel: CancellationToken,
    sources: Vec<String>,
    target_url: String,
    time_ref: Option<DateTime<Utc>>,
) -> mpsc::Receiver<Job> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let span = tracing::debug_span!("prepare_multi_source", sources = ?sources, target = %target_url);
    tokio::spawn(
        async move {
            for source_url in sources {
                let mut jobs = prepare_recursive(
                    storage.clone(),
                    cancel.clone(),
                    source_url,
                    target_url.clone(),
                    time_ref,
                    false,
                );
                while let Some(job) = recv_job(&mut jobs, &cancel).await {
                    if !send_job(&tx, job, &cancel).await {
                        return;
                    }
                }
                if cancel.is_cancelled() {
                    return;
                }
            }
        }
        .instrument(span),
    );
    rx
}
