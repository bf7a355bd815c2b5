//! Job preparation core of the `bcp` bulk-copy tool
//!
//! Turns a copy invocation (one or more source URLs, a target URL and a few options) into a
//! stream of single-file copy jobs. The data movement itself is out of scope: every consumer
//! gets fully resolved `(source, target)` pairs and decides what to do with them.
//!
//! # Overview
//!
//! - [`classify`] decides which of the four canonical shapes an invocation has
//! - [`prepare`] expands each shape into jobs
//! - [`filter`] drops jobs outside the configured modification-time bounds
//! - [`pipeline`] wires the above into a cancellable, bounded pipeline
//! - [`storage`] defines the backend traits; [`local`] implements them for the local filesystem
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use common::{LocalStorage, PrepareOptions, prepare_copy_jobs};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn plan() -> anyhow::Result<()> {
//! let options = PrepareOptions {
//!     sources: vec!["/data/photos".to_string()],
//!     target: "/backup".to_string(),
//!     recursive: true,
//!     ..Default::default()
//! };
//! let storage = Arc::new(LocalStorage::default());
//! let mut jobs = prepare_copy_jobs(storage, options, CancellationToken::new()).await?;
//! while let Some(job) = jobs.recv().await {
//!     match job {
//!         Ok(job) => println!("{} -> {}", job.source.location, job.target),
//!         Err(error) => eprintln!("{error:#}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Logging
//!
//! [`run`] installs a `tracing` subscriber on stderr. The level follows the `-v` count
//! (0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE) unless `RUST_LOG` is set; `--quiet` disables it.

pub mod alias;
pub mod classify;
pub mod config;
pub mod error;
pub mod filter;
pub mod local;
pub mod pipeline;
pub mod prepare;
pub mod storage;
pub mod summary;
pub mod url;

#[cfg(test)]
mod testutils;

pub use alias::AliasTable;
pub use classify::Classification;
pub use config::{OutputConfig, PrepareOptions, RuntimeConfig};
pub use error::{Error, ErrorKind};
pub use local::LocalStorage;
pub use pipeline::prepare_copy_jobs;
pub use prepare::{CopyJob, Job};
pub use summary::Summary;

fn init_tracing(output: &OutputConfig) {
    if output.quiet {
        return;
    }
    let level = match output.verbose {
        0 => "error",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
    {
        eprintln!("failed to initialize logging: {error}");
    }
}

fn build_runtime(runtime: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    builder.build()
}

/// Runs `func` on a freshly built runtime with logging set up from `output`.
///
/// Returns `None` if `func` failed; the error has been logged by then.
pub fn run<Fut, T, E>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    func: impl FnOnce() -> Fut,
) -> Option<T>
where
    T: std::fmt::Display,
    E: std::fmt::Display,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    init_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!("failed to start the tokio runtime: {error}");
            return None;
        }
    };
    match runtime.block_on(func()) {
        Ok(summary) => {
            if output.print_summary {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            tracing::error!("{:#}", &error);
            None
        }
    }
}
