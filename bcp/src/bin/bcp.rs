use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use bcp_tools_bcp::{path, plan};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "bcp",
    version,
    about = "Plan bulk copies - list the single-file copy jobs a copy invocation expands to",
    long_about = "`bcp` classifies a copy invocation and prints the single-file copy jobs it expands to, \
one per line, without copying any data.

Sources may be files or directories; with more than one source the destination must be an existing \
directory. Paths whose first component is a configured alias (see --aliases) are resolved against \
that alias' root directory.

EXIT CODES:
    0 - All jobs prepared
    1 - The invocation was invalid or some jobs could not be prepared

EXAMPLES:
    # List what a recursive copy would do
    bcp -r /data/photos /backup/

    # Only files modified within the last week, as JSON
    bcp -r --newer-than 7d --json /data/logs /archive

    # Copy two files into a directory and print totals
    bcp a.txt b.txt /tmp/out --summary"
)]
struct Args {
    // Copy options
    /// Copy directories recursively
    #[arg(short, long, help_heading = "Copy options")]
    recursive: bool,

    /// Only copy objects modified more than DURATION ago (e.g. "7d", "1h 30m")
    #[arg(long, value_name = "DURATION", help_heading = "Copy options")]
    older_than: Option<humantime::Duration>,

    /// Only copy objects modified less than DURATION ago
    #[arg(long, value_name = "DURATION", help_heading = "Copy options")]
    newer_than: Option<humantime::Duration>,

    /// List sources as they were at this point in time (a DURATION ago or an RFC 3339 time)
    #[arg(long, value_name = "TIME", help_heading = "Copy options")]
    rewind: Option<String>,

    /// Copy this version of the (single) source object
    #[arg(long, value_name = "ID", help_heading = "Copy options", conflicts_with = "rewind")]
    version_id: Option<String>,

    /// Browse archive files as directories
    #[arg(long, help_heading = "Copy options")]
    zip: bool,

    /// Server-side encryption key for a path prefix, ALIAS/PREFIX=KEY (repeatable)
    #[arg(long, value_name = "SPEC", help_heading = "Copy options")]
    enc_key: Vec<String>,

    /// JSON file mapping alias names to root directories
    #[arg(long, value_name = "PATH", help_heading = "Copy options")]
    aliases: Option<std::path::PathBuf>,

    // Progress & output
    /// Print one JSON object per job instead of "source -> target"
    #[arg(long, help_heading = "Progress & output")]
    json: bool,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR))
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Advanced settings
    /// Number of worker threads (0 = number of CPU cores)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads (0 = Tokio default of 512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Source path(s) and destination path
    #[arg()]
    paths: Vec<String>,
}

fn prepare_options(args: &Args) -> anyhow::Result<common::PrepareOptions> {
    if args.paths.len() < 2 {
        return Err(anyhow!(
            "You must specify at least one source path and one destination path!"
        ));
    }
    let (target, sources) = args
        .paths
        .split_last()
        .context("missing destination path")?;
    path::validate_sources(sources)?;
    path::validate_destination_path(target)?;
    let now = chrono::Utc::now();
    let options = common::PrepareOptions {
        sources: sources.to_vec(),
        target: target.clone(),
        recursive: args.recursive,
        enc_keys: Arc::new(path::parse_enc_keys(&args.enc_key)?),
        not_before: args
            .newer_than
            .as_ref()
            .map(|duration| path::before(now, **duration))
            .transpose()?,
        not_after: args
            .older_than
            .as_ref()
            .map(|duration| path::before(now, **duration))
            .transpose()?,
        time_ref: args
            .rewind
            .as_deref()
            .map(|rewind| path::parse_rewind(rewind, now))
            .transpose()?,
        version_id: args.version_id.clone(),
        archive: args.zip,
    };
    options.validate().map_err(|error| anyhow!(error))?;
    Ok(options)
}

async fn async_main(args: Args) -> anyhow::Result<common::Summary> {
    let options = prepare_options(&args)?;
    let aliases = match &args.aliases {
        Some(path) => common::AliasTable::load(path)?,
        None => common::AliasTable::default(),
    };
    let storage = Arc::new(common::LocalStorage::new(aliases));
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling");
                cancel.cancel();
            }
        }
    });
    let jobs = common::prepare_copy_jobs(storage, options, cancel.clone())
        .await
        .context("bcp could not classify the copy operation")?;
    let format = if args.json {
        plan::OutputFormat::Json
    } else {
        plan::OutputFormat::Text
    };
    let summary = plan::write_plan(jobs, format, &mut std::io::stdout().lock()).await?;
    if cancel.is_cancelled() {
        return Err(anyhow!("bcp was interrupted"));
    }
    if summary.jobs_failed > 0 {
        if args.summary {
            return Err(anyhow!("bcp encountered errors\n\n{}", &summary));
        }
        return Err(anyhow!("bcp encountered errors"));
    }
    Ok(summary)
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary || args.verbose > 0,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let res = common::run(output, runtime, func);
    if res.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
