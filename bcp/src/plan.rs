use std::io::Write;

use tokio::sync::mpsc;

use common::{CopyJob, Job, Summary};

/// How prepared jobs are written out.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `source -> target`
    #[default]
    Text,
    /// one JSON object per line
    Json,
}

fn display_url(alias: &str, path: &str) -> String {
    if alias.is_empty() {
        path.to_string()
    } else {
        format!("{alias}:{path}")
    }
}

pub fn format_job(job: &CopyJob, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "{} -> {}",
            display_url(&job.source_alias, &job.source.location.path),
            display_url(&job.target_alias, &job.target.path)
        )),
        OutputFormat::Json => Ok(serde_json::to_string(job)?),
    }
}

/// Drains `jobs`, writing each successful job to `out` and logging each failed one.
pub async fn write_plan(
    mut jobs: mpsc::Receiver<Job>,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<Summary> {
    let mut summary = Summary::default();
    while let Some(job) = jobs.recv().await {
        summary = summary + Summary::of(&job);
        match job {
            Ok(job) => writeln!(out, "{}", format_job(&job, format)?)?,
            Err(error) => tracing::error!("{:#}", &error),
        }
    }
    out.flush()?;
    Ok(summary)
}
