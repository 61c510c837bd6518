use std::path::Path;
use anyhow::Context;
use libruntime::{ReplayOutcome, ReplaySummary, Sink, Trip};
use serde::Serialize;

pub async fn open_sink(path: &str) -> anyhow::Result<Sink> {
    if path == crate::input::STDIN {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("failed to create result log {path}"))?;
    Ok(Box::new(file))
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum RunReport<'a> {
    Completed { summary: &'a ReplaySummary },
    Aborted { trip: &'a Trip },
}

impl<'a> From<&'a ReplayOutcome> for RunReport<'a> {
    fn from(outcome: &'a ReplayOutcome) -> Self {
        match outcome {
            ReplayOutcome::Completed(summary) => RunReport::Completed { summary },
            ReplayOutcome::Aborted(trip) => RunReport::Aborted { trip },
        }
    }
}

pub fn log_outcome(outcome: &ReplayOutcome) {
    match outcome {
        ReplayOutcome::Completed(summary) => tracing::info!(
            total = summary.requests.total,
            ok = summary.requests.ok,
            failed = summary.requests.error,
            p50_ms = summary.latency.p50,
            p99_ms = summary.latency.p99,
            "replay completed"
        ),
        ReplayOutcome::Aborted(trip) => tracing::error!(
            error_rate = trip.average * 100.0,
            threshold = trip.threshold * 100.0,
            window = trip.window_size,
            "replay aborted by circuit breaker"
        ),
    }
}

pub fn write_report(path: &Path, outcome: &ReplayOutcome) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&RunReport::from(outcome))?;
    std::fs::write(path, json).with_context(|| format!("failed to write report {}", path.display()))
}
