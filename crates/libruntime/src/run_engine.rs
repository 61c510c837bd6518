use std::sync::Arc;
use libprotocol::{Record, RecordSource, SourceError};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use crate::config::ReplayConfig;
use crate::dispatcher::Dispatcher;
use crate::metrics::ReplaySummary;
use crate::pacer::Pacer;
use crate::result_logger::{ResultLogger, Sink};
use crate::runtime_error::ReplayError;
use crate::window::{self, ErrorRateMonitor, Trip};

/// Records decoded ahead of the pacer.
const READ_AHEAD: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum ReplayOutcome {
    /// Source exhausted, every request finished and the result log drained.
    Completed(ReplaySummary),
    /// Circuit breaker tripped. In-flight requests were abandoned and their
    /// results may be missing from the log.
    Aborted(Trip),
}

pub struct RunEngine {
    config: ReplayConfig,
    dispatcher: Arc<Dispatcher>,
}

impl RunEngine {
    pub fn new(config: ReplayConfig) -> Result<Self, ReplayError> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::new(&config)?);
        Ok(Self { config, dispatcher })
    }

    /// Replays `source` against the configured prefix, writing one result line
    /// per record to `sink`.
    ///
    /// A source error other than end-of-input, or a sink that stops accepting
    /// writes, returns immediately without waiting for in-flight requests.
    pub async fn run<S>(&self, source: S, sink: Sink) -> Result<ReplayOutcome, ReplayError>
    where
        S: RecordSource + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let mut logger = tokio::spawn(ResultLogger::new(sink).run(result_rx));

        let abort = CancellationToken::new();
        let (sample_tx, monitor) = match &self.config.window {
            Some(window) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let handle = tokio::spawn(window::watch(rx, ErrorRateMonitor::new(window), abort.clone()));
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        let mut records = read_ahead(source);
        let mut pacer = Pacer::new(self.config.pacing, self.config.ratio);
        let in_flight = self.config.max_in_flight.map(|n| Arc::new(Semaphore::new(n)));
        let mut tasks = JoinSet::new();
        let mut dispatched: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = abort.cancelled() => return tripped(monitor).await,
                joined = &mut logger => return Err(logger_stopped(joined)),
                next = records.recv() => next,
            };
            let record = match next {
                Some(Ok(record)) => record,
                Some(Err(err)) => return Err(err.into()),
                None => {
                    tracing::debug!(dispatched, "reached end of input");
                    break;
                }
            };

            if let Some(delay) = pacer.delay_for(record.timestamp) {
                tracing::debug!(sleep_secs = delay.as_secs_f64(), "sleeping before next record");
                tokio::select! {
                    biased;
                    _ = abort.cancelled() => return tripped(monitor).await,
                    joined = &mut logger => return Err(logger_stopped(joined)),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let permit = match &in_flight {
                Some(semaphore) => tokio::select! {
                    biased;
                    _ = abort.cancelled() => return tripped(monitor).await,
                    joined = &mut logger => return Err(logger_stopped(joined)),
                    permit = semaphore.clone().acquire_owned() => permit.ok(),
                },
                None => None,
            };
            if abort.is_cancelled() {
                return tripped(monitor).await;
            }
            if logger.is_finished() {
                return Err(logger_stopped((&mut logger).await));
            }

            let dispatcher = self.dispatcher.clone();
            let results = result_tx.clone();
            let samples = sample_tx.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let (result, sample) = dispatcher.fire(record).await;
                if let Some(samples) = samples {
                    let _ = samples.send(sample);
                }
                let _ = results.send(result);
            });
            dispatched += 1;

            while let Some(joined) = tasks.try_join_next() {
                log_panic(joined);
            }
        }

        tracing::debug!(in_flight = tasks.len(), "waiting for in-flight requests");
        loop {
            tokio::select! {
                biased;
                _ = abort.cancelled() => return tripped(monitor).await,
                joined = &mut logger => return Err(logger_stopped(joined)),
                joined = tasks.join_next() => match joined {
                    Some(joined) => log_panic(joined),
                    None => break,
                },
            }
        }

        drop(sample_tx);
        if let Some(monitor) = monitor {
            if let Some(trip) = monitor.await? {
                return Ok(ReplayOutcome::Aborted(trip));
            }
        }

        tracing::debug!("waiting for result log to drain");
        drop(result_tx);
        let summary = logger.await??;

        Ok(ReplayOutcome::Completed(summary))
    }
}

/// Decodes the source on a blocking thread so file reads and decompression
/// stay off the async workers.
fn read_ahead<S>(mut source: S) -> mpsc::Receiver<Result<Record, SourceError>>
where
    S: RecordSource + Send + 'static,
{
    let (tx, rx) = mpsc::channel(READ_AHEAD);
    tokio::task::spawn_blocking(move || loop {
        let item = match source.read_next() {
            Ok(Some(record)) => Ok(record),
            Ok(None) => break,
            Err(err) => Err(err),
        };
        let fatal = item.is_err();
        if tx.blocking_send(item).is_err() || fatal {
            break;
        }
    });
    rx
}

async fn tripped(monitor: Option<JoinHandle<Option<Trip>>>) -> Result<ReplayOutcome, ReplayError> {
    match monitor {
        Some(handle) => handle.await?.map(ReplayOutcome::Aborted).ok_or(ReplayError::MonitorStopped),
        None => Err(ReplayError::MonitorStopped),
    }
}

/// The logger only returns early when the sink fails: the driver still holds a
/// result sender until the drain is over.
fn logger_stopped(joined: Result<std::io::Result<ReplaySummary>, JoinError>) -> ReplayError {
    let err = match joined {
        Err(err) => ReplayError::Task(err),
        Ok(Err(err)) => ReplayError::Sink(err),
        Ok(Ok(_)) => ReplayError::Sink(std::io::Error::other("result log closed before the replay finished")),
    };
    tracing::error!(%err, "result log stopped, aborting replay");
    err
}

fn log_panic(joined: Result<(), JoinError>) {
    if let Err(err) = joined {
        tracing::error!(%err, "dispatch task failed");
    }
}
