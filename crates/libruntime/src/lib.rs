pub mod config;
pub mod dispatcher;
pub mod metrics;
pub mod pacer;
pub mod result_logger;
mod run_engine;
mod runtime_error;
pub mod window;

pub use crate::config::{BasicAuth, ConfigError, ReplayConfig, WindowConfig};
pub use crate::metrics::{LatencySummary, ReplaySummary, Requests};
pub use crate::result_logger::Sink;
pub use crate::run_engine::{ReplayOutcome, RunEngine};
pub use crate::runtime_error::ReplayError;
pub use crate::window::Trip;

use libprotocol::RecordSource;

/// Validates `config` and replays `source` to completion or abort.
pub async fn run<S>(config: ReplayConfig, source: S, sink: Sink) -> Result<ReplayOutcome, ReplayError>
where
    S: RecordSource + Send + 'static,
{
    RunEngine::new(config)?.run(source, sink).await
}
