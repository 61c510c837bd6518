use libprotocol::SourceError;
use thiserror::Error;
use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("record source failed: {0}")]
    Source(#[from] SourceError),

    #[error("failed to write results: {0}")]
    Sink(#[from] std::io::Error),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("replay task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("replay was cancelled without a circuit breaker trip")]
    MonitorStopped,
}
