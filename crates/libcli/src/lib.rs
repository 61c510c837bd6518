mod input;
mod logging;
mod output;

use std::path::PathBuf;
use std::time::Duration;
use anyhow::Context;
use clap::Parser;
use libprotocol::{LogFormat, DEFAULT_NGINX_FORMAT};
use libruntime::{BasicAuth, ReplayConfig, ReplayOutcome, WindowConfig};

pub use crate::input::open_input;

/// Replays historical HTTP access logs against a live endpoint.
///
/// Results are written one per line, tab separated:
/// `status, start_unix_secs, duration_nanos, path, payload[, error]`.
/// Lines appear in completion order, not in log order.
#[derive(Debug, Parser)]
#[command(name = "logreplay", version)]
pub struct Cli {
    /// Nginx log format
    #[arg(long, default_value = DEFAULT_NGINX_FORMAT)]
    pub format: String,

    /// Log file to read; '-' reads stdin, '*gz' is decompressed, 'dummy' replays one sample line
    #[arg(long, default_value = "-")]
    pub file: String,

    /// File to report timings to; '-' is stdout
    #[arg(long, default_value = "-")]
    pub log: String,

    /// URL prefix to query
    #[arg(long, default_value = "http://localhost")]
    pub prefix: String,

    /// Input log type (nginx, haproxy or jsonl)
    #[arg(long = "file-type", default_value = "nginx")]
    pub file_type: LogFormat,

    /// Replay speed ratio, higher means faster replay
    #[arg(long, default_value_t = 1.0)]
    pub ratio: f64,

    /// Print extra debugging information
    #[arg(long)]
    pub debug: bool,

    /// Request timeout in milliseconds, 0 means no timeout
    #[arg(long, default_value_t = 60_000)]
    pub timeout: u64,

    /// Skip sleep between http calls based on log timestamps
    #[arg(long = "skip-sleep")]
    pub skip_sleep: bool,

    /// Stop replaying when the error rate over a rolling window gets too high
    #[arg(long = "enable-window")]
    pub enable_window: bool,

    /// Size of the window to track request failures
    #[arg(long = "window-size", default_value_t = 1000)]
    pub window_size: usize,

    /// Percentage of failed requests that stops the replay (exclusive 0..100)
    #[arg(long = "error-rate", default_value_t = 40.0)]
    pub error_rate: f64,

    /// Accept invalid TLS certificates
    #[arg(long = "ssl-skip-verify")]
    pub ssl_skip_verify: bool,

    /// Basic auth username
    #[arg(long = "user-name")]
    pub user_name: Option<String>,

    /// Basic auth password
    #[arg(long, env = "LOGREPLAY_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Cap on simultaneous requests; unbounded by default to keep the original traffic shape
    #[arg(long = "max-in-flight")]
    pub max_in_flight: Option<usize>,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Cli {
    pub fn replay_config(&self) -> ReplayConfig {
        ReplayConfig {
            prefix: self.prefix.clone(),
            timeout: (self.timeout > 0).then(|| Duration::from_millis(self.timeout)),
            ratio: self.ratio,
            pacing: !self.skip_sleep,
            window: self.enable_window.then(|| WindowConfig {
                size: self.window_size,
                error_rate: self.error_rate,
            }),
            tls_skip_verify: self.ssl_skip_verify,
            basic_auth: BasicAuth::from_parts(self.user_name.clone(), self.password.clone()),
            max_in_flight: self.max_in_flight,
            ..Default::default()
        }
    }
}

pub fn run() -> anyhow::Result<ReplayOutcome> {
    run_with(Cli::try_parse()?)
}

pub fn run_with(cli: Cli) -> anyhow::Result<ReplayOutcome> {
    logging::init_tracing(cli.debug);

    let config = cli.replay_config();
    config.validate()?;

    tracing::debug!(file = %cli.file, file_type = cli.file_type.name(), "opening input");
    let input = open_input(&cli.file, cli.file_type)?;
    let source = cli.file_type.reader(input, &cli.format)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let outcome = runtime.block_on(async {
        let sink = output::open_sink(&cli.log).await?;
        let outcome = libruntime::run(config, source, sink).await?;
        output::log_outcome(&outcome);
        if let Some(path) = &cli.report {
            output::write_report(path, &outcome)?;
        }
        Ok::<_, anyhow::Error>(outcome)
    });
    // a blocked stdin reader must not keep the process alive
    runtime.shutdown_background();

    outcome
}

/// Process exit status for a replay that ran without a fatal error.
pub fn outcome_code(outcome: &ReplayOutcome) -> i32 {
    match outcome {
        ReplayOutcome::Completed(_) => 0,
        ReplayOutcome::Aborted(_) => 1,
    }
}
