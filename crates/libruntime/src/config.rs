use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("ratio must be a finite number >= 1, got {0}")]
    Ratio(f64),

    #[error("window size must be positive")]
    WindowSize,

    #[error("error rate must be between 0 and 100 (exclusive), got {0}")]
    ErrorRate(f64),

    #[error("max in flight must be positive")]
    MaxInFlight,

    #[error("prefix must be an absolute http(s) URL, got '{0}'")]
    Prefix(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    /// Number of most recent requests the error rate is averaged over.
    pub size: usize,
    /// Percentage in (0, 100) at or above which the replay is aborted.
    pub error_rate: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { size: 1000, error_rate: 40.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl BasicAuth {
    /// Credentials are only attached when both parts are present.
    pub fn from_parts(user: Option<String>, password: Option<String>) -> Option<Self> {
        match (user, password) {
            (Some(user), Some(password)) if !user.is_empty() && !password.is_empty() => {
                Some(BasicAuth { user, password })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub prefix: String,
    /// Overall per-request timeout; `None` waits forever.
    pub timeout: Option<Duration>,
    /// Speed-up factor applied to the gaps between record timestamps.
    pub ratio: f64,
    pub pacing: bool,
    /// Circuit breaker; `None` disables it.
    pub window: Option<WindowConfig>,
    pub tls_skip_verify: bool,
    pub basic_auth: Option<BasicAuth>,
    /// Cap on simultaneous requests. `None` fires every record as soon as
    /// pacing allows, which keeps the original traffic shape but lets
    /// concurrency grow with ratio and target latency.
    pub max_in_flight: Option<usize>,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            prefix: "http://localhost".to_string(),
            timeout: Some(Duration::from_millis(60_000)),
            ratio: 1.0,
            pacing: true,
            window: None,
            tls_skip_verify: false,
            basic_auth: None,
            max_in_flight: None,
            max_idle_per_host: 10,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

impl ReplayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ratio.is_finite() || self.ratio < 1.0 {
            return Err(ConfigError::Ratio(self.ratio));
        }
        if let Some(window) = &self.window {
            if window.size == 0 {
                return Err(ConfigError::WindowSize);
            }
            if !(window.error_rate > 0.0 && window.error_rate < 100.0) {
                return Err(ConfigError::ErrorRate(window.error_rate));
            }
        }
        if self.max_in_flight == Some(0) {
            return Err(ConfigError::MaxInFlight);
        }
        let scheme_ok = ["http://", "https://"].iter().any(|scheme| {
            self.prefix
                .get(..scheme.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
                && self.prefix.len() > scheme.len()
        });
        if !scheme_ok {
            return Err(ConfigError::Prefix(self.prefix.clone()));
        }
        Ok(())
    }
}
