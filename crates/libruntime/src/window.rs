use std::collections::VecDeque;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use crate::config::WindowConfig;

/// Per-request signal fed to the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    /// The request produced a response, whatever its status code.
    Success = 0,
    /// The request could not be built, sent or read.
    Failure = 1,
}

/// Simple moving average over the most recent `capacity` samples.
#[derive(Debug)]
pub struct SlidingWindow {
    capacity: usize,
    samples: VecDeque<Sample>,
    failures: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        SlidingWindow { capacity, samples: VecDeque::with_capacity(capacity), failures: 0 }
    }

    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            if let Some(Sample::Failure) = self.samples.pop_front() {
                self.failures -= 1;
            }
        }
        if sample == Sample::Failure {
            self.failures += 1;
        }
        self.samples.push_back(sample);
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.failures as f64 / self.samples.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Warming,
    Armed,
}

/// Circuit breaker decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    pub average: f64,
    pub threshold: f64,
    pub window_size: usize,
    pub observed: u64,
}

/// Error-rate monitor. Only evaluates the threshold once a full window of
/// samples has been observed.
#[derive(Debug)]
pub struct ErrorRateMonitor {
    window: SlidingWindow,
    size: usize,
    threshold: f64,
    observed: u64,
}

impl ErrorRateMonitor {
    pub fn new(config: &WindowConfig) -> Self {
        ErrorRateMonitor {
            window: SlidingWindow::new(config.size),
            size: config.size,
            threshold: config.error_rate / 100.0,
            observed: 0,
        }
    }

    pub fn state(&self) -> WindowState {
        if self.observed >= self.size as u64 {
            WindowState::Armed
        } else {
            WindowState::Warming
        }
    }

    pub fn observe(&mut self, sample: Sample) -> Option<Trip> {
        self.observed += 1;
        self.window.push(sample);
        if self.state() == WindowState::Warming {
            return None;
        }
        let average = self.window.average()?;
        (average >= self.threshold).then(|| Trip {
            average,
            threshold: self.threshold,
            window_size: self.size,
            observed: self.observed,
        })
    }
}

/// Consumes samples until the channel closes or the breaker trips. A trip
/// cancels `abort` so the driver stops dispatching.
pub(crate) async fn watch(
    mut samples: UnboundedReceiver<Sample>,
    mut monitor: ErrorRateMonitor,
    abort: CancellationToken,
) -> Option<Trip> {
    while let Some(sample) = samples.recv().await {
        if let Some(trip) = monitor.observe(sample) {
            tracing::warn!(
                average = trip.average,
                threshold = trip.threshold,
                observed = trip.observed,
                "error rate over window exceeded threshold, aborting replay"
            );
            abort.cancel();
            return Some(trip);
        }
    }
    None
}
