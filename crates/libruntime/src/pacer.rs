use std::time::Duration;
use chrono::{DateTime, Utc};

/// Reproduces the gaps between consecutive record timestamps, compressed by
/// `ratio`.
///
/// A record whose timestamp is not after the previous one is dispatched
/// immediately. Out-of-order or duplicate timestamps therefore collapse into a
/// burst instead of being reordered.
#[derive(Debug)]
pub struct Pacer {
    enabled: bool,
    ratio: f64,
    last: Option<DateTime<Utc>>,
}

impl Pacer {
    pub fn new(enabled: bool, ratio: f64) -> Self {
        Pacer { enabled, ratio, last: None }
    }

    /// How long to wait before dispatching a record stamped `timestamp`.
    pub fn delay_for(&mut self, timestamp: DateTime<Utc>) -> Option<Duration> {
        if !self.enabled {
            return None;
        }
        let last = self.last.replace(timestamp)?;
        let delta = (timestamp - last).to_std().ok()?;
        if delta.is_zero() {
            return None;
        }
        Some(delta.div_f64(self.ratio))
    }
}
