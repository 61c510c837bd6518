use std::collections::BTreeMap;
use hdrhistogram::Histogram;
use libprotocol::ResultRecord;
use serde::Serialize;

pub const LOWEST_US: u64 = 1;
pub const HIGHEST_US: u64 = 600_000_000;
pub const SIGFIG: u8 = 3;

#[derive(Debug)]
pub struct MetricsAggregator {
    pub total_requests: u64,
    pub ok_requests: u64,
    pub error_requests: u64,
    pub by_status: BTreeMap<u16, u64>,
    /// Only requests that reached the network; latency in microseconds.
    pub latency: Histogram<u64>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            ok_requests: 0,
            error_requests: 0,
            by_status: BTreeMap::new(),
            latency: Histogram::new_with_bounds(LOWEST_US, HIGHEST_US, SIGFIG)
                .expect("latency histogram bounds are valid"),
        }
    }

    pub fn consume(&mut self, result: &ResultRecord) {
        self.total_requests += 1;
        if result.is_failure() {
            self.error_requests += 1;
        } else {
            self.ok_requests += 1;
        }
        *self.by_status.entry(result.status_code).or_insert(0) += 1;

        if result.duration_nanos > 0 {
            let micros = (result.duration_nanos as u64 / 1_000).max(LOWEST_US);
            self.latency.saturating_record(micros);
        }
    }

    pub fn summary(&self) -> ReplaySummary {
        ReplaySummary {
            requests: Requests {
                total: self.total_requests,
                ok: self.ok_requests,
                error: self.error_requests,
            },
            by_status: self.by_status.clone(),
            latency: LatencySummary::summarize(&self.latency),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ReplaySummary {
    pub requests: Requests,
    pub by_status: BTreeMap<u16, u64>,
    pub latency: LatencySummary,
}

#[derive(Debug, Serialize, Copy, Clone, Default, PartialEq, Eq)]
pub struct Requests {
    pub total: u64,
    /// Got a response, whatever the status code.
    pub ok: u64,
    pub error: u64,
}

/// Latency percentiles in milliseconds.
#[derive(Debug, Serialize, Copy, Clone, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: u64,
    pub p50: u64,
    pub p90: u64,
    pub p95: u64,
    pub p99: u64,
}

impl LatencySummary {
    pub fn summarize(histogram: &Histogram<u64>) -> Self {
        if histogram.is_empty() {
            return LatencySummary::default();
        }
        LatencySummary {
            count: histogram.len(),
            min: histogram.min() / 1000,
            max: histogram.max() / 1000,
            mean: histogram.mean() as u64 / 1000,
            p50: histogram.value_at_quantile(0.50) / 1000,
            p90: histogram.value_at_quantile(0.90) / 1000,
            p95: histogram.value_at_quantile(0.95) / 1000,
            p99: histogram.value_at_quantile(0.99) / 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(status_code: u16, duration_ms: i64, error: Option<&str>) -> ResultRecord {
        ResultRecord {
            status_code,
            start_unix_secs: 0,
            duration_nanos: duration_ms * 1_000_000,
            path: "/".to_string(),
            payload: String::new(),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn it_counts_statuses_and_failures() {
        let mut metrics = MetricsAggregator::new();
        metrics.consume(&result(200, 10, None));
        metrics.consume(&result(404, 20, None));
        metrics.consume(&result(500, 30, Some("timed out")));
        metrics.consume(&result(500, 0, Some("invalid method")));

        let summary = metrics.summary();
        assert_eq!(Requests { total: 4, ok: 2, error: 2 }, summary.requests);
        assert_eq!(BTreeMap::from([(200, 1), (404, 1), (500, 2)]), summary.by_status);
        assert_eq!(3, summary.latency.count);
        assert_eq!(10, summary.latency.min);
        assert_eq!(30, summary.latency.max);
    }

    #[test]
    fn it_summarizes_empty_histogram_as_zeroes() {
        let summary = MetricsAggregator::new().summary();
        assert_eq!(LatencySummary::default(), summary.latency);
        assert_eq!(0, summary.requests.total);
    }
}
