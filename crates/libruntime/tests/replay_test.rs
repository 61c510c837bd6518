use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};
use chrono::{DateTime, TimeZone, Utc};
use libprotocol::{Record, RecordSource, ResultRecord};
use libruntime::{BasicAuth, ReplayConfig, ReplayOutcome, Sink, WindowConfig};
use test_support::test_server::{AUTH_PASSWORD, AUTH_USER};
use test_support::{refused_url, spawn_test_server};

struct VecSource(VecDeque<Record>);

impl RecordSource for VecSource {
    fn read_next(&mut self) -> libprotocol::Result<Option<Record>> {
        Ok(self.0.pop_front())
    }
}

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_383_917_958_000 + ms).unwrap()
}

fn get(path: &str, ms: i64) -> Record {
    Record {
        method: "GET".to_string(),
        path: path.to_string(),
        payload: String::new(),
        user_agent: "replay-test".to_string(),
        timestamp: at(ms),
    }
}

async fn replay(config: ReplayConfig, records: Vec<Record>, out: &Path) -> (ReplayOutcome, Vec<ResultRecord>) {
    let sink: Sink = Box::new(tokio::fs::File::create(out).await.unwrap());
    let outcome = libruntime::run(config, VecSource(records.into()), sink).await.unwrap();
    let results = std::fs::read_to_string(out)
        .unwrap()
        .lines()
        .map(|line| line.parse().unwrap())
        .collect();
    (outcome, results)
}

fn unpaced(prefix: &str) -> ReplayConfig {
    ReplayConfig { prefix: prefix.to_string(), pacing: false, ..Default::default() }
}

#[tokio::test]
async fn it_produces_one_result_per_record() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let records = (0..50).map(|i| get(&format!("/ok?i={i}"), i)).collect();

    let (outcome, results) = replay(unpaced(&server.base_url), records, &dir.path().join("out")).await;

    let ReplayOutcome::Completed(summary) = outcome else { panic!("expected completion, got {outcome:?}") };
    assert_eq!(50, summary.requests.total);
    assert_eq!(50, results.len());
    assert!(results.iter().all(|r| r.status_code == 200 && r.error.is_none()));
    let mut paths: Vec<_> = results.iter().map(|r| r.path.clone()).collect();
    paths.sort();
    paths.dedup();
    assert_eq!(50, paths.len());
    assert_eq!(50, server.hits());
    server.shutdown().await;
}

#[tokio::test]
async fn it_records_status_timing_and_fields() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let before = Utc::now().timestamp();

    let (_, results) = replay(unpaced(&server.base_url), vec![get("/sleep/5", 0)], &dir.path().join("out")).await;

    let result = &results[0];
    assert_eq!(200, result.status_code);
    assert_eq!("/sleep/5", result.path);
    assert_eq!("", result.payload);
    assert_eq!(None, result.error);
    assert!(result.start_unix_secs >= before && result.start_unix_secs <= Utc::now().timestamp());
    assert!(result.duration_nanos >= 5_000_000, "{}", result.duration_nanos);
    server.shutdown().await;
}

#[tokio::test]
async fn it_counts_http_errors_as_responses() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig {
        window: Some(WindowConfig { size: 5, error_rate: 10.0 }),
        ..unpaced(&server.base_url)
    };
    let records = (0..20).map(|i| get("/err", i)).collect();

    let (outcome, results) = replay(config, records, &dir.path().join("out")).await;

    let ReplayOutcome::Completed(summary) = outcome else { panic!("expected completion, got {outcome:?}") };
    assert_eq!(0, summary.requests.error);
    assert_eq!(Some(&20), summary.by_status.get(&500));
    assert!(results.iter().all(|r| r.status_code == 500 && r.error.is_none()));
    server.shutdown().await;
}

#[tokio::test]
async fn it_sends_form_posts_auth_and_user_agent() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig {
        basic_auth: Some(BasicAuth { user: AUTH_USER.to_string(), password: AUTH_PASSWORD.to_string() }),
        ..unpaced(&server.base_url)
    };
    let post = Record { method: "POST".to_string(), payload: "a=1&b=2".to_string(), ..get("/form", 0) };
    let records = vec![post, get("/auth", 1), get("/ua/replay-test", 2)];

    let (_, results) = replay(config, records, &dir.path().join("out")).await;

    assert_eq!(3, results.len());
    for result in &results {
        assert_eq!(200, result.status_code, "{}", result);
    }
    let post = results.iter().find(|r| r.path == "/form").unwrap();
    assert_eq!("a=1&b=2", post.payload);
    server.shutdown().await;
}

#[tokio::test]
async fn it_fails_auth_without_credentials() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();

    let (_, results) = replay(unpaced(&server.base_url), vec![get("/auth", 0)], &dir.path().join("out")).await;

    assert_eq!(401, results[0].status_code);
    server.shutdown().await;
}

#[tokio::test]
async fn it_paces_by_timestamp_gaps_over_ratio() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig { ratio: 2.0, pacing: true, ..unpaced(&server.base_url) };
    let records = vec![get("/ok", 0), get("/ok", 200), get("/ok", 400)];

    let started = Instant::now();
    let (_, results) = replay(config, records, &dir.path().join("out")).await;
    let elapsed = started.elapsed();

    assert_eq!(3, results.len());
    assert!(elapsed >= Duration::from_millis(200), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");
    server.shutdown().await;
}

#[tokio::test]
async fn it_ignores_timestamps_without_pacing() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let records = vec![get("/ok", 0), get("/ok", 60_000), get("/ok", 120_000)];

    let started = Instant::now();
    let (_, results) = replay(unpaced(&server.base_url), records, &dir.path().join("out")).await;

    assert_eq!(3, results.len());
    assert!(started.elapsed() < Duration::from_secs(10));
    server.shutdown().await;
}

#[tokio::test]
async fn it_logs_transport_failures_as_500() {
    let dir = tempfile::tempdir().unwrap();
    let records = (0..3).map(|i| get("/ok", i)).collect();

    let (outcome, results) = replay(unpaced(&refused_url()), records, &dir.path().join("out")).await;

    let ReplayOutcome::Completed(summary) = outcome else { panic!("expected completion, got {outcome:?}") };
    assert_eq!(3, summary.requests.error);
    for result in results {
        assert_eq!(500, result.status_code);
        assert!(result.error.is_some());
    }
}

#[tokio::test]
async fn it_aborts_before_next_dispatch_once_window_trips() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig {
        prefix: server.base_url.clone(),
        timeout: Some(Duration::from_millis(50)),
        pacing: true,
        window: Some(WindowConfig { size: 10, error_rate: 40.0 }),
        ..Default::default()
    };
    // every other request outlives the timeout: 5 failures in the first 10
    let records = (0..30)
        .map(|i| get(if i % 2 == 0 { "/ok" } else { "/sleep/1000" }, i * 250))
        .collect();

    let (outcome, _) = replay(config, records, &dir.path().join("out")).await;

    let ReplayOutcome::Aborted(trip) = outcome else { panic!("expected abort, got {outcome:?}") };
    assert_eq!(10, trip.observed);
    assert_eq!(0.5, trip.average);
    assert_eq!(10, server.hits());
    server.shutdown().await;
}

#[tokio::test]
async fn it_limits_concurrency_when_bounded() {
    let server = spawn_test_server();
    let dir = tempfile::tempdir().unwrap();
    let config = ReplayConfig { max_in_flight: Some(2), ..unpaced(&server.base_url) };
    let records = (0..6).map(|i| get("/sleep/200", i)).collect();

    let started = Instant::now();
    let (_, results) = replay(config, records, &dir.path().join("out")).await;

    assert_eq!(6, results.len());
    assert!(started.elapsed() >= Duration::from_millis(600), "{:?}", started.elapsed());
    server.shutdown().await;
}
