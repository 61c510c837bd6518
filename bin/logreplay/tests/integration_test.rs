use assert_cmd::{cargo, Command};
use predicates::prelude::*;
use test_support::{refused_url, spawn_test_server};

fn logreplay() -> Command {
    Command::new(cargo::cargo_bin!("logreplay"))
}

#[tokio::test(flavor = "multi_thread")]
async fn it_replays_dummy_line_to_stdout() {
    let server = spawn_test_server();
    let prefix = server.base_url.clone();

    tokio::task::spawn_blocking(move || {
        logreplay()
            .arg("--file=dummy")
            .arg(format!("--prefix={prefix}"))
            .assert()
            .code(0)
            .stdout(predicate::str::is_match(r"^200\t\d+\t\d+\t/t/100x100/foo/bar.jpeg\t\n$").unwrap());
    })
    .await
    .unwrap();

    assert_eq!(1, server.hits());
    server.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn it_replays_jsonl_from_stdin_to_file_with_report() {
    let server = spawn_test_server();
    let prefix = server.base_url.clone();
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("results.tsv");
    let report = dir.path().join("report.json");
    let input = concat!(
        r#"{"method":"GET","path":"/ok","timestamp":"2024-01-01T00:00:00Z"}"#, "\n",
        r#"{"method":"POST","path":"/form","payload":"a=1","timestamp":"2024-01-01T00:00:10Z"}"#, "\n",
        r#"{"method":"GET","path":"/err","timestamp":"2024-01-01T00:00:20Z"}"#, "\n",
    );

    let (log_arg, report_arg) = (log.clone(), report.clone());
    tokio::task::spawn_blocking(move || {
        logreplay()
            .arg("--file-type=jsonl")
            .arg("--skip-sleep")
            .arg(format!("--prefix={prefix}"))
            .arg(format!("--log={}", log_arg.display()))
            .arg(format!("--report={}", report_arg.display()))
            .write_stdin(input)
            .assert()
            .code(0)
            .stdout(predicate::str::is_empty());
    })
    .await
    .unwrap();

    let mut statuses: Vec<String> = std::fs::read_to_string(&log)
        .unwrap()
        .lines()
        .map(|l| format!("{} {}", l.split('\t').nth(3).unwrap(), l.split('\t').next().unwrap()))
        .collect();
    statuses.sort();
    assert_eq!(vec!["/err 500", "/form 200", "/ok 200"], statuses);

    let report = std::fs::read_to_string(&report).unwrap();
    assert!(report.contains(r#""outcome": "completed""#), "{report}");
    server.shutdown().await;
}

#[test]
fn it_exits_1_when_circuit_breaker_trips() {
    logreplay()
        .arg("--file=dummy")
        .arg(format!("--prefix={}", refused_url()))
        .arg("--enable-window")
        .arg("--window-size=1")
        .arg("--error-rate=50")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("circuit breaker"));
}

#[test]
fn it_exits_0_on_failures_without_window() {
    logreplay()
        .arg("--file=dummy")
        .arg(format!("--prefix={}", refused_url()))
        .assert()
        .code(0)
        .stdout(predicate::str::starts_with("500\t"));
}

#[test]
fn it_exits_3_on_slow_down_ratio() {
    logreplay()
        .arg("--file=dummy")
        .arg("--ratio=0.5")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("ratio"));
}

#[test]
fn it_exits_3_on_bad_error_rate() {
    logreplay()
        .arg("--file=dummy")
        .arg("--enable-window")
        .arg("--error-rate=100")
        .assert()
        .code(3);
}

#[test]
fn it_exits_3_on_log_format_without_request() {
    logreplay()
        .arg("--file=dummy")
        .arg("--format=$remote_addr [$time_local]")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("$request"));
}

#[test]
fn it_exits_3_on_unknown_file_type() {
    logreplay().arg("--file-type=solr").assert().code(3);
}

#[test]
fn it_exits_2_on_missing_input() {
    logreplay()
        .arg("--file=/definitely/not/here.log")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("/definitely/not/here.log"));
}

#[test]
fn it_exits_2_on_undecodable_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.log");
    std::fs::write(&path, "this is not an access log\n").unwrap();

    logreplay()
        .arg(format!("--file={}", path.display()))
        .arg(format!("--prefix={}", refused_url()))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("line 1"));
}

#[test]
fn it_prints_help() {
    logreplay()
        .arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("--enable-window"));
}
