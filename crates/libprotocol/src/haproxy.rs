use std::io::BufRead;
use std::sync::LazyLock;
use chrono::NaiveDateTime;
use regex::Regex;
use crate::source::{split_request_line, Lines};
use crate::{Record, RecordSource, Result, SourceError};

static HTTP_LOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[(?P<accept>\d{2}/\w{3}/\d{4}:\d{2}:\d{2}:\d{2}\.\d{3})\].*"(?P<request>[^"]*)"\s*$"#)
        .expect("haproxy pattern is valid")
});

const ACCEPT_DATE: &str = "%d/%b/%Y:%H:%M:%S%.3f";

/// Decodes haproxy HTTP-mode log lines. Accept dates carry no zone and are
/// read as UTC.
pub struct HaproxyReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> HaproxyReader<R> {
    pub fn new(input: R) -> Self {
        HaproxyReader { lines: Lines::new(input) }
    }
}

impl<R: BufRead> RecordSource for HaproxyReader<R> {
    fn read_next(&mut self) -> Result<Option<Record>> {
        let Some((line_no, line)) = self.lines.next_line()? else {
            return Ok(None);
        };
        let caps = HTTP_LOG.captures(line).ok_or_else(|| SourceError::Parse {
            line: line_no,
            message: "not an haproxy HTTP log line".to_string(),
        })?;

        let accept = &caps["accept"];
        let timestamp = NaiveDateTime::parse_from_str(accept, ACCEPT_DATE)
            .map_err(|_| SourceError::Time { line: line_no, value: accept.to_string() })?
            .and_utc();
        let (method, path) = split_request_line(line_no, &caps["request"])?;

        Ok(Some(Record { method, path, payload: String::new(), user_agent: String::new(), timestamp }))
    }
}
