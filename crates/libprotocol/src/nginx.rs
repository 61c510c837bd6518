use std::collections::HashSet;
use std::io::BufRead;
use chrono::{DateTime, Utc};
use regex::Regex;
use crate::source::{or_empty, split_request_line, Lines};
use crate::{Record, RecordSource, Result, SourceError};

const TIME_LOCAL: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Decodes nginx access logs written with a given `log_format` template.
pub struct NginxReader<R> {
    lines: Lines<R>,
    pattern: Regex,
}

impl<R: BufRead> NginxReader<R> {
    pub fn new(input: R, format: &str) -> Result<Self> {
        Ok(NginxReader { lines: Lines::new(input), pattern: compile_format(format)? })
    }
}

impl<R: BufRead> RecordSource for NginxReader<R> {
    fn read_next(&mut self) -> Result<Option<Record>> {
        let Some((line_no, line)) = self.lines.next_line()? else {
            return Ok(None);
        };
        let caps = self.pattern.captures(line).ok_or_else(|| SourceError::Parse {
            line: line_no,
            message: "line does not match log format".to_string(),
        })?;

        let (method, path) = split_request_line(line_no, &caps["request"])?;
        let timestamp = match (caps.name("time_local"), caps.name("time_iso8601")) {
            (Some(local), _) => DateTime::parse_from_str(local.as_str(), TIME_LOCAL),
            (None, Some(iso)) => DateTime::parse_from_rfc3339(iso.as_str()),
            (None, None) => unreachable!("format compiled without a time variable"),
        }
        .map_err(|_| SourceError::Time {
            line: line_no,
            value: caps.name("time_local").or(caps.name("time_iso8601")).map(|m| m.as_str()).unwrap_or_default().to_string(),
        })?
        .with_timezone(&Utc);

        Ok(Some(Record {
            method,
            path,
            payload: or_empty(caps.name("request_body").map(|m| m.as_str())),
            user_agent: or_empty(caps.name("http_user_agent").map(|m| m.as_str())),
            timestamp,
        }))
    }
}

/// Turns a `log_format` template into an anchored regex with one named group
/// per `$variable`. Repeated variables only capture on first occurrence.
fn compile_format(format: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    let mut seen = HashSet::new();
    let mut rest = format;

    while let Some(start) = rest.find('$') {
        pattern.push_str(&regex::escape(&rest[..start]));
        let after = &rest[start + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if len == 0 {
            pattern.push_str(&regex::escape("$"));
            rest = after;
            continue;
        }

        let name = &after[..len];
        if seen.insert(name) {
            pattern.push_str(&format!("(?P<{name}>.*?)"));
        } else {
            pattern.push_str("(?:.*?)");
        }
        rest = &after[len..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');

    if !seen.contains("request") {
        return Err(SourceError::Format("log format must contain $request".to_string()));
    }
    if !seen.contains("time_local") && !seen.contains("time_iso8601") {
        return Err(SourceError::Format("log format must contain $time_local or $time_iso8601".to_string()));
    }
    Regex::new(&pattern).map_err(|e| SourceError::Format(e.to_string()))
}
