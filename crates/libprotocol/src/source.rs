use std::io::BufRead;
use crate::{Record, Result};

/// Lazy, finite, forward-only stream of [`Record`]s.
///
/// `Ok(None)` signals end-of-input; every `Err` is fatal to the replay.
pub trait RecordSource {
    fn read_next(&mut self) -> Result<Option<Record>>;
}

impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    fn read_next(&mut self) -> Result<Option<Record>> {
        (**self).read_next()
    }
}

/// Yields non-blank lines together with their 1-based line number.
pub(crate) struct Lines<R> {
    input: R,
    buf: String,
    line_no: usize,
}

impl<R: BufRead> Lines<R> {
    pub(crate) fn new(input: R) -> Self {
        Lines { input, buf: String::new(), line_no: 0 }
    }

    pub(crate) fn next_line(&mut self) -> Result<Option<(usize, &str)>> {
        loop {
            self.buf.clear();
            if self.input.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        Ok(Some((self.line_no, self.buf.trim_end_matches(['\n', '\r']))))
    }
}

/// Splits an HTTP request line (`GET /path HTTP/1.1`) into method and target.
pub(crate) fn split_request_line(line_no: usize, request: &str) -> Result<(String, String)> {
    let mut parts = request.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(method), Some(path)) => Ok((method.to_string(), path.to_string())),
        _ => Err(crate::SourceError::Parse {
            line: line_no,
            message: format!("malformed request line '{request}'"),
        }),
    }
}

/// Access logs write `-` for absent values.
pub(crate) fn or_empty(value: Option<&str>) -> String {
    match value {
        Some("-") | None => String::new(),
        Some(v) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn it_skips_blank_lines_and_counts_them() {
        let mut lines = Lines::new(Cursor::new("a\n\n  \r\nb\r\n"));
        assert_eq!(Some((1, "a")), lines.next_line().unwrap());
        assert_eq!(Some((4, "b")), lines.next_line().unwrap());
        assert_eq!(None, lines.next_line().unwrap());
    }

    #[test]
    fn it_splits_request_line() {
        assert_eq!(
            ("POST".to_string(), "/submit?x=1".to_string()),
            split_request_line(1, "POST /submit?x=1 HTTP/1.1").unwrap()
        );
        assert!(split_request_line(7, "-").is_err());
    }
}
