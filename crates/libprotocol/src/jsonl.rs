use std::io::BufRead;
use crate::source::Lines;
use crate::{Record, RecordSource, Result, SourceError};

/// One JSON-encoded [`Record`] per line.
pub struct JsonlReader<R> {
    lines: Lines<R>,
}

impl<R: BufRead> JsonlReader<R> {
    pub fn new(input: R) -> Self {
        JsonlReader { lines: Lines::new(input) }
    }
}

impl<R: BufRead> RecordSource for JsonlReader<R> {
    fn read_next(&mut self) -> Result<Option<Record>> {
        let Some((line_no, line)) = self.lines.next_line()? else {
            return Ok(None);
        };
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| SourceError::Parse { line: line_no, message: e.to_string() })
    }
}
