use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::ResultLineError;

/// One historical request event.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub payload: String,
    #[serde(default)]
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of replaying one [`Record`].
///
/// Serialized as one tab-separated line:
/// `status_code, start_unix_secs, duration_nanos, path, payload[, error]`.
/// The error field is only present for failed requests. Backslash, tab, CR and
/// LF inside the text fields are written as `\\`, `\t`, `\r` and `\n`, so every
/// record stays on one line and parses back unchanged.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub status_code: u16,
    pub start_unix_secs: i64,
    pub duration_nanos: i64,
    pub path: String,
    pub payload: String,
    pub error: Option<String>,
}

impl ResultRecord {
    /// Synthetic status recorded for requests that never produced a response.
    pub const FAILED_STATUS: u16 = 500;

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.status_code,
            self.start_unix_secs,
            self.duration_nanos,
            Escaped(&self.path),
            Escaped(&self.payload)
        )?;
        if let Some(error) = &self.error {
            write!(f, "\t{}", Escaped(error))?;
        }
        Ok(())
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '\t' => f.write_str("\\t")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                c => fmt::Write::write_char(f, c)?,
            }
        }
        Ok(())
    }
}

/// Unknown escapes are kept verbatim.
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

impl FromStr for ResultRecord {
    type Err = ResultLineError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.splitn(6, '\t').collect();
        if fields.len() < 5 {
            return Err(ResultLineError::FieldCount(fields.len()));
        }

        fn number<T: FromStr>(field: &'static str, value: &str) -> Result<T, ResultLineError> {
            value.parse().map_err(|_| ResultLineError::Number { field, value: value.to_string() })
        }

        Ok(ResultRecord {
            status_code: number("status_code", fields[0])?,
            start_unix_secs: number("start_unix_secs", fields[1])?,
            duration_nanos: number("duration_nanos", fields[2])?,
            path: unescape(fields[3]),
            payload: unescape(fields[4]),
            error: fields.get(5).map(|e| unescape(e)),
        })
    }
}
