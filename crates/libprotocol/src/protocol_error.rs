use thiserror::Error;

/// Failure of a record source. Anything but end-of-input is fatal to a replay.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid log format: {0}")]
    Format(String),

    #[error("unparseable record at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid timestamp at line {line}: '{value}'")]
    Time { line: usize, value: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResultLineError {
    #[error("result line has {0} fields, expected 5 or 6")]
    FieldCount(usize),

    #[error("invalid {field} '{value}'")]
    Number { field: &'static str, value: String },
}
