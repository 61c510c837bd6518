use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use anyhow::Context;
use flate2::read::MultiGzDecoder;
use libprotocol::LogFormat;

pub const STDIN: &str = "-";
pub const DUMMY: &str = "dummy";

/// Opens the replay input named on the command line.
///
/// `-` is stdin, `dummy` is a single built-in line in `format`, and any path
/// ending in `gz` is transparently gunzipped.
pub fn open_input(path: &str, format: LogFormat) -> anyhow::Result<Box<dyn BufRead + Send>> {
    match path {
        STDIN => Ok(Box::new(BufReader::new(std::io::stdin()))),
        DUMMY => Ok(Box::new(Cursor::new(format!("{}\n", format.dummy_line())))),
        path => {
            let file = File::open(path).with_context(|| format!("failed to open input file {path}"))?;
            if path.ends_with("gz") {
                Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
            } else {
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}
