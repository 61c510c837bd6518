mod protocol_error;
pub mod schema;
pub mod source;
pub mod nginx;
pub mod haproxy;
pub mod jsonl;

use std::io::BufRead;
use std::str::FromStr;

pub use crate::protocol_error::{ResultLineError, SourceError};
pub use crate::schema::{Record, ResultRecord};
pub use crate::source::RecordSource;

pub type Result<T> = std::result::Result<T, SourceError>;

/// Default nginx `log_format` understood by [`nginx::NginxReader`].
pub const DEFAULT_NGINX_FORMAT: &str = r#"$remote_addr [$time_local] "$request" $status $request_length $body_bytes_sent $request_time "$t_size" $read_time $gen_time"#;

/// Historical log grammars a replay can be fed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Nginx,
    Haproxy,
    Jsonl,
}

impl LogFormat {
    pub fn name(&self) -> &'static str {
        match self {
            LogFormat::Nginx => "nginx",
            LogFormat::Haproxy => "haproxy",
            LogFormat::Jsonl => "jsonl",
        }
    }

    /// Builds a decoder for this grammar over `input`. `nginx_format` is only
    /// consulted for [`LogFormat::Nginx`].
    pub fn reader<R>(&self, input: R, nginx_format: &str) -> Result<Box<dyn RecordSource + Send>>
    where
        R: BufRead + Send + 'static,
    {
        Ok(match self {
            LogFormat::Nginx => Box::new(nginx::NginxReader::new(input, nginx_format)?),
            LogFormat::Haproxy => Box::new(haproxy::HaproxyReader::new(input)),
            LogFormat::Jsonl => Box::new(jsonl::JsonlReader::new(input)),
        })
    }

    /// One built-in sample line in this grammar, used for smoke runs.
    pub fn dummy_line(&self) -> &'static str {
        match self {
            LogFormat::Nginx => r#"89.234.89.123 [08/Nov/2013:13:39:18 +0000] "GET /t/100x100/foo/bar.jpeg HTTP/1.1" 200 1027 2430 0.014 "100x100" 10 1"#,
            LogFormat::Haproxy => r#"<142>Sep 27 00:15:57 haproxy[28513]: 67.188.214.167:64531 [27/Sep/2013:00:15:43.494] frontend~ test/10.127.57.177-10000 449/0/0/13531/13980 200 13824 - - ---- 6/6/0/1/0 0/0 "GET / HTTP/1.1""#,
            LogFormat::Jsonl => r#"{"method":"GET","path":"/","payload":"","user_agent":"logreplay","timestamp":"2013-11-08T13:39:18Z"}"#,
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nginx" => Ok(LogFormat::Nginx),
            "haproxy" => Ok(LogFormat::Haproxy),
            "jsonl" => Ok(LogFormat::Jsonl),
            other => Err(format!("file-type can be one of nginx, haproxy or jsonl, not '{other}'")),
        }
    }
}
