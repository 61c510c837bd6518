use std::error::Error as _;
use chrono::Utc;
use libprotocol::{Record, ResultRecord};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, Method, Request};
use tokio::time::Instant;
use crate::config::{BasicAuth, ReplayConfig};
use crate::window::Sample;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Turns one [`Record`] into exactly one HTTP call and one [`ResultRecord`].
#[derive(Debug)]
pub struct Dispatcher {
    client: Client,
    prefix: String,
    basic_auth: Option<BasicAuth>,
}

impl Dispatcher {
    pub fn new(config: &ReplayConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .danger_accept_invalid_certs(config.tls_skip_verify);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Dispatcher {
            client: builder.build()?,
            prefix: config.prefix.clone(),
            basic_auth: config.basic_auth.clone(),
        })
    }

    /// Never fails: construction, transport and body errors all come back as
    /// a status 500 result carrying the error text.
    pub async fn fire(&self, record: Record) -> (ResultRecord, Sample) {
        let start_unix_secs = Utc::now().timestamp();
        let started = Instant::now();

        let request = match self.build(&record) {
            Ok(request) => request,
            Err(error) => {
                tracing::debug!(method = %record.method, path = %record.path, %error, "failed to build request");
                return (failed(record, start_unix_secs, 0, error), Sample::Failure);
            }
        };

        let outcome = self.execute(request).await;
        let duration_nanos = started.elapsed().as_nanos().min(i64::MAX as u128) as i64;

        match outcome {
            Ok(status_code) => (
                ResultRecord {
                    status_code,
                    start_unix_secs,
                    duration_nanos,
                    path: record.path,
                    payload: record.payload,
                    error: None,
                },
                Sample::Success,
            ),
            Err(error) => {
                let error = error_text(&error);
                tracing::debug!(path = %record.path, %error, "request failed");
                (failed(record, start_unix_secs, duration_nanos, error), Sample::Failure)
            }
        }
    }

    fn build(&self, record: &Record) -> Result<Request, String> {
        let method = Method::from_bytes(record.method.as_bytes()).map_err(|e| e.to_string())?;
        let url = format!("{}{}", self.prefix, record.path);

        let mut builder = self
            .client
            .request(method.clone(), url.as_str())
            .header(USER_AGENT, record.user_agent.as_str())
            .body(record.payload.clone());
        if method == Method::POST {
            builder = builder.header(CONTENT_TYPE, FORM_CONTENT_TYPE);
        }
        if let Some(auth) = &self.basic_auth {
            builder = builder.basic_auth(&auth.user, Some(&auth.password));
        }
        builder.build().map_err(|e| error_text(&e))
    }

    /// Drains the body so the connection goes back to the pool.
    async fn execute(&self, request: Request) -> Result<u16, reqwest::Error> {
        let mut response = self.client.execute(request).await?;
        let status = response.status().as_u16();
        while response.chunk().await?.is_some() {}
        Ok(status)
    }
}

fn failed(record: Record, start_unix_secs: i64, duration_nanos: i64, error: String) -> ResultRecord {
    ResultRecord {
        status_code: ResultRecord::FAILED_STATUS,
        start_unix_secs,
        duration_nanos,
        path: record.path,
        payload: record.payload,
        error: Some(error),
    }
}

/// Flattens the error chain onto one line so it fits a result field.
fn error_text(error: &reqwest::Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text.replace(['\t', '\n', '\r'], " ")
}
