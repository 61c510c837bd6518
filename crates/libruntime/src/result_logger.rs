use libprotocol::ResultRecord;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc::UnboundedReceiver;
use crate::metrics::{MetricsAggregator, ReplaySummary};

/// Byte-oriented destination for result lines.
pub type Sink = Box<dyn AsyncWrite + Send + Unpin>;

/// Single consumer of every [`ResultRecord`].
///
/// Lines are written in channel-receipt order, which is neither dispatch order
/// nor log order: concurrent requests finish in whatever order the target
/// answers them.
pub struct ResultLogger {
    writer: BufWriter<Sink>,
    metrics: MetricsAggregator,
}

impl ResultLogger {
    pub fn new(sink: Sink) -> Self {
        ResultLogger { writer: BufWriter::new(sink), metrics: MetricsAggregator::new() }
    }

    /// Drains `results` until every sender is gone, then flushes the sink.
    pub async fn run(mut self, mut results: UnboundedReceiver<ResultRecord>) -> std::io::Result<ReplaySummary> {
        let mut line = String::new();
        while let Some(result) = results.recv().await {
            line.clear();
            line.push_str(&result.to_string());
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await?;
            self.metrics.consume(&result);

            // keep the sink current whenever the channel runs dry
            if results.is_empty() {
                self.writer.flush().await?;
            }
        }
        self.writer.flush().await?;
        tracing::debug!(lines = self.metrics.total_requests, "result log drained");

        Ok(self.metrics.summary())
    }
}
