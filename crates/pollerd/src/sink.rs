//! Result sinks.

use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::record::ResultRecord;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// Destination for result records.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, record: &ResultRecord) -> Result<(), SinkError>;
}

/// Builds the sink described by `config`.
pub async fn build_sink(config: &SinkConfig) -> Result<Arc<dyn Sink>, SinkError> {
    let sink: Arc<dyn Sink> = match config {
        SinkConfig::Stdout => Arc::new(WriterSink::stdout()),
        SinkConfig::File { path } => Arc::new(WriterSink::append(path).await?),
        SinkConfig::Http { url, timeout_secs } => {
            Arc::new(HttpSink::new(url, Duration::from_secs(*timeout_secs))?)
        }
    };
    Ok(sink)
}

/// Writes one JSON document per line.
pub struct WriterSink {
    out: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl WriterSink {
    pub fn new(out: Box<dyn AsyncWrite + Send + Unpin>) -> Self {
        Self {
            out: tokio::sync::Mutex::new(out),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(tokio::io::stdout()))
    }

    /// Appends to `path`, creating it if needed.
    pub async fn append(path: &Path) -> Result<Self, SinkError> {
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        info!(path = %path.display(), "Writing records to file");
        Ok(Self::new(Box::new(file)))
    }
}

#[async_trait]
impl Sink for WriterSink {
    async fn send(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct HttpBody<'a> {
    metrics: [&'a ResultRecord; 1],
}

/// POSTs each record as `{"metrics": [record]}`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, record: &ResultRecord) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.url)
            .json(&HttpBody { metrics: [record] })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Status {
                status: status.as_u16(),
            });
        }
        debug!(url = %self.url, status = status.as_u16(), "record posted");
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ResultRecord>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().clone()
    }

    /// Makes every send fail with an I/O error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn send(&self, record: &ResultRecord) -> Result<(), SinkError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink unavailable",
            )));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Metadata, RecordData};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn record() -> ResultRecord {
        let mut values = BTreeMap::new();
        values.insert("1.3.6.1.2.1.1.5.0".to_string(), "router1".into());
        ResultRecord::new(
            Metadata {
                target: "10.0.0.1".into(),
                id: None,
            },
            RecordData::Raw(values),
        )
    }

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        let sink = build_sink(&SinkConfig::File { path: path.clone() }).await.unwrap();
        sink.send(&record()).await.unwrap();
        sink.send(&record()).await.unwrap();
        drop(sink);

        let sink = WriterSink::append(&path).await.unwrap();
        sink.send(&record()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        let parsed: ResultRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.metadata.target, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_memory_sink() {
        let sink = MemorySink::new();
        sink.send(&record()).await.unwrap();
        sink.set_failing(true);
        assert!(matches!(sink.send(&record()).await, Err(SinkError::Io(_))));
        assert_eq!(sink.records().len(), 1);
    }

    #[test]
    fn test_http_body_shape() {
        let record = record();
        let body = serde_json::to_value(HttpBody { metrics: [&record] }).unwrap();
        assert_eq!(body["metrics"][0]["metadata"]["target"], "10.0.0.1");
        assert_eq!(body["metrics"].as_array().unwrap().len(), 1);
    }
}
