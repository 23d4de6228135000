use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{ByteSource, LoadError};

/// Streaming HTTP byte source for remote archives
pub struct HttpByteSource {
    client: Client,
    url: String,
    response: Option<Response>,
    size: Option<u64>,
    resumable: bool,
    received: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpByteSource {
    /// Open a streaming GET request for the given URL
    ///
    /// The response's Content-Length (when present) becomes the total size,
    /// and the Accept-Ranges header decides whether a dropped connection can
    /// be resumed with a Range request.
    pub async fn open(url: String) -> Result<Self, LoadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let resp = client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(LoadError::Status(resp.status()));
        }

        let size = resp.content_length();

        let resumable = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("bytes"));

        Ok(Self {
            client,
            url,
            response: Some(resp),
            size,
            resumable,
            received: 0,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Re-issue the request from the current offset after a dropped connection
    async fn reopen(&mut self) -> Result<(), LoadError> {
        if !self.resumable {
            return Err(LoadError::ResumeNotSupported);
        }

        let range = format!("bytes={}-", self.received);
        let resp = self
            .client
            .get(&self.url)
            .header("Range", &range)
            .send()
            .await?;

        if resp.status() != StatusCode::PARTIAL_CONTENT {
            return Err(LoadError::Status(resp.status()));
        }

        self.response = Some(resp);
        Ok(())
    }
}

#[async_trait]
impl ByteSource for HttpByteSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        let mut retry_count = 0;

        loop {
            let Some(resp) = self.response.as_mut() else {
                return Ok(None);
            };

            match resp.chunk().await {
                Ok(Some(bytes)) => {
                    self.received += bytes.len() as u64;
                    self.transferred_bytes
                        .fetch_add(bytes.len() as u64, Ordering::Relaxed);
                    return Ok(Some(bytes.to_vec()));
                }
                Ok(None) => {
                    self.response = None;
                    return Ok(None);
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_body() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(LoadError::RetriesExhausted);
                    }
                    tracing::warn!(
                        "connection error, retry {}/{}: {}",
                        retry_count,
                        self.max_retry,
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                    self.reopen().await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn total_size(&self) -> Option<u64> {
        self.size
    }
}
