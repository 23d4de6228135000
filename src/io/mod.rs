mod http;
mod local;

pub use http::HttpByteSource;
pub use local::LocalFileSource;

use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failure while pulling bytes from a source.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("http request failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("connection lost and remote server does not support Range resume")]
    ResumeNotSupported,

    #[error("max retries exceeded")]
    RetriesExhausted,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for sources that produce a lazy sequence of byte chunks
#[async_trait]
pub trait ByteSource: Send {
    /// Pull the next chunk, or `None` once the source is exhausted
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError>;

    /// Total size of the payload, when the source knows it
    fn total_size(&self) -> Option<u64>;
}

/// A mutable reference is itself a source, so callers can keep the
/// concrete source around (e.g. for transfer statistics) after a load.
#[async_trait]
impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        (**self).next_chunk().await
    }

    fn total_size(&self) -> Option<u64> {
        (**self).total_size()
    }
}
