use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::{ByteSource, LoadError};

const CHUNK_SIZE: usize = 64 * 1024;

/// Local file byte source reading fixed-size chunks
#[derive(Debug)]
pub struct LocalFileSource {
    file: File,
    size: u64,
}

impl LocalFileSource {
    pub async fn open(path: &Path) -> Result<Self, LoadError> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self { file, size })
    }
}

#[async_trait]
impl ByteSource for LocalFileSource {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, LoadError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    fn total_size(&self) -> Option<u64> {
        Some(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn reads_whole_file_in_chunks() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&payload).unwrap();

        let mut source = LocalFileSource::open(tmp.path()).await.unwrap();
        assert_eq!(source.total_size(), Some(payload.len() as u64));

        let mut collected = Vec::new();
        while let Some(chunk) = source.next_chunk().await.unwrap() {
            assert!(chunk.len() <= CHUNK_SIZE);
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, payload);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = LocalFileSource::open(Path::new("/no/such/file.cbz"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }
}
