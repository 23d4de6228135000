use async_trait::async_trait;
use thiserror::Error;

/// Failure to construct a single page. Never fatal for the book: the entry is
/// dropped and counted in the post-join warning.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("page data is empty")]
    Empty,

    #[error("unrecognized image data in {file_name}")]
    Unrecognized { file_name: String },

    #[error("page construction failed: {0}")]
    Failed(String),
}

/// Image formats a page can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl PageKind {
    /// Sniff the image kind from the leading bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(PageKind::Jpeg)
        } else if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Some(PageKind::Png)
        } else if data.starts_with(b"GIF8") {
            Some(PageKind::Gif)
        } else if data.starts_with(b"RIFF") && data.len() >= 12 && &data[8..12] == b"WEBP" {
            Some(PageKind::Webp)
        } else {
            None
        }
    }
}

/// One readable unit of content, built from an extracted archive entry
#[derive(Debug, Clone)]
pub struct Page {
    pub file_name: String,
    pub kind: PageKind,
    pub data: Vec<u8>,
}

/// Trait for collaborators that turn raw entry bytes into a [`Page`]
#[async_trait]
pub trait PageFactory: Send + Sync {
    async fn build(&self, file_name: String, data: Vec<u8>) -> Result<Page, PageError>;
}

/// Default factory: accepts raster image entries, rejects everything else
pub struct RasterPageFactory;

#[async_trait]
impl PageFactory for RasterPageFactory {
    async fn build(&self, file_name: String, data: Vec<u8>) -> Result<Page, PageError> {
        if data.is_empty() {
            return Err(PageError::Empty);
        }
        let kind = PageKind::sniff(&data).ok_or(PageError::Unrecognized {
            file_name: file_name.clone(),
        })?;
        Ok(Page {
            file_name,
            kind,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00];
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn sniffs_common_image_magics() {
        assert_eq!(PageKind::sniff(JPEG), Some(PageKind::Jpeg));
        assert_eq!(PageKind::sniff(PNG), Some(PageKind::Png));
        assert_eq!(PageKind::sniff(b"GIF89a..."), Some(PageKind::Gif));
        assert_eq!(PageKind::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(PageKind::Webp));
        assert_eq!(PageKind::sniff(b"plain text"), None);
    }

    #[tokio::test]
    async fn factory_builds_a_jpeg_page() {
        let page = RasterPageFactory
            .build("001.jpg".to_string(), JPEG.to_vec())
            .await
            .unwrap();
        assert_eq!(page.kind, PageKind::Jpeg);
        assert_eq!(page.file_name, "001.jpg");
    }

    #[tokio::test]
    async fn factory_rejects_empty_and_unknown_data() {
        let err = RasterPageFactory
            .build("a.jpg".to_string(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::Empty));

        let err = RasterPageFactory
            .build("a.txt".to_string(), b"hello".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::Unrecognized { .. }));
    }
}
