//! # cbload
//!
//! A comic book archive loader with streaming HTTP support.
//!
//! This library turns an incoming byte stream — from an HTTP transfer or a
//! local file — into an ordered collection of pages. Loading and extraction
//! run as independent asynchronous processes: chunks are handed to the
//! extractor as they arrive, every extracted entry becomes a concurrent
//! page-construction task, and once extraction finishes the tasks are joined
//! and the surviving pages are published in filename order. Progress and
//! lifecycle events fan out to subscribers along the way.
//!
//! A single entry that fails page construction does not abort the load; it is
//! dropped and reported through an aggregate warning event.
//!
//! ## Example
//!
//! ```no_run
//! use cbload::{Book, BookEvent, HttpByteSource};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = "https://example.com/issue-01.cbz".to_string();
//!     let mut book = Book::with_origin("issue-01", url.clone());
//!
//!     book.subscribe(|book, event| {
//!         if let BookEvent::PageReady { sequence, .. } = event {
//!             println!("page {}/{} ready", sequence, book.page_count());
//!         }
//!     });
//!
//!     let source = HttpByteSource::open(url).await?;
//!     book.load_from_byte_source(source, None).await?;
//!
//!     println!("{} pages", book.page_count());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod book;
pub mod cli;
pub mod io;

pub use archive::{ArchiveDetector, ArchiveExtractor, ExtractSignal, SignatureDetector, UnarchiveError, ZipStreamExtractor};
pub use book::{
    Book, BookError, BookEvent, EventBus, LoadState, Page, PageError, PageFactory, PageKind,
    RasterPageFactory, SubscriptionId, UnarchiveState,
};
pub use cli::Cli;
pub use io::{ByteSource, HttpByteSource, LoadError, LocalFileSource};
