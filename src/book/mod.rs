//! The book aggregate.
//!
//! A [`Book`] owns the dual state machine (load vs. unarchive), the subscriber
//! bus, and the collaborator seams (archive detection, page construction). It
//! is the only component that emits events. One load operation is allowed per
//! instance; afterwards the book is a read-only collection of sorted pages.
//!
//! ## States
//!
//! Load: `NotLoaded → Loading → Loaded`, with `Error` as the only terminal
//! outside that path. Unarchive: `NotUnarchived → ReadyForUnarchiving →
//! Unarchiving → Unarchived`, again with a terminal `Error`. Both advance
//! monotonically within a load attempt.

mod events;
mod load;
mod page;
mod pipeline;
mod unarchive;

pub use events::{BookEvent, EventBus, SubscriptionId};
pub use page::{Page, PageError, PageFactory, PageKind, RasterPageFactory};

use std::sync::Arc;
use thiserror::Error;

use crate::archive::{ArchiveDetector, SignatureDetector, UnarchiveError};
use crate::io::LoadError;

use unarchive::ExtractionAdapter;

/// Failure of a load operation
#[derive(Debug, Error)]
pub enum BookError {
    /// The operation was invoked in a lifecycle state that forbids it
    #[error("{op} rejected: {reason}")]
    InvalidState { op: &'static str, reason: String },

    /// The byte source failed at the transport level
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Classification or extraction of the archive failed
    #[error(transparent)]
    Unarchive(#[from] UnarchiveError),
}

/// Byte-acquisition lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Error,
}

/// Extraction lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnarchiveState {
    NotUnarchived,
    ReadyForUnarchiving,
    Unarchiving,
    Unarchived,
    Error,
}

/// A loadable book: an archive of pages plus the machinery to acquire,
/// extract, and order them
pub struct Book {
    name: String,
    origin: Option<String>,
    load_state: LoadState,
    unarchive_state: UnarchiveState,
    loading_percentage: f64,
    unarchiving_percentage: f64,
    expected_size: Option<u64>,
    declared_page_count: usize,
    ready_pages: Vec<Arc<Page>>,
    pub(crate) adapter: Option<ExtractionAdapter>,
    bus: EventBus<Book, BookEvent>,
    detector: Arc<dyn ArchiveDetector>,
    page_factory: Arc<dyn PageFactory>,
}

impl Book {
    /// A book fed from a locally supplied buffer (no origin)
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// A book identified by an opaque locator (URL, path, ...)
    pub fn with_origin(name: impl Into<String>, origin: impl Into<String>) -> Self {
        Self::build(name.into(), Some(origin.into()))
    }

    fn build(name: String, origin: Option<String>) -> Self {
        Self {
            name,
            origin,
            load_state: LoadState::NotLoaded,
            unarchive_state: UnarchiveState::NotUnarchived,
            loading_percentage: 0.0,
            unarchiving_percentage: 0.0,
            expected_size: None,
            declared_page_count: 0,
            ready_pages: Vec::new(),
            adapter: None,
            bus: EventBus::new(),
            detector: Arc::new(SignatureDetector),
            page_factory: Arc::new(RasterPageFactory),
        }
    }

    /// Replace the archive-detection strategy (before loading)
    pub fn with_detector(mut self, detector: Arc<dyn ArchiveDetector>) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the page-construction collaborator (before loading)
    pub fn with_page_factory(mut self, page_factory: Arc<dyn PageFactory>) -> Self {
        self.page_factory = page_factory;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn unarchive_state(&self) -> UnarchiveState {
        self.unarchive_state
    }

    /// Fraction of the payload acquired so far, in `[0, 1]`, non-decreasing
    pub fn loading_percentage(&self) -> f64 {
        self.loading_percentage
    }

    /// Fraction of the archive extracted so far, in `[0, 1]`, non-decreasing
    pub fn unarchiving_percentage(&self) -> f64 {
        self.unarchiving_percentage
    }

    /// Total payload size, once known
    pub fn expected_size(&self) -> Option<u64> {
        self.expected_size
    }

    /// Page count: the sorted survivor count once extraction has completed,
    /// the extractor's best-effort declaration before that
    pub fn page_count(&self) -> usize {
        if self.unarchive_state == UnarchiveState::Unarchived {
            self.ready_pages.len()
        } else {
            self.declared_page_count
        }
    }

    /// Number of pages that are fully constructed and sorted
    pub fn ready_page_count(&self) -> usize {
        self.ready_pages.len()
    }

    /// The page at sorted position `index`, if extraction has produced it
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.ready_pages.get(index).map(|p| p.as_ref())
    }

    /// All ready pages, in final sorted order
    pub fn pages(&self) -> &[Arc<Page>] {
        &self.ready_pages
    }

    /// Register an event callback; events arrive synchronously with `&Book`
    pub fn subscribe(
        &self,
        callback: impl Fn(&Book, &BookEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(callback)
    }

    /// Remove a subscription. No-op for unknown handles.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id)
    }

    // ---- crate-internal state machinery -------------------------------

    pub(crate) fn emit(&self, event: BookEvent) {
        self.bus.notify(self, &event);
    }

    pub(crate) fn emit_progress(&self) {
        self.emit(BookEvent::Progress {
            loading: self.loading_percentage,
            unarchiving: self.unarchiving_percentage,
        });
    }

    pub(crate) fn ensure_not_loaded(&self, op: &'static str) -> Result<(), BookError> {
        if self.load_state != LoadState::NotLoaded {
            return Err(BookError::InvalidState {
                op,
                reason: format!("load state is {:?}", self.load_state),
            });
        }
        Ok(())
    }

    pub(crate) fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
    }

    pub(crate) fn set_unarchive_state(&mut self, state: UnarchiveState) {
        self.unarchive_state = state;
    }

    pub(crate) fn set_expected_size(&mut self, size: Option<u64>) {
        self.expected_size = size;
    }

    pub(crate) fn detector(&self) -> &dyn ArchiveDetector {
        self.detector.as_ref()
    }

    pub(crate) fn page_factory(&self) -> Arc<dyn PageFactory> {
        self.page_factory.clone()
    }

    /// Raise the loading percentage; false when the clamped value is no higher
    pub(crate) fn bump_loading(&mut self, fraction: f64) -> bool {
        bump(&mut self.loading_percentage, fraction)
    }

    /// Raise the unarchiving percentage; false when the clamped value is no higher
    pub(crate) fn bump_unarchiving(&mut self, fraction: f64) -> bool {
        bump(&mut self.unarchiving_percentage, fraction)
    }

    /// Pull counters out of the adapter and emit a progress event on change.
    ///
    /// The percentage denominator is the expected payload size; until that is
    /// known, the bytes received so far stand in for it.
    pub(crate) fn sync_unarchive_progress(&mut self, received: u64) {
        let (entries, read) = match self.adapter.as_ref() {
            Some(adapter) => (adapter.total_entries(), adapter.compressed_bytes_read()),
            None => return,
        };

        if entries > self.declared_page_count {
            self.declared_page_count = entries;
        }

        let denominator = self
            .expected_size
            .filter(|size| *size > 0)
            .unwrap_or_else(|| received.max(1));
        if self.bump_unarchiving(read as f64 / denominator as f64) {
            self.emit_progress();
        }
    }

    /// Wholesale replacement of the page list at the join step
    pub(crate) fn publish_pages(&mut self, pages: Vec<Arc<Page>>) {
        self.ready_pages = pages;
    }

    /// Record a failed load attempt in the state machine
    pub(crate) fn fail(&mut self, error: &BookError) {
        self.load_state = LoadState::Error;
        if matches!(error, BookError::Unarchive(_)) {
            self.unarchive_state = UnarchiveState::Error;
        }
        // Dropping the adapter releases the extractor's buffer and detaches
        // any in-flight page tasks
        self.adapter = None;
    }
}

fn bump(current: &mut f64, candidate: f64) -> bool {
    let clamped = candidate.clamp(0.0, 1.0);
    if clamped > *current {
        *current = clamped;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_book_starts_cold() {
        let book = Book::new("test");
        assert_eq!(book.load_state(), LoadState::NotLoaded);
        assert_eq!(book.unarchive_state(), UnarchiveState::NotUnarchived);
        assert_eq!(book.loading_percentage(), 0.0);
        assert_eq!(book.page_count(), 0);
        assert!(book.page(0).is_none());
        assert!(book.origin().is_none());
    }

    #[test]
    fn bump_is_monotonic_and_clamped() {
        let mut value = 0.0;
        assert!(bump(&mut value, 0.5));
        assert!(!bump(&mut value, 0.25));
        assert!(bump(&mut value, 7.0));
        assert_eq!(value, 1.0);
        assert!(!bump(&mut value, f64::NAN));
        assert_eq!(value, 1.0);
    }

    #[test]
    fn origin_is_kept() {
        let book = Book::with_origin("b", "https://example.com/b.cbz");
        assert_eq!(book.origin(), Some("https://example.com/b.cbz"));
    }
}
