//! Load coordination.
//!
//! One load operation per book. The streaming path creates the extraction
//! adapter as soon as the first chunk arrives (the leading bytes are enough to
//! classify the archive) and forwards every chunk to it; the local-buffer path
//! hands the whole payload over at once. Both funnel into the same completion
//! sequence: verify the extractor saw the end of the archive, join the page
//! tasks, publish the sorted pages, and announce completion.

use tracing::debug;

use crate::archive::UnarchiveError;
use crate::io::ByteSource;

use super::unarchive::ExtractionAdapter;
use super::{Book, BookError, BookEvent, LoadState, UnarchiveState};

/// Cumulative byte count against the expected total
struct LoadProgress {
    expected: Option<u64>,
    received: u64,
}

impl LoadProgress {
    fn new(expected: Option<u64>) -> Self {
        Self {
            expected,
            received: 0,
        }
    }

    fn add(&mut self, len: usize) {
        self.received += len as u64;
    }

    /// Fraction loaded; zero while the total is still unknown
    fn fraction(&self) -> f64 {
        match self.expected {
            Some(total) if total > 0 => self.received as f64 / total as f64,
            _ => 0.0,
        }
    }
}

impl Book {
    /// Load the book by streaming chunks from `source`.
    ///
    /// Requires a book constructed with an origin and not yet loaded. The
    /// expected payload size is taken from `expected_size_hint` when given,
    /// otherwise discovered from the source's own metadata.
    pub async fn load_from_byte_source<S: ByteSource>(
        &mut self,
        mut source: S,
        expected_size_hint: Option<u64>,
    ) -> Result<(), BookError> {
        self.ensure_not_loaded("load_from_byte_source")?;
        if self.origin().is_none() {
            return Err(BookError::InvalidState {
                op: "load_from_byte_source",
                reason: "book has no origin; use load_from_local_buffer".to_string(),
            });
        }

        self.set_load_state(LoadState::Loading);
        match self.run_stream(&mut source, expected_size_hint).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Load the book from an already complete in-memory buffer.
    ///
    /// Requires a book constructed without an origin and not yet loaded.
    pub async fn load_from_local_buffer(&mut self, buffer: Vec<u8>) -> Result<(), BookError> {
        self.ensure_not_loaded("load_from_local_buffer")?;
        if self.origin().is_some() {
            return Err(BookError::InvalidState {
                op: "load_from_local_buffer",
                reason: "book has an origin; use load_from_byte_source".to_string(),
            });
        }

        self.set_load_state(LoadState::Loading);
        self.set_expected_size(Some(buffer.len() as u64));
        match self.run_buffer(&buffer).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_stream<S: ByteSource>(
        &mut self,
        source: &mut S,
        expected_size_hint: Option<u64>,
    ) -> Result<(), BookError> {
        let mut progress = LoadProgress::new(expected_size_hint.or_else(|| source.total_size()));
        self.set_expected_size(progress.expected);

        while let Some(chunk) = source.next_chunk().await? {
            if progress.expected.is_none() {
                progress.expected = source.total_size();
                self.set_expected_size(progress.expected);
            }
            progress.add(chunk.len());
            if self.bump_loading(progress.fraction()) {
                self.emit_progress();
            }
            self.ingest(&chunk, progress.received)?;
        }

        debug!(
            "load finished after {} bytes for {}",
            progress.received,
            self.name()
        );
        if self.bump_loading(1.0) {
            self.emit_progress();
        }
        self.set_load_state(LoadState::Loaded);
        self.complete().await
    }

    async fn run_buffer(&mut self, buffer: &[u8]) -> Result<(), BookError> {
        if self.bump_loading(1.0) {
            self.emit_progress();
        }
        self.set_load_state(LoadState::Loaded);
        self.ingest(buffer, buffer.len() as u64)?;
        self.complete().await
    }

    /// Feed bytes to the extraction adapter, creating it on the first call
    fn ingest(&mut self, bytes: &[u8], received: u64) -> Result<(), BookError> {
        if self.adapter.is_none() {
            let adapter = ExtractionAdapter::open(
                self.detector(),
                self.page_factory(),
                bytes,
            )?;
            self.adapter = Some(adapter);
            self.set_unarchive_state(UnarchiveState::ReadyForUnarchiving);
            self.emit(BookEvent::ReadyToExtract);
            self.set_unarchive_state(UnarchiveState::Unarchiving);
        }

        if let Some(adapter) = self.adapter.as_mut() {
            adapter.push(bytes)?;
        }
        self.sync_unarchive_progress(received);
        Ok(())
    }

    /// The join step: settle every page task, publish the sorted pages, and
    /// close out the load attempt
    async fn complete(&mut self) -> Result<(), BookError> {
        let Some(adapter) = self.adapter.take() else {
            // The source produced no bytes at all; classify the empty payload
            return match self.detector().create(&[]) {
                Ok(_) => Err(UnarchiveError::Truncated.into()),
                Err(e) => Err(e.into()),
            };
        };

        if !adapter.finished() {
            return Err(UnarchiveError::Truncated.into());
        }

        if self.bump_unarchiving(1.0) {
            self.emit_progress();
        }

        let outcome = adapter.finish().await;
        let dropped = outcome.dropped.len();

        self.publish_pages(outcome.pages);
        self.set_unarchive_state(UnarchiveState::Unarchived);

        for (index, page) in self.pages().iter().enumerate() {
            self.emit(BookEvent::PageReady {
                page: page.clone(),
                sequence: index + 1,
            });
        }
        if dropped > 0 {
            tracing::warn!("{dropped} entries failed page construction and were dropped");
            self.emit(BookEvent::PagesDropped { count: dropped });
        }
        self.emit(BookEvent::ExtractionComplete {
            page_count: self.ready_page_count(),
        });

        Ok(())
    }
}
