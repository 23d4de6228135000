//! Adapter between the archive extractor and the page pipeline.
//!
//! Owns the extractor (and therefore its backing buffer) from creation until
//! teardown, translates its signal batches into counter updates, and launches
//! one page-construction task per extracted entry. Entry outcomes are not
//! inspected here; the join step settles them all at once.

use std::sync::Arc;
use tracing::debug;

use crate::archive::{ArchiveDetector, ArchiveExtractor, ExtractSignal, UnarchiveError};

use super::page::PageFactory;
use super::pipeline::{AssemblyOutcome, PageAssembly};

pub(crate) struct ExtractionAdapter {
    extractor: Box<dyn ArchiveExtractor>,
    assembly: PageAssembly,
    page_factory: Arc<dyn PageFactory>,
    total_entries: usize,
    compressed_bytes_read: u64,
    finished: bool,
}

impl ExtractionAdapter {
    /// Classify the leading bytes and stand up an extractor for them.
    ///
    /// Fails with [`UnarchiveError::UnsupportedFormat`] when no known archive
    /// kind matches; the caller has not announced extraction yet at that point.
    pub fn open(
        detector: &dyn ArchiveDetector,
        page_factory: Arc<dyn PageFactory>,
        leading: &[u8],
    ) -> Result<Self, UnarchiveError> {
        let mut extractor = detector.create(leading)?;
        let signals = extractor.start()?;

        let mut adapter = Self {
            extractor,
            assembly: PageAssembly::new(),
            page_factory,
            total_entries: 0,
            compressed_bytes_read: 0,
            finished: false,
        };
        adapter.absorb(signals);
        Ok(adapter)
    }

    /// Forward freshly loaded bytes. Ignored once the extractor has finished.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), UnarchiveError> {
        if self.finished {
            return Ok(());
        }
        let signals = self.extractor.update(bytes)?;
        self.absorb(signals);
        Ok(())
    }

    fn absorb(&mut self, signals: Vec<ExtractSignal>) {
        for signal in signals {
            match signal {
                ExtractSignal::Progress {
                    total_entries,
                    compressed_bytes_read,
                } => {
                    self.total_entries = self.total_entries.max(total_entries);
                    self.compressed_bytes_read =
                        self.compressed_bytes_read.max(compressed_bytes_read);
                }
                ExtractSignal::Entry { file_name, data } => {
                    self.assembly
                        .spawn(self.page_factory.clone(), file_name, data);
                }
                ExtractSignal::Finished => self.finished = true,
                ExtractSignal::Info(message) => debug!("extractor: {message}"),
            }
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn total_entries(&self) -> usize {
        self.total_entries
    }

    pub fn compressed_bytes_read(&self) -> u64 {
        self.compressed_bytes_read
    }

    /// Run the join step, then tear the extractor down and release its buffer
    pub async fn finish(self) -> AssemblyOutcome {
        let Self {
            mut extractor,
            assembly,
            ..
        } = self;
        let outcome = assembly.join().await;
        extractor.stop();
        outcome
    }
}
