//! Page assembly: the join step.
//!
//! Entries leave the extractor in archive order, which is arbitrary, and each
//! one immediately becomes an in-flight construction task. Nothing can be
//! reported until every task has settled, because the externally visible
//! ordering is by filename and the full set is unknown until then. The join
//! awaits all tasks, keeps survivors, records failures without propagating
//! them, and stable-sorts by case-insensitive filename so that entries with
//! equal names keep their extraction-encounter order.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::page::{Page, PageError, PageFactory};

struct PendingPage {
    file_name: String,
    handle: JoinHandle<Result<Page, PageError>>,
}

/// Unordered set of in-flight page-construction tasks
pub(crate) struct PageAssembly {
    pending: Vec<PendingPage>,
}

/// What the join produced: sorted survivors plus the names that were dropped
pub(crate) struct AssemblyOutcome {
    pub pages: Vec<Arc<Page>>,
    pub dropped: Vec<String>,
}

impl PageAssembly {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Launch one construction task; its outcome is deferred to [`join`]
    pub fn spawn(&mut self, factory: Arc<dyn PageFactory>, file_name: String, data: Vec<u8>) {
        let task_name = file_name.clone();
        let handle = tokio::spawn(async move { factory.build(task_name, data).await });
        self.pending.push(PendingPage { file_name, handle });
    }

    /// Await every pending task, then sort the survivors.
    ///
    /// A failing or panicking task only removes its own entry; the join always
    /// runs to the end of the set.
    pub async fn join(self) -> AssemblyOutcome {
        let mut survivors = Vec::with_capacity(self.pending.len());
        let mut dropped = Vec::new();

        for pending in self.pending {
            match pending.handle.await {
                Ok(Ok(page)) => survivors.push(page),
                Ok(Err(e)) => {
                    warn!("dropping entry {}: {}", pending.file_name, e);
                    dropped.push(pending.file_name);
                }
                Err(e) => {
                    warn!("page task for {} did not complete: {}", pending.file_name, e);
                    dropped.push(pending.file_name);
                }
            }
        }

        survivors.sort_by_key(|page| page.file_name.to_lowercase());

        AssemblyOutcome {
            pages: survivors.into_iter().map(Arc::new).collect(),
            dropped,
        }
    }
}
