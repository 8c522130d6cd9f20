//! In-process document store.
//!
//! Implements the full [`DocumentStore`] contract against a table held in
//! memory. Besides serving the demo binary it carries hooks that let tests
//! hold commits in flight and simulate an unavailable backend.

mod state;


use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use huddle_common::StoreError;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::batch::WriteBatch;
use crate::document::Document;
use crate::path::DocPath;
use crate::query::Query;
use crate::store::{DocumentStore, Watch};

use self::state::State;

struct Inner {
    state: Mutex<State>,
    /// `true` while commits are held back.
    hold: watch::Sender<bool>,
    available: AtomicBool,
    fail_next: AtomicUsize,
    commits: AtomicUsize,
}

/// Shared handle to an in-memory store. Clones share the same table.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                hold,
                available: AtomicBool::new(true),
                fail_next: AtomicUsize::new(0),
                commits: AtomicUsize::new(0),
            }),
        }
    }

    /// Hold every commit until the returned guard is released or dropped.
    /// Commits issued meanwhile stay in flight.
    pub fn hold_commits(&self) -> CommitHold {
        self.inner.hold.send_replace(true);
        CommitHold {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Make the next `n` operations fail with `StoreError::Unavailable`.
    pub fn fail_next(&self, n: usize) {
        self.inner.fail_next.store(n, Ordering::SeqCst);
    }

    /// Toggle backend availability. While unavailable every operation fails.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Number of successfully applied batches.
    pub fn commit_count(&self) -> usize {
        self.inner.commits.load(Ordering::SeqCst)
    }

    /// Number of documents currently in `collection`.
    pub fn document_count(&self, collection: &str) -> usize {
        self.state().count(collection)
    }

    /// Number of live subscriptions.
    pub fn watcher_count(&self) -> usize {
        self.state().watcher_count()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self, op: &str) -> Result<(), StoreError> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!("{op}: store offline")));
        }
        let injected = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable(format!("{op}: injected failure")));
        }
        Ok(())
    }

    async fn wait_for_release(&self) {
        let mut hold = self.inner.hold.subscribe();
        // The sender lives as long as `inner`, so this only errors on teardown.
        let _ = hold.wait_for(|held| !*held).await;
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard returned by [`MemoryStore::hold_commits`].
pub struct CommitHold {
    inner: Arc<Inner>,
}

impl CommitHold {
    pub fn release(self) {}
}

impl Drop for CommitHold {
    fn drop(&mut self) {
        self.inner.hold.send_replace(false);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.check_available("get")?;
        Ok(self.state().get(path))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.check_available("query")?;
        Ok(self.state().query(query))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<i64, StoreError> {
        self.wait_for_release().await;
        self.check_available("commit")?;

        let writes = batch.len();
        let mut state = self.state();
        let (ts, touched) = state.apply(batch.into_writes())?;
        state.notify(&touched);
        drop(state);

        self.inner.commits.fetch_add(1, Ordering::SeqCst);
        debug!(writes, ts, "commit applied");
        Ok(ts)
    }

    async fn watch_document(
        &self,
        path: &DocPath,
    ) -> Result<Watch<Option<Document>>, StoreError> {
        self.check_available("watch_document")?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().watch_document(path.clone(), tx);
        Ok(Watch::new(rx))
    }

    async fn watch_query(&self, query: &Query) -> Result<Watch<Vec<Document>>, StoreError> {
        self.check_available("watch_query")?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.state().watch_query(query.clone(), tx);
        Ok(Watch::new(rx))
    }
}
