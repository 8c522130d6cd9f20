//! The `DocumentStore` trait and live subscription handle.

use async_trait::async_trait;
use huddle_common::StoreError;
use tokio::sync::mpsc;

use crate::batch::{FieldUpdate, WriteBatch};
use crate::document::{Document, Fields};
use crate::path::DocPath;
use crate::query::Query;

/// A live subscription.
///
/// The first value received is the snapshot at subscribe time; every later
/// value is a full replacement snapshot taken after a change. Dropping the
/// handle unsubscribes.
#[derive(Debug)]
pub struct Watch<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Watch<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx }
    }

    /// Wait for the next snapshot. Returns `None` once the store has closed
    /// the feed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take a snapshot if one is already queued.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

/// Client interface to a managed document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply a batch atomically. Returns the commit timestamp used for any
    /// `ServerTimestamp` fields.
    async fn commit(&self, batch: WriteBatch) -> Result<i64, StoreError>;

    async fn watch_document(&self, path: &DocPath)
        -> Result<Watch<Option<Document>>, StoreError>;

    async fn watch_query(&self, query: &Query) -> Result<Watch<Vec<Document>>, StoreError>;

    async fn set(&self, path: &DocPath, data: Fields) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().set(path.clone(), data))
            .await
            .map(|_| ())
    }

    async fn update(
        &self,
        path: &DocPath,
        fields: Vec<(String, FieldUpdate)>,
    ) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().update(path.clone(), fields))
            .await
            .map(|_| ())
    }

    async fn increment(&self, path: &DocPath, field: &str, by: i64) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().increment(path.clone(), field, by))
            .await
            .map(|_| ())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.commit(WriteBatch::new().delete(path.clone()))
            .await
            .map(|_| ())
    }

    /// Create a document with a generated id in `collection`, stamping the
    /// given fields with the commit time.
    async fn add(
        &self,
        collection: &str,
        data: Fields,
        stamped: &[&str],
    ) -> Result<DocPath, StoreError> {
        let path = DocPath::new(collection, huddle_common::new_id());
        self.commit(WriteBatch::new().create_stamped(path.clone(), data, stamped))
            .await?;
        Ok(path)
    }
}
