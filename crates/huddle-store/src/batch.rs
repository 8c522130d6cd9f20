//! Transactional write batches.
//!
//! A batch is applied all-or-nothing: if any precondition fails, none of
//! its writes take effect. Writes are applied in order, so a later write in
//! the same batch sees the result of an earlier one.

use serde_json::Value;

use crate::document::Fields;
use crate::path::DocPath;

/// A change to a single field inside an [`Write::Update`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    Set(Value),
    /// Atomic integer increment; a missing field counts as zero.
    Increment(i64),
    /// Replaced by the commit timestamp (epoch millis) assigned by the store.
    ServerTimestamp,
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create or overwrite.
    Set { path: DocPath, data: Fields },
    /// Create; fails with `AlreadyExists` if the document is present.
    Create { path: DocPath, data: Fields },
    /// Patch fields; fails with `NotFound` if the document is absent.
    Update {
        path: DocPath,
        fields: Vec<(String, FieldUpdate)>,
    },
    /// Delete; with `must_exist` an absent document fails with `NotFound`.
    Delete { path: DocPath, must_exist: bool },
}

impl Write {
    pub fn path(&self) -> &DocPath {
        match self {
            Write::Set { path, .. }
            | Write::Create { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, path: DocPath, data: Fields) -> Self {
        self.writes.push(Write::Set { path, data });
        self
    }

    pub fn create(mut self, path: DocPath, data: Fields) -> Self {
        self.writes.push(Write::Create { path, data });
        self
    }

    /// Create a document and stamp each of `fields` with the commit time.
    pub fn create_stamped(self, path: DocPath, data: Fields, fields: &[&str]) -> Self {
        let stamps = fields
            .iter()
            .map(|f| ((*f).to_string(), FieldUpdate::ServerTimestamp))
            .collect();
        self.create(path.clone(), data).update(path, stamps)
    }

    pub fn update(mut self, path: DocPath, fields: Vec<(String, FieldUpdate)>) -> Self {
        self.writes.push(Write::Update { path, fields });
        self
    }

    pub fn increment(self, path: DocPath, field: &str, by: i64) -> Self {
        self.update(path, vec![(field.to_string(), FieldUpdate::Increment(by))])
    }

    /// Delete if present.
    pub fn delete(mut self, path: DocPath) -> Self {
        self.writes.push(Write::Delete {
            path,
            must_exist: false,
        });
        self
    }

    /// Delete, failing the whole batch if the document is absent.
    pub fn delete_existing(mut self, path: DocPath) -> Self {
        self.writes.push(Write::Delete {
            path,
            must_exist: true,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[Write] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<Write> {
        self.writes
    }
}
