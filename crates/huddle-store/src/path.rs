//! Document addressing.

use std::fmt;

/// Address of a single document: a collection path plus a document id.
///
/// Sub-collections are addressed by nesting, e.g. the presence record of
/// session `s1` in room `R1` lives in collection `rooms/R1/presence`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocPath {
    collection: String,
    id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Collection path of a sub-collection nested under this document.
    pub fn sub_collection(&self, name: &str) -> String {
        format!("{}/{}/{}", self.collection, self.id, name)
    }

    /// Path of a document inside a sub-collection of this document.
    pub fn child(&self, sub: &str, id: impl Into<String>) -> DocPath {
        DocPath::new(self.sub_collection(sub), id)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}
