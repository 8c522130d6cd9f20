//! Document store seam for Huddle.
//!
//! The presence and room crates talk to storage only through the
//! [`DocumentStore`] trait: document CRUD, transactional write batches with
//! atomic increments, and live subscriptions that deliver full snapshots.
//! [`MemoryStore`] is the in-process implementation used by the binary and
//! by tests.

pub mod batch;
pub mod document;
pub mod memory;
pub mod path;
pub mod query;
pub mod store;

pub use batch::{FieldUpdate, Write, WriteBatch};
pub use document::{encode, Document, Fields};
pub use memory::{CommitHold, MemoryStore};
pub use path::DocPath;
pub use query::{Direction, Query};
pub use store::{DocumentStore, Watch};
