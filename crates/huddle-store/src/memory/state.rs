//! Document table, batch application and watcher fan-out.

use std::collections::{BTreeMap, BTreeSet};

use huddle_common::{now_millis, StoreError};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::batch::{FieldUpdate, Write};
use crate::document::{Document, Fields};
use crate::path::DocPath;
use crate::query::Query;

type Table = BTreeMap<String, BTreeMap<String, Fields>>;

struct DocWatcher {
    path: DocPath,
    tx: mpsc::UnboundedSender<Option<Document>>,
}

struct QueryWatcher {
    query: Query,
    tx: mpsc::UnboundedSender<Vec<Document>>,
}

#[derive(Default)]
pub(super) struct State {
    docs: Table,
    doc_watchers: Vec<DocWatcher>,
    query_watchers: Vec<QueryWatcher>,
    last_commit_ts: i64,
}

impl State {
    pub(super) fn get(&self, path: &DocPath) -> Option<Document> {
        snapshot_doc(&self.docs, path)
    }

    pub(super) fn query(&self, query: &Query) -> Vec<Document> {
        run_query(&self.docs, query)
    }

    pub(super) fn count(&self, collection: &str) -> usize {
        self.docs.get(collection).map_or(0, BTreeMap::len)
    }

    /// Register a document watcher and queue its initial snapshot.
    pub(super) fn watch_document(
        &mut self,
        path: DocPath,
        tx: mpsc::UnboundedSender<Option<Document>>,
    ) {
        let _ = tx.send(snapshot_doc(&self.docs, &path));
        self.doc_watchers.push(DocWatcher { path, tx });
    }

    /// Register a query watcher and queue its initial snapshot.
    pub(super) fn watch_query(&mut self, query: Query, tx: mpsc::UnboundedSender<Vec<Document>>) {
        let _ = tx.send(run_query(&self.docs, &query));
        self.query_watchers.push(QueryWatcher { query, tx });
    }

    /// Server timestamps are strictly increasing across commits.
    fn next_timestamp(&mut self) -> i64 {
        let ts = now_millis().max(self.last_commit_ts + 1);
        self.last_commit_ts = ts;
        ts
    }

    /// Apply a batch all-or-nothing. Returns the commit timestamp and the set
    /// of paths the batch touched.
    pub(super) fn apply(
        &mut self,
        writes: Vec<Write>,
    ) -> Result<(i64, BTreeSet<DocPath>), StoreError> {
        let ts = self.next_timestamp();
        let mut staged: BTreeMap<DocPath, Option<Fields>> = BTreeMap::new();

        for write in writes {
            let path = write.path().clone();
            let slot = staged.entry(path.clone()).or_insert_with(|| {
                self.docs
                    .get(path.collection())
                    .and_then(|c| c.get(path.id()))
                    .cloned()
            });

            match write {
                Write::Set { data, .. } => *slot = Some(data),
                Write::Create { data, .. } => {
                    if slot.is_some() {
                        return Err(StoreError::AlreadyExists(path.to_string()));
                    }
                    *slot = Some(data);
                }
                Write::Update { fields, .. } => {
                    let Some(doc) = slot.as_mut() else {
                        return Err(StoreError::NotFound(path.to_string()));
                    };
                    for (field, update) in fields {
                        apply_field(doc, &path, field, update, ts)?;
                    }
                }
                Write::Delete { must_exist, .. } => {
                    if must_exist && slot.is_none() {
                        return Err(StoreError::NotFound(path.to_string()));
                    }
                    *slot = None;
                }
            }
        }

        for (path, slot) in &staged {
            match slot {
                Some(data) => {
                    self.docs
                        .entry(path.collection().to_string())
                        .or_default()
                        .insert(path.id().to_string(), data.clone());
                }
                None => {
                    if let Some(collection) = self.docs.get_mut(path.collection()) {
                        collection.remove(path.id());
                        if collection.is_empty() {
                            self.docs.remove(path.collection());
                        }
                    }
                }
            }
        }

        Ok((ts, staged.into_keys().collect()))
    }

    /// Push fresh snapshots to every watcher affected by `touched`, dropping
    /// watchers whose receiver is gone.
    pub(super) fn notify(&mut self, touched: &BTreeSet<DocPath>) {
        let collections: BTreeSet<&str> = touched.iter().map(DocPath::collection).collect();
        let State {
            docs,
            doc_watchers,
            query_watchers,
            ..
        } = self;
        let docs: &Table = docs;

        doc_watchers.retain(|w| {
            if w.tx.is_closed() {
                return false;
            }
            if touched.contains(&w.path) {
                return w.tx.send(snapshot_doc(docs, &w.path)).is_ok();
            }
            true
        });

        query_watchers.retain(|w| {
            if w.tx.is_closed() {
                return false;
            }
            if collections.contains(w.query.collection()) {
                return w.tx.send(run_query(docs, &w.query)).is_ok();
            }
            true
        });
    }

    pub(super) fn watcher_count(&self) -> usize {
        self.doc_watchers.iter().filter(|w| !w.tx.is_closed()).count()
            + self
                .query_watchers
                .iter()
                .filter(|w| !w.tx.is_closed())
                .count()
    }
}

fn snapshot_doc(docs: &Table, path: &DocPath) -> Option<Document> {
    docs.get(path.collection())
        .and_then(|c| c.get(path.id()))
        .map(|data| Document::new(path.clone(), data.clone()))
}

fn run_query(docs: &Table, query: &Query) -> Vec<Document> {
    let mut result: Vec<Document> = docs
        .get(query.collection())
        .map(|collection| {
            collection
                .iter()
                .filter(|(_, data)| query.matches(data))
                .map(|(id, data)| {
                    Document::new(DocPath::new(query.collection(), id.as_str()), data.clone())
                })
                .collect()
        })
        .unwrap_or_default();
    query.sort(&mut result);
    result
}

fn apply_field(
    doc: &mut Fields,
    path: &DocPath,
    field: String,
    update: FieldUpdate,
    ts: i64,
) -> Result<(), StoreError> {
    match update {
        FieldUpdate::Set(value) => {
            doc.insert(field, value);
        }
        FieldUpdate::Increment(by) => {
            let current = match doc.get(&field) {
                None | Some(Value::Null) => 0,
                Some(v) => v.as_i64().ok_or_else(|| {
                    StoreError::Codec(format!("{path}.{field} is not an integer"))
                })?,
            };
            doc.insert(field, Value::from(current + by));
        }
        FieldUpdate::ServerTimestamp => {
            doc.insert(field, Value::from(ts));
        }
        FieldUpdate::Remove => {
            doc.remove(&field);
        }
    }
    Ok(())
}
