//! In-process store adapter.
//!
//! Implements the same contract as [`MongoStore`](super::mongo::MongoStore)
//! over a hash map, so the server can run with `--in-memory` and the
//! manager tests need no database. Records vanish when the process
//! exits.

use super::{QueueDocument, QueueStore};
use futures::StreamExt;
use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;
use queued_tonic_core::{Error, Result};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<ObjectId, QueueDocument>>,
}

#[tonic::async_trait]
impl QueueStore for MemoryStore {
    async fn insert(&self, mut doc: QueueDocument) -> Result<ObjectId> {
        let oid = ObjectId::new();
        doc.id = Some(oid);
        self.records.write().await.insert(oid, doc);
        Ok(oid)
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<QueueDocument> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound { id: id.to_hex() })
    }

    async fn replace(&self, id: ObjectId, doc: QueueDocument) -> Result<()> {
        let mut records = self.records.write().await;
        if !records.contains_key(&id) {
            return Err(Error::NotFound { id: id.to_hex() });
        }
        records.insert(id, doc);
        Ok(())
    }

    async fn delete_by_id(&self, id: ObjectId) -> Result<u64> {
        Ok(u64::from(self.records.write().await.remove(&id).is_some()))
    }

    async fn scan_all(&self) -> Result<BoxStream<'static, Result<QueueDocument>>> {
        // Snapshot under the read lock; the scan itself never blocks
        // writers.
        let docs: Vec<_> = self.records.read().await.values().cloned().collect();
        Ok(futures::stream::iter(docs.into_iter().map(Ok)).boxed())
    }

    async fn close(&self) {}
}
