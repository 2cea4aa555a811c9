//! The resource lifecycle: create/read/update/delete/list over the store
//! adapter.
//!
//! Only `read` and `list` are idempotent. Deleting an id twice is
//! observably success-then-`NotFound`, and `update` confirms existence
//! with a read before it persists anything.

use crate::server::store::{QueueDocument, QueueStore, parse_queue_id};
use futures::StreamExt;
use futures::stream::BoxStream;
use queued_tonic_core::{Error, Result, proto::Queue};
use std::sync::Arc;

/// Sequences CRUD operations against the store adapter and owns the
/// domain's error semantics. Shared read-only by every call task.
#[derive(Clone)]
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
}

impl QueueManager {
    pub fn new(store: Arc<dyn QueueStore>) -> Self {
        Self { store }
    }

    /// Persists a new queue and returns it with its assigned id.
    ///
    /// Any id on the input is ignored; the store owns id generation.
    pub async fn create(&self, queue: &Queue) -> Result<Queue> {
        let mut doc = QueueDocument::from_queue(queue);
        let oid = self.store.insert(doc.clone()).await?;
        doc.id = Some(oid);
        Ok(doc.into_queue())
    }

    /// Fetches the queue stored under `id`.
    ///
    /// # Errors
    ///
    /// `InvalidId` when the id is malformed (before any storage I/O),
    /// `NotFound` when no record exists.
    pub async fn read(&self, id: &str) -> Result<Queue> {
        let oid = parse_queue_id(id)?;
        let doc = self.store.find_by_id(oid).await?;
        Ok(doc.into_queue())
    }

    /// Replaces every mutable field of an existing queue.
    ///
    /// Existence is confirmed with a read first, surfacing `InvalidId`
    /// and `NotFound` exactly as [`read`](Self::read) does, so a failed
    /// update never mutates storage.
    pub async fn update(&self, queue: &Queue) -> Result<Queue> {
        let oid = parse_queue_id(&queue.id)?;
        self.store.find_by_id(oid).await?;

        let doc = QueueDocument {
            id: Some(oid),
            author_id: queue.author_id.clone(),
            title: queue.title.clone(),
            content: queue.content.clone(),
        };
        self.store.replace(oid, doc.clone()).await?;
        Ok(doc.into_queue())
    }

    /// Removes the queue stored under `id`, echoing the id back.
    ///
    /// # Errors
    ///
    /// `InvalidId` on a malformed id, `Storage` on an adapter failure,
    /// `NotFound` when zero records were removed.
    pub async fn delete(&self, id: &str) -> Result<String> {
        let oid = parse_queue_id(id)?;
        let removed = self.store.delete_by_id(oid).await?;
        if removed == 0 {
            return Err(Error::NotFound { id: id.to_string() });
        }
        Ok(id.to_string())
    }

    /// Opens a lazy scan over every queue, yielded as they are read.
    ///
    /// The returned sequence is finite and non-restartable; a mid-scan
    /// failure ends it with `Storage`, and items already yielded stand.
    pub async fn list(&self) -> Result<BoxStream<'static, Result<Queue>>> {
        let scan = self.store.scan_all().await?;
        Ok(scan.map(|doc| doc.map(QueueDocument::into_queue)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::store::memory::MemoryStore;
    use mongodb::bson::oid::ObjectId;
    use std::collections::HashSet;

    fn manager() -> QueueManager {
        QueueManager::new(Arc::new(MemoryStore::default()))
    }

    /// Store double whose scan yields a fixed prefix of documents and
    /// then fails, for exercising mid-scan error semantics.
    struct FailingScanStore {
        docs: Vec<QueueDocument>,
    }

    #[tonic::async_trait]
    impl QueueStore for FailingScanStore {
        async fn insert(&self, _doc: QueueDocument) -> Result<ObjectId> {
            unimplemented!("not used by scan tests")
        }

        async fn find_by_id(&self, _id: ObjectId) -> Result<QueueDocument> {
            unimplemented!("not used by scan tests")
        }

        async fn replace(&self, _id: ObjectId, _doc: QueueDocument) -> Result<()> {
            unimplemented!("not used by scan tests")
        }

        async fn delete_by_id(&self, _id: ObjectId) -> Result<u64> {
            unimplemented!("not used by scan tests")
        }

        async fn scan_all(&self) -> Result<BoxStream<'static, Result<QueueDocument>>> {
            let items: Vec<Result<QueueDocument>> = self
                .docs
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(Error::Storage {
                    context: "cursor decode failed".into(),
                })))
                .collect();
            Ok(futures::stream::iter(items).boxed())
        }

        async fn close(&self) {}
    }

    fn sample_queue() -> Queue {
        Queue {
            id: String::new(),
            author_id: "Shane".into(),
            title: "My First Queue".into(),
            content: "Content of the first queue".into(),
        }
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let manager = manager();
        let created = manager.create(&sample_queue()).await.unwrap();
        assert!(!created.id.is_empty());

        let read = manager.read(&created.id).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn read_with_malformed_id_is_invalid_argument() {
        // "8675309" is numeric but not 24 hex chars, so the adapter
        // rejects it before storage is consulted: InvalidId, not
        // NotFound.
        let err = manager().read("8675309").await.unwrap_err();
        assert!(matches!(err, Error::InvalidId { ref id } if id == "8675309"));
    }

    #[tokio::test]
    async fn read_with_absent_id_is_not_found() {
        let err = manager()
            .read("507f1f77bcf86cd799439011")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_replaces_all_mutable_fields() {
        let manager = manager();
        let created = manager.create(&sample_queue()).await.unwrap();

        let updated = manager
            .update(&Queue {
                id: created.id.clone(),
                author_id: "Sam".into(),
                title: "Renamed".into(),
                content: "New content".into(),
            })
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.author_id, "Sam");

        let read = manager.read(&created.id).await.unwrap();
        assert_eq!(read, updated);
    }

    #[tokio::test]
    async fn update_of_nonexistent_id_is_not_found_and_mutates_nothing() {
        let manager = manager();
        let mut queue = sample_queue();
        queue.id = "507f1f77bcf86cd799439011".into();

        let err = manager.update(&queue).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        // Nothing was written on the failed path.
        let mut scan = manager.list().await.unwrap();
        assert!(scan.next().await.is_none());
    }

    #[tokio::test]
    async fn delete_twice_is_success_then_not_found() {
        let manager = manager();
        let created = manager.create(&sample_queue()).await.unwrap();

        let echoed = manager.delete(&created.id).await.unwrap();
        assert_eq!(echoed, created.id);

        let err = manager.delete(&created.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { ref id } if *id == created.id));
    }

    #[tokio::test]
    async fn delete_with_malformed_id_is_invalid_argument() {
        let err = manager().delete("8675309").await.unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[tokio::test]
    async fn list_yields_every_record_exactly_once() {
        let manager = manager();
        let mut expected = HashSet::new();
        for i in 0..5 {
            let created = manager
                .create(&Queue {
                    id: String::new(),
                    author_id: format!("author-{i}"),
                    title: format!("title-{i}"),
                    content: format!("content-{i}"),
                })
                .await
                .unwrap();
            expected.insert(created.id);
        }

        let mut seen = HashSet::new();
        let mut scan = manager.list().await.unwrap();
        while let Some(queue) = scan.next().await {
            let queue = queue.unwrap();
            assert!(seen.insert(queue.id.clone()), "duplicate id {}", queue.id);
        }
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn list_keeps_yielded_items_when_the_scan_fails_midway() {
        let docs: Vec<QueueDocument> = (0..3)
            .map(|i| QueueDocument {
                id: Some(ObjectId::new()),
                author_id: format!("author-{i}"),
                title: format!("title-{i}"),
                content: format!("content-{i}"),
            })
            .collect();
        let manager = QueueManager::new(Arc::new(FailingScanStore { docs: docs.clone() }));

        // Everything read before the failure is yielded and stands.
        let mut scan = manager.list().await.unwrap();
        for expected in &docs {
            let queue = scan.next().await.unwrap().unwrap();
            assert_eq!(queue.id, expected.id.unwrap().to_hex());
            assert_eq!(queue.author_id, expected.author_id);
        }

        // The scan terminates with the storage error, not a panic or a
        // silent end.
        let err = scan.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Storage { .. }));
        assert!(scan.next().await.is_none());
    }

    #[tokio::test]
    async fn list_reflects_the_last_written_state() {
        let manager = manager();
        let created = manager.create(&sample_queue()).await.unwrap();
        manager
            .update(&Queue {
                id: created.id.clone(),
                author_id: "Sam".into(),
                title: "Renamed".into(),
                content: "New content".into(),
            })
            .await
            .unwrap();

        let mut scan = manager.list().await.unwrap();
        let only = scan.next().await.unwrap().unwrap();
        assert_eq!(only.author_id, "Sam");
        assert!(scan.next().await.is_none());
    }
}
