//! The store adapter boundary.
//!
//! Domain records cross into persistence as [`QueueDocument`]s keyed by a
//! BSON `ObjectId`. Identifier validation happens here, before any
//! storage I/O, so a malformed id is reported as `InvalidId` and never
//! conflated with a missing record.

pub mod memory;
pub mod mongo;

use futures::stream::BoxStream;
use mongodb::bson::oid::ObjectId;
use queued_tonic_core::{Error, Result, proto::Queue};
use serde::{Deserialize, Serialize};

/// The persisted shape of a queue record.
///
/// `id` is `None` until the store assigns one on insert; every document
/// read back from storage carries its id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub author_id: String,
    pub title: String,
    pub content: String,
}

impl QueueDocument {
    /// Builds the unpersisted document for a domain record, discarding
    /// any id the caller may have set.
    pub fn from_queue(queue: &Queue) -> Self {
        Self {
            id: None,
            author_id: queue.author_id.clone(),
            title: queue.title.clone(),
            content: queue.content.clone(),
        }
    }

    /// Converts back to the domain record, rendering the id to hex.
    pub fn into_queue(self) -> Queue {
        Queue {
            id: self.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            author_id: self.author_id,
            title: self.title,
            content: self.content,
        }
    }
}

/// Validates a caller-supplied identifier against the store's id format
/// (24 hex characters).
///
/// # Errors
///
/// `Error::InvalidId` naming the offending input. This is distinct from
/// `NotFound` so client input errors never masquerade as missing
/// records.
pub fn parse_queue_id(id: &str) -> Result<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| Error::InvalidId { id: id.to_string() })
}

/// Adapter contract over the backing document store.
///
/// Operations are atomic at single-record granularity; consistency
/// across records is delegated to the store. `scan_all` is restartable:
/// each call opens a fresh cursor.
#[tonic::async_trait]
pub trait QueueStore: Send + Sync {
    /// Persists a document and returns the id the store assigned.
    async fn insert(&self, doc: QueueDocument) -> Result<ObjectId>;

    /// Fetches one document. `Error::NotFound` when no record exists.
    async fn find_by_id(&self, id: ObjectId) -> Result<QueueDocument>;

    /// Replaces the document stored under `id`. `Error::NotFound` when
    /// no record matched.
    async fn replace(&self, id: ObjectId, doc: QueueDocument) -> Result<()>;

    /// Removes the document stored under `id`, returning how many
    /// records were removed. Zero is not an error at this layer.
    async fn delete_by_id(&self, id: ObjectId) -> Result<u64>;

    /// Opens a lazy, finite scan over every document. A decode or
    /// cursor failure surfaces as `Error::Storage` and ends the
    /// sequence; items already yielded stand.
    async fn scan_all(&self) -> Result<BoxStream<'static, Result<QueueDocument>>>;

    /// Releases the store connection. Called once, after the listener
    /// has drained.
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_ids_parse() {
        let oid = parse_queue_id("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(oid.to_hex(), "507f1f77bcf86cd799439011");
    }

    #[test]
    fn wrong_length_id_is_invalid_not_missing() {
        // The probe id from the CRUD smoke scenario: numeric but far too
        // short for the 24-hex format, so it must fail before storage.
        let err = parse_queue_id("8675309").unwrap_err();
        assert!(matches!(err, Error::InvalidId { ref id } if id == "8675309"));
    }

    #[test]
    fn non_hex_id_is_invalid() {
        let err = parse_queue_id("zzzzzzzzzzzzzzzzzzzzzzzz").unwrap_err();
        assert!(matches!(err, Error::InvalidId { .. }));
    }

    #[test]
    fn unpersisted_documents_serialize_without_an_id_field() {
        let doc = QueueDocument::from_queue(&Queue {
            id: "ignored".into(),
            author_id: "Shane".into(),
            title: "My First Queue".into(),
            content: "Content of the first queue".into(),
        });
        assert!(doc.id.is_none());

        let bson = mongodb::bson::to_document(&doc).unwrap();
        assert!(!bson.contains_key("_id"));
        assert_eq!(bson.get_str("author_id").unwrap(), "Shane");
    }

    #[test]
    fn round_trips_through_the_domain_record() {
        let oid = ObjectId::new();
        let doc = QueueDocument {
            id: Some(oid),
            author_id: "Shane".into(),
            title: "My First Queue".into(),
            content: "Content of the first queue".into(),
        };
        let queue = doc.into_queue();
        assert_eq!(queue.id, oid.to_hex());
        assert_eq!(queue.title, "My First Queue");
    }
}
