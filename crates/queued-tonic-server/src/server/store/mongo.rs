//! MongoDB-backed store adapter.

use super::{QueueDocument, QueueStore};
use crate::server::config::ServerConfig;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{Bson, doc, oid::ObjectId};
use mongodb::{Client, Collection};
use queued_tonic_core::{Error, Result};

/// Production adapter over a `mongodb` collection.
///
/// The driver's `Client` is cheap to clone and safe for concurrent use,
/// so one `MongoStore` is shared by every call task with no additional
/// locking.
pub struct MongoStore {
    client: Client,
    collection: Collection<QueueDocument>,
}

impl MongoStore {
    pub async fn connect(config: &ServerConfig) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(&config.mongo_uri).await?;
        let collection = client
            .database(&config.mongo_db)
            .collection(&config.mongo_collection);
        Ok(Self { client, collection })
    }
}

fn storage_err(err: mongodb::error::Error) -> Error {
    Error::Storage {
        context: err.to_string(),
    }
}

#[tonic::async_trait]
impl QueueStore for MongoStore {
    async fn insert(&self, doc: QueueDocument) -> Result<ObjectId> {
        let result = self.collection.insert_one(doc).await.map_err(storage_err)?;
        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(oid),
            other => Err(Error::Internal {
                context: format!("store returned a non-ObjectId identifier: {other}"),
            }),
        }
    }

    async fn find_by_id(&self, id: ObjectId) -> Result<QueueDocument> {
        self.collection
            .find_one(doc! { "_id": id })
            .await
            .map_err(storage_err)?
            .ok_or_else(|| Error::NotFound { id: id.to_hex() })
    }

    async fn replace(&self, id: ObjectId, doc: QueueDocument) -> Result<()> {
        let result = self
            .collection
            .replace_one(doc! { "_id": id }, doc)
            .await
            .map_err(storage_err)?;
        if result.matched_count == 0 {
            return Err(Error::NotFound { id: id.to_hex() });
        }
        Ok(())
    }

    async fn delete_by_id(&self, id: ObjectId) -> Result<u64> {
        let result = self
            .collection
            .delete_one(doc! { "_id": id })
            .await
            .map_err(storage_err)?;
        Ok(result.deleted_count)
    }

    async fn scan_all(&self) -> Result<BoxStream<'static, Result<QueueDocument>>> {
        let cursor = self
            .collection
            .find(doc! {})
            .await
            .map_err(storage_err)?;
        Ok(cursor.map_err(storage_err).boxed())
    }

    async fn close(&self) {
        // Clones share the driver's internal state, so shutting down this
        // handle terminates the connection for all of them.
        self.client.clone().shutdown().await;
    }
}
