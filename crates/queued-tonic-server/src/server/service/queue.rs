//! CRUD gRPC surface over queue records.
//!
//! Each method delegates to the [`QueueManager`] and converts its typed
//! failures into gRPC statuses. Failures are logged and returned, never
//! swallowed; a client probing a nonexistent id is expected traffic and
//! does not affect later calls.

use crate::server::config::ServerConfig;
use crate::server::manager::QueueManager;
use crate::server::store::QueueStore;
use crate::server::streaming::context::CallContext;
use crate::server::streaming::dispatch::{ResponseStream, serve_stream};
use futures::StreamExt;
use queued_tonic_core::Error;
use queued_tonic_core::proto::{
    CreateQueueRequest, CreateQueueResponse, DeleteQueueRequest, DeleteQueueResponse,
    ListQueueRequest, ListQueueResponse, Queue, ReadQueueRequest, ReadQueueResponse,
    UpdateQueueRequest, UpdateQueueResponse, queue_service_server::QueueService,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};

pub struct QueueHandler {
    manager: QueueManager,
    stream_buffer: usize,
    shutdown: CancellationToken,
}

impl QueueHandler {
    pub fn new(
        store: Arc<dyn QueueStore>,
        config: &ServerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            manager: QueueManager::new(store),
            stream_buffer: config.stream_buffer_size,
            shutdown,
        }
    }

    /// Rejects calls that arrive once the shutdown signal has fired;
    /// in-flight calls are unaffected and keep draining.
    fn ensure_accepting(&self) -> Result<(), Status> {
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown.into());
        }
        Ok(())
    }
}

fn required_queue(queue: Option<Queue>) -> Result<Queue, Status> {
    queue.ok_or_else(|| Status::invalid_argument("request is missing the queue record"))
}

#[tonic::async_trait]
impl QueueService for QueueHandler {
    async fn create_queue(
        &self,
        req: Request<CreateQueueRequest>,
    ) -> Result<Response<CreateQueueResponse>, Status> {
        self.ensure_accepting()?;
        let queue = required_queue(req.into_inner().queue)?;
        tracing::debug!(author_id = %queue.author_id, "Create queue request");

        let created = self.manager.create(&queue).await.map_err(|err| {
            tracing::warn!("Create failed: {err}");
            Status::from(err)
        })?;
        Ok(Response::new(CreateQueueResponse {
            queue: Some(created),
        }))
    }

    async fn read_queue(
        &self,
        req: Request<ReadQueueRequest>,
    ) -> Result<Response<ReadQueueResponse>, Status> {
        self.ensure_accepting()?;
        let queue_id = req.into_inner().queue_id;
        tracing::debug!(%queue_id, "Read queue request");

        let queue = self.manager.read(&queue_id).await.map_err(|err| {
            tracing::debug!("Read failed: {err}");
            Status::from(err)
        })?;
        Ok(Response::new(ReadQueueResponse { queue: Some(queue) }))
    }

    async fn update_queue(
        &self,
        req: Request<UpdateQueueRequest>,
    ) -> Result<Response<UpdateQueueResponse>, Status> {
        self.ensure_accepting()?;
        let queue = required_queue(req.into_inner().queue)?;
        tracing::debug!(queue_id = %queue.id, "Update queue request");

        let updated = self.manager.update(&queue).await.map_err(|err| {
            tracing::debug!("Update failed: {err}");
            Status::from(err)
        })?;
        Ok(Response::new(UpdateQueueResponse {
            queue: Some(updated),
        }))
    }

    async fn delete_queue(
        &self,
        req: Request<DeleteQueueRequest>,
    ) -> Result<Response<DeleteQueueResponse>, Status> {
        self.ensure_accepting()?;
        let queue_id = req.into_inner().queue_id;
        tracing::debug!(%queue_id, "Delete queue request");

        let queue_id = self.manager.delete(&queue_id).await.map_err(|err| {
            tracing::debug!("Delete failed: {err}");
            Status::from(err)
        })?;
        Ok(Response::new(DeleteQueueResponse { queue_id }))
    }

    type ListQueueStream = ResponseStream<ListQueueResponse>;

    async fn list_queue(
        &self,
        req: Request<ListQueueRequest>,
    ) -> Result<Response<Self::ListQueueStream>, Status> {
        self.ensure_accepting()?;
        tracing::debug!("List queue request");
        let ctx = Arc::new(CallContext::from_request(&req));
        let manager = self.manager.clone();

        let stream = serve_stream(self.stream_buffer, ctx, move |sink| async move {
            let mut scan = manager.list().await?;
            while let Some(queue) = scan.next().await {
                // A mid-scan failure ends the stream here; whatever was
                // already sent is not retracted.
                sink.send(ListQueueResponse {
                    queue: Some(queue?),
                })
                .await?;
            }
            Ok(())
        });

        Ok(Response::new(stream))
    }
}
