//! Stateless greeting handlers covering the four gRPC call shapes.
//!
//! These are executable documentation for the dispatcher's streaming
//! contracts: no persistence, per-call state only, and every loop
//! observes cancellation. The response text is deliberately trivial so
//! the tests can assert the framing and ordering rules exactly.

use crate::server::config::ServerConfig;
use crate::server::streaming::context::CallContext;
use crate::server::streaming::dispatch::{ResponseStream, fold_inbound, relay, serve_stream};
use core::time::Duration;
use queued_tonic_core::Error;
use queued_tonic_core::proto::{
    GreetEveryoneRequest, GreetEveryoneResponse, GreetManyTimesRequest, GreetManyTimesResponse,
    GreetRequest, GreetResponse, GreetWithDeadlineRequest, GreetWithDeadlineResponse, Greeting,
    LongGreetRequest, LongGreetResponse, greet_service_server::GreetService,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};

/// Number of responses `GreetManyTimes` sends.
const GREET_ROUNDS: u32 = 10;

/// Number of work slices `GreetWithDeadline` performs before answering.
const DEADLINE_SLICES: u32 = 3;

#[derive(Debug, Clone)]
pub struct GreetConfig {
    pub stream_buffer: usize,
    /// Pacing delay between consecutive `GreetManyTimes` sends. Makes
    /// backpressure and cancellation timing observable; tests collapse
    /// it to zero.
    pub send_interval: Duration,
    /// Length of one `GreetWithDeadline` work slice.
    pub slice_interval: Duration,
}

pub struct GreetHandler {
    config: GreetConfig,
    shutdown: CancellationToken,
}

impl GreetHandler {
    pub fn new(config: &ServerConfig, shutdown: CancellationToken) -> Self {
        Self {
            config: GreetConfig {
                stream_buffer: config.stream_buffer_size,
                send_interval: config.greet_send_interval,
                slice_interval: config.deadline_slice,
            },
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

fn first_name(greeting: Option<Greeting>) -> String {
    greeting.map(|g| g.first_name).unwrap_or_default()
}

fn hello(name: &str) -> String {
    format!("Hello {name}")
}

fn hello_numbered(name: &str, index: u32) -> String {
    format!("Hello {name} number {index}")
}

fn hello_excited(name: &str) -> String {
    format!("Hello {name}! ")
}

#[tonic::async_trait]
impl GreetService for GreetHandler {
    /// Unary: one request, one response.
    async fn greet(&self, req: Request<GreetRequest>) -> Result<Response<GreetResponse>, Status> {
        self.ensure_accepting()?;
        let name = first_name(req.into_inner().greeting);
        tracing::debug!(%name, "Greet request");
        Ok(Response::new(GreetResponse {
            result: hello(&name),
        }))
    }

    type GreetManyTimesStream = ResponseStream<GreetManyTimesResponse>;

    /// Server streaming: a bounded, ordered series with a pacing delay
    /// between sends. The sink checks for peer cancellation before each
    /// send, so a cancelled call stops within one send interval.
    async fn greet_many_times(
        &self,
        req: Request<GreetManyTimesRequest>,
    ) -> Result<Response<Self::GreetManyTimesStream>, Status> {
        self.ensure_accepting()?;
        let ctx = Arc::new(CallContext::from_request(&req));
        let name = first_name(req.into_inner().greeting);
        tracing::debug!(%name, "GreetManyTimes request");
        let interval = self.config.send_interval;

        let stream = serve_stream(self.config.stream_buffer, ctx, move |sink| async move {
            for i in 0..GREET_ROUNDS {
                sink.send(GreetManyTimesResponse {
                    result: hello_numbered(&name, i),
                })
                .await?;
                // No pacing after the final send; the call closes as
                // soon as the last response is delivered.
                if i + 1 < GREET_ROUNDS {
                    tokio::time::sleep(interval).await;
                }
            }
            Ok(())
        });

        Ok(Response::new(stream))
    }

    /// Client streaming: accumulate until end-of-input, then answer
    /// exactly once. A receive error aborts the call with its status.
    async fn long_greet(
        &self,
        req: Request<Streaming<LongGreetRequest>>,
    ) -> Result<Response<LongGreetResponse>, Status> {
        self.ensure_accepting()?;
        tracing::debug!("LongGreet request");
        let result = fold_inbound(req.into_inner(), String::new(), long_greet_fold).await?;
        Ok(Response::new(LongGreetResponse { result }))
    }

    type GreetEveryoneStream = ResponseStream<GreetEveryoneResponse>;

    /// Bidirectional: one response per request, in arrival order; the
    /// call closes on end-of-input with no final message.
    async fn greet_everyone(
        &self,
        req: Request<Streaming<GreetEveryoneRequest>>,
    ) -> Result<Response<Self::GreetEveryoneStream>, Status> {
        self.ensure_accepting()?;
        tracing::debug!("GreetEveryone request");
        let stream = relay(
            self.config.stream_buffer,
            req.into_inner(),
            greet_everyone_reply,
        );
        Ok(Response::new(stream))
    }

    /// Deadline-aware unary: performs work in fixed slices, polling the
    /// call context between them. Cancellation is cooperative, not
    /// preemptive; an expired deadline aborts the work with a
    /// `DeadlineExceeded`/`Cancelled` status.
    async fn greet_with_deadline(
        &self,
        req: Request<GreetWithDeadlineRequest>,
    ) -> Result<Response<GreetWithDeadlineResponse>, Status> {
        self.ensure_accepting()?;
        let ctx = CallContext::from_request(&req);
        let name = first_name(req.into_inner().greeting);
        tracing::debug!(%name, "GreetWithDeadline request");

        for _ in 0..DEADLINE_SLICES {
            if ctx.is_cancelled() {
                tracing::debug!("Call cancelled before work completed");
                return Err(ctx.cancel_error().into());
            }
            tokio::time::sleep(self.config.slice_interval).await;
        }

        Ok(Response::new(GreetWithDeadlineResponse {
            result: hello(&name),
        }))
    }
}

fn long_greet_fold(mut acc: String, req: LongGreetRequest) -> String {
    acc.push_str(&hello_excited(&first_name(req.greeting)));
    acc
}

fn greet_everyone_reply(req: GreetEveryoneRequest) -> GreetEveryoneResponse {
    GreetEveryoneResponse {
        result: hello_excited(&first_name(req.greeting)),
    }
}
