//! Generic call-shape machinery shared by every streaming handler.
//!
//! Each streaming call runs as one spawned task feeding a bounded
//! `mpsc` channel that tonic drains as the response stream. The channel
//! doubles as the cancellation signal: when the peer disconnects, tonic
//! drops the receiver and the producer observes a closed channel on its
//! next send.

use crate::server::streaming::context::CallContext;
use core::pin::Pin;
use futures::{Stream, StreamExt};
use queued_tonic_core::{Error, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;

/// Boxed response stream type used by every server-streaming method.
pub type ResponseStream<T> = Pin<Box<dyn Stream<Item = core::result::Result<T, Status>> + Send>>;

/// Producer-side handle to a server-streaming response channel.
///
/// Every send observes the call context and the channel state first, so a
/// producer loop that only ever calls [`StreamSink::send`] still honors
/// cancellation at each iteration boundary.
pub struct StreamSink<T> {
    tx: mpsc::Sender<core::result::Result<T, Status>>,
    ctx: Arc<CallContext>,
}

impl<T> Clone for StreamSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            ctx: Arc::clone(&self.ctx),
        }
    }
}

impl<T> StreamSink<T> {
    /// Sends one response to the peer.
    ///
    /// # Errors
    ///
    /// Returns the context's cancellation error when the deadline passed
    /// or the peer went away; no further sends will succeed after that.
    pub async fn send(&self, item: T) -> Result<()> {
        if self.ctx.is_cancelled() {
            return Err(self.ctx.cancel_error());
        }
        if self.tx.is_closed() {
            self.ctx.cancel_peer();
            return Err(self.ctx.cancel_error());
        }
        self.tx.send(Ok(item)).await.map_err(|_| {
            // The receiver was dropped between the check and the send.
            self.ctx.cancel_peer();
            self.ctx.cancel_error()
        })
    }

    /// Surfaces a terminal error to the peer, best effort.
    pub async fn fail(&self, err: Error) {
        if let Err(e) = self.tx.send(Err(err.into())).await {
            tracing::debug!("Peer gone before error could be delivered: {e}");
        }
    }
}

/// Runs a server-streaming call: spawns `producer` with a [`StreamSink`]
/// and returns the receiving half as the gRPC response stream.
///
/// A producer error other than cancellation is forwarded to the peer as
/// the stream's terminal status. Cancellation ends the stream quietly;
/// responses already sent are not retracted.
pub fn serve_stream<T, F, Fut>(
    buffer: usize,
    ctx: Arc<CallContext>,
    producer: F,
) -> ResponseStream<T>
where
    T: Send + 'static,
    F: FnOnce(StreamSink<T>) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer);
    let sink = StreamSink { tx, ctx };
    let terminal = sink.clone();

    let fut = producer(sink);
    tokio::spawn(async move {
        match fut.await {
            Ok(()) => {}
            Err(Error::RequestCancelled | Error::DeadlineExceeded) => {
                tracing::debug!("Streaming call ended early: peer cancelled or deadline passed");
            }
            Err(err) => {
                tracing::warn!("Streaming call failed: {err}");
                terminal.fail(err).await;
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

/// Drains a client-streaming call, folding every inbound message into an
/// accumulator. `None` from the stream is end-of-input and yields the
/// accumulator; a receive error is fatal and aborts the call with that
/// status. It is never swallowed or retried.
pub async fn fold_inbound<S, I, A, F>(
    mut inbound: S,
    init: A,
    mut fold: F,
) -> core::result::Result<A, Status>
where
    S: Stream<Item = core::result::Result<I, Status>> + Unpin,
    F: FnMut(A, I) -> A,
{
    let mut acc = init;
    while let Some(msg) = inbound.next().await {
        acc = fold(acc, msg?);
    }
    Ok(acc)
}

/// Runs a bidirectional call: for each inbound message, computes and
/// sends one outbound message before reading the next.
///
/// End-of-input closes the outbound stream without a final message. A
/// receive error becomes the stream's terminal item; a send failure
/// (peer gone) terminates the task immediately.
pub fn relay<S, I, O, F>(buffer: usize, mut inbound: S, mut reply: F) -> ResponseStream<O>
where
    S: Stream<Item = core::result::Result<I, Status>> + Send + Unpin + 'static,
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(I) -> O + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer);

    tokio::spawn(async move {
        while let Some(msg) = inbound.next().await {
            match msg {
                Ok(msg) => {
                    if tx.send(Ok(reply(msg))).await.is_err() {
                        tracing::debug!("Peer went away mid-call; ending bidirectional stream");
                        return;
                    }
                }
                Err(status) => {
                    tracing::warn!("Receive error on bidirectional stream: {status}");
                    let _ = tx.send(Err(status)).await;
                    return;
                }
            }
        }
    });

    Box::pin(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use futures::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tonic::Code;

    #[tokio::test]
    async fn serve_stream_delivers_everything_in_order() {
        let ctx = Arc::new(CallContext::new(None));
        let mut stream = serve_stream(4, ctx, |sink| async move {
            for i in 0..5u32 {
                sink.send(i).await?;
            }
            Ok(())
        });

        let mut seen = Vec::new();
        while let Some(item) = stream.next().await {
            seen.push(item.unwrap());
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn serve_stream_halts_within_one_send_of_receiver_drop() {
        let ctx = Arc::new(CallContext::new(None));
        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);

        let mut stream = serve_stream(1, Arc::clone(&ctx), move |sink| async move {
            for i in 0..100u32 {
                sink.send(i).await?;
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        for _ in 0..3 {
            stream.next().await.unwrap().unwrap();
        }
        drop(stream);

        // The producer observes the closed channel on its next send.
        for _ in 0..200 {
            if ctx.is_cancelled() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(ctx.is_cancelled());
        assert!(matches!(ctx.cancel_error(), Error::RequestCancelled));
        // 3 delivered + 1 buffered + at most 1 in flight when the channel
        // closed.
        assert!(sent.load(Ordering::SeqCst) <= 5);
    }

    #[tokio::test]
    async fn serve_stream_forwards_producer_failure_as_terminal_status() {
        let ctx = Arc::new(CallContext::new(None));
        let mut stream = serve_stream(4, ctx, |sink| async move {
            sink.send(1u32).await?;
            Err(Error::Storage {
                context: "cursor died".into(),
            })
        });

        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        let status = stream.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::Internal);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn sink_refuses_to_send_past_an_expired_deadline() {
        let ctx = Arc::new(CallContext::new(Some(
            tokio::time::Instant::now() - Duration::from_millis(1),
        )));
        let (tx, _rx) = mpsc::channel(1);
        let sink = StreamSink { tx, ctx };
        let err = sink.send(0u32).await.unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded));
    }

    #[tokio::test]
    async fn fold_inbound_accumulates_until_end_of_input() {
        let inbound = stream::iter(vec![Ok(1u32), Ok(2), Ok(3)]);
        let sum = fold_inbound(inbound, 0u32, |acc, n| acc + n).await.unwrap();
        assert_eq!(sum, 6);
    }

    #[tokio::test]
    async fn fold_inbound_aborts_on_receive_error() {
        let inbound = stream::iter(vec![Ok(1u32), Err(Status::data_loss("broken frame")), Ok(3)]);
        let status = fold_inbound(inbound, 0u32, |acc, n| acc + n)
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::DataLoss);
    }

    #[tokio::test]
    async fn relay_pairs_each_inbound_with_one_outbound() {
        let inbound = stream::iter(vec![Ok(1u32), Ok(2), Ok(3)]);
        let outputs: Vec<_> = relay(4, inbound, |n| n * 10).collect().await;
        let outputs: Vec<u32> = outputs.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(outputs, vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn relay_ends_without_final_message_on_end_of_input() {
        let inbound = stream::iter(Vec::<core::result::Result<u32, Status>>::new());
        let mut out = relay(4, inbound, |n| n);
        assert!(out.next().await.is_none());
    }

    #[tokio::test]
    async fn relay_forwards_receive_error_and_stops() {
        let inbound = stream::iter(vec![Ok(7u32), Err(Status::data_loss("broken frame"))]);
        let mut out = relay(4, inbound, |n| n + 1);
        assert_eq!(out.next().await.unwrap().unwrap(), 8);
        let status = out.next().await.unwrap().unwrap_err();
        assert_eq!(status.code(), Code::DataLoss);
        assert!(out.next().await.is_none());
    }
}
