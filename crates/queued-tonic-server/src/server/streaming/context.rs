//! Per-call deadline and cancellation state.
//!
//! A [`CallContext`] is created when a call starts and lives for the
//! call's duration; it is never persisted. Cancellation here is
//! cooperative: loops that span multiple suspension points must call
//! [`CallContext::is_cancelled`] at each iteration boundary and stop
//! promptly when it reports true.

use core::time::Duration;
use queued_tonic_core::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Request;

/// Deadline and cancellation state for one in-flight call.
#[derive(Debug)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    peer_initiated: AtomicBool,
}

impl CallContext {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            cancel: CancellationToken::new(),
            peer_initiated: AtomicBool::new(false),
        }
    }

    /// Builds a context from an incoming request, picking up the absolute
    /// deadline from the `grpc-timeout` metadata when present.
    pub fn from_request<T>(req: &Request<T>) -> Self {
        let deadline = req
            .metadata()
            .get("grpc-timeout")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_grpc_timeout)
            .map(|timeout| Instant::now() + timeout);
        Self::new(deadline)
    }

    /// The explicit cancellation check threaded through every streaming
    /// loop body: true once the peer cancelled or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline_exceeded()
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Marks the call as cancelled by the peer (disconnect or explicit
    /// cancel, observed as a closed response channel).
    pub fn cancel_peer(&self) {
        self.peer_initiated.store(true, Ordering::Relaxed);
        self.cancel.cancel();
    }

    /// The error a handler should return when it aborts because this
    /// context reported cancellation.
    pub fn cancel_error(&self) -> Error {
        if self.peer_initiated.load(Ordering::Relaxed) {
            Error::RequestCancelled
        } else if self.deadline_exceeded() {
            Error::DeadlineExceeded
        } else {
            Error::RequestCancelled
        }
    }
}

/// Parses a `grpc-timeout` metadata value (`{amount}{unit}` with units
/// `H`, `M`, `S`, `m`, `u`, `n`) into a duration.
///
/// Malformed values yield `None`; callers treat that as "no deadline"
/// rather than failing the call.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if !value.is_ascii() || value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "H" => Some(Duration::from_secs(amount.checked_mul(3600)?)),
        "M" => Some(Duration::from_secs(amount.checked_mul(60)?)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}
