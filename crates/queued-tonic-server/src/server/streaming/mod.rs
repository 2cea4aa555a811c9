//! The streaming dispatcher: per-call context and the generic machinery
//! behind the four gRPC call shapes.
//!
//! Handlers stay thin by delegating the framing, cancellation, and
//! error-propagation rules to this module:
//!
//! - unary calls are plain async functions and need nothing from here
//!   beyond [`context::CallContext`] for cooperative deadline polling,
//! - server-streaming calls run a producer task behind
//!   [`dispatch::serve_stream`],
//! - client-streaming calls drain their inbound stream through
//!   [`dispatch::fold_inbound`],
//! - bidirectional calls pair each inbound message with one outbound
//!   message via [`dispatch::relay`].

pub mod context;
pub mod dispatch;
