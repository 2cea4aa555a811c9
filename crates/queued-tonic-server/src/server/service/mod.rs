//! gRPC service entry points.
//!
//! - [`queue`] - CRUD over persisted queue records (`QueueService`).
//! - [`greet`] - stateless call-shape demos (`GreetService`).

pub mod greet;
pub mod queue;
