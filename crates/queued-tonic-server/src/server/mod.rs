//! Server internals: configuration, persistence, the resource manager,
//! the streaming dispatcher, and the gRPC service handlers.

pub mod config;
pub mod manager;
pub mod service;
pub mod store;
pub mod streaming;
pub mod telemetry;
