//! Log output for the server.
//!
//! Structured logging goes through `tracing` with an `EnvFilter`, so the
//! verbosity is controlled with the standard `RUST_LOG` variable, e.g.
//! `RUST_LOG=queued_tonic_server=debug`.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
