#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use queued_tonic_core::proto::{
    FILE_DESCRIPTOR_SET, greet_service_server::GreetServiceServer,
    queue_service_server::QueueServiceServer,
};
use server::config::{CliArgs, ServerConfig};
use server::service::greet::GreetHandler;
use server::service::queue::QueueHandler;
use server::store::{QueueStore, memory::MemoryStore, mongo::MongoStore};
use server::telemetry::init_tracing;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tonic_health::server::HealthReporter;
use tonic_reflection::server::Builder;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_tracing();

    let store: Arc<dyn QueueStore> = if config.in_memory {
        tracing::info!("Using in-memory store (records are not persisted)");
        Arc::new(MemoryStore::default())
    } else {
        tracing::info!("Connecting to MongoDB at {}", config.mongo_uri);
        Arc::new(MongoStore::connect(&config).await?)
    };

    let listener = TcpListener::bind(&config.server_addr).await?;
    let incoming = TcpListenerStream::new(listener);
    tracing::info!("Starting queued service on {}", config.server_addr);

    run_server(incoming, config, store).await
}

async fn run_server(
    incoming: TcpListenerStream,
    config: ServerConfig,
    store: Arc<dyn QueueStore>,
) -> anyhow::Result<()> {
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<QueueServiceServer<QueueHandler>>()
        .await;
    health_reporter
        .set_serving::<GreetServiceServer<GreetHandler>>()
        .await;

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    // Cancelled on the shutdown signal so handlers refuse calls that
    // arrive on existing connections while in-flight calls drain.
    let shutdown = CancellationToken::new();
    let queue_service = QueueHandler::new(Arc::clone(&store), &config, shutdown.clone());
    let greet_service = GreetHandler::new(&config, shutdown.clone());

    let mut builder = Server::builder();
    if let Some(tls) = &config.tls {
        let cert = tokio::fs::read(&tls.cert_path).await?;
        let key = tokio::fs::read(&tls.key_path).await?;
        builder = builder.tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))?;
        tracing::info!("Transport TLS enabled ({})", tls.cert_path.display());
    }

    builder
        .http2_adaptive_window(Some(true))
        .add_service(health_service)
        .add_service(reflection)
        .add_service(QueueServiceServer::new(queue_service))
        .add_service(GreetServiceServer::new(greet_service))
        .serve_with_incoming_shutdown(incoming, shutdown_signal(health_reporter, shutdown))
        .await?;

    // The listener has stopped accepting and in-flight calls have drained;
    // only now is it safe to tear down the store connection.
    store.close().await;

    tracing::info!("Service shut down successfully");
    Ok(())
}

async fn shutdown_signal(health_reporter: HealthReporter, shutdown: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // Stop accepting new calls; in-flight calls keep draining.
    shutdown.cancel();

    health_reporter
        .set_not_serving::<QueueServiceServer<QueueHandler>>()
        .await;
    health_reporter
        .set_not_serving::<GreetServiceServer<GreetHandler>>()
        .await;
}
