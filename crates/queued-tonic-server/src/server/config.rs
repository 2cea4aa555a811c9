use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `queued-tonic-server` binary.
///
/// These settings control where the server listens, how it reaches the
/// document store, and the buffering/pacing behavior of the streaming
/// handlers. All values are parsed from CLI arguments or environment
/// variables, with reasonable defaults suitable for local development.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "queued-tonic-server",
    version,
    about = "A gRPC CRUD and streaming service over a document store"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// MongoDB connection string.
    ///
    /// Environment variable: `MONGO_URI`
    #[arg(long, env = "MONGO_URI", default_value_t = String::from("mongodb://localhost:27017"))]
    pub mongo_uri: String,

    /// Database holding the queue collection.
    ///
    /// Environment variable: `MONGO_DB`
    #[arg(long, env = "MONGO_DB", default_value_t = String::from("mydb"))]
    pub mongo_db: String,

    /// Collection queue records are stored in.
    ///
    /// Environment variable: `MONGO_COLLECTION`
    #[arg(long, env = "MONGO_COLLECTION", default_value_t = String::from("queue"))]
    pub mongo_collection: String,

    /// Keep records in process memory instead of MongoDB.
    ///
    /// Useful for local development and demos; records are lost when the
    /// process exits.
    #[arg(long, default_value_t = false)]
    pub in_memory: bool,

    /// PEM-encoded server certificate for transport TLS.
    ///
    /// Must be supplied together with `--tls-key`.
    ///
    /// Environment variable: `TLS_CERT`
    #[arg(long, env = "TLS_CERT")]
    pub tls_cert: Option<PathBuf>,

    /// PEM-encoded private key for transport TLS.
    ///
    /// Must be supplied together with `--tls-cert`.
    ///
    /// Environment variable: `TLS_KEY`
    #[arg(long, env = "TLS_KEY")]
    pub tls_key: Option<PathBuf>,

    /// Capacity of the response buffer between a streaming producer task
    /// and the gRPC stream.
    ///
    /// Lower values increase backpressure responsiveness; higher values
    /// enable deeper pipelining.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Delay in milliseconds between consecutive `GreetManyTimes`
    /// responses.
    ///
    /// The artificial pacing exists to make backpressure and cancellation
    /// timing observable; it is not a production pacing policy.
    ///
    /// Environment variable: `GREET_SEND_INTERVAL_MS`
    #[arg(long, env = "GREET_SEND_INTERVAL_MS", default_value_t = 1_000)]
    pub greet_send_interval_ms: u64,

    /// Length in milliseconds of each work slice in `GreetWithDeadline`.
    ///
    /// The handler polls the call context between slices and aborts when
    /// the peer cancelled or the deadline passed.
    ///
    /// Environment variable: `DEADLINE_SLICE_MS`
    #[arg(long, env = "DEADLINE_SLICE_MS", default_value_t = 1_000)]
    pub deadline_slice_ms: u64,
}

/// Paths to the PEM credential material loaded at startup.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub mongo_collection: String,
    pub in_memory: bool,
    pub tls: Option<TlsConfig>,
    pub stream_buffer_size: usize,
    pub greet_send_interval: Duration,
    pub deadline_slice: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        let tls = match (args.tls_cert, args.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            _ => bail!("TLS_CERT and TLS_KEY must be supplied together"),
        };

        Ok(Self {
            server_addr: args.server_addr,
            mongo_uri: args.mongo_uri,
            mongo_db: args.mongo_db,
            mongo_collection: args.mongo_collection,
            in_memory: args.in_memory,
            tls,
            stream_buffer_size: args.stream_buffer_size,
            greet_send_interval: Duration::from_millis(args.greet_send_interval_ms),
            deadline_slice: Duration::from_millis(args.deadline_slice_ms),
        })
    }
}
