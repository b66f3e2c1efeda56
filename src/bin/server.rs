//! kvwatch Server Binary
//!
//! Starts the TCP server for kvwatch.

use std::sync::Arc;

use clap::Parser;
use kvwatch::network::Server;
use kvwatch::{Config, Engine, HashStrategy, OverflowPolicy};
use tracing_subscriber::{fmt, EnvFilter};

/// kvwatch Server
#[derive(Parser, Debug)]
#[command(name = "kvwatch-server")]
#[command(about = "Sharded in-memory key-value store with key watches")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:2000")]
    listen: String,

    /// Number of shards
    #[arg(short = 'n', long, default_value = "10")]
    shards: usize,

    /// Shard hash strategy (first-byte, crc32)
    #[arg(long, default_value = "first-byte")]
    hash: HashStrategy,

    /// Per-listener event buffer
    #[arg(short = 'b', long, default_value = "16")]
    watch_buffer: usize,

    /// What to do when a listener's buffer is full (drop-oldest, drop-newest)
    #[arg(long, default_value = "drop-oldest")]
    overflow: OverflowPolicy,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvwatch=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvwatch Server v{}", kvwatch::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .shard_count(args.shards)
        .hash_strategy(args.hash)
        .watch_buffer_size(args.watch_buffer)
        .overflow_policy(args.overflow)
        .max_connections(args.max_connections)
        .build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, engine) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", args.listen, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
