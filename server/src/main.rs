mod grpc_server;

use chrono::Utc;
use clap::Parser;
use common::ServerConfig;
use nameserver::{
    CleanTaskManager, MemNameServerStorage, NameServerStorage, PageFs, RocksNameServerStorage,
    RoundRobinChunkAllocator, SequentialInodeIdGenerator,
};
use std::{net::SocketAddr, sync::Arc};
use tonic::transport::Server;

use grpc_server::NameServerGrpcService;

const DEV_COPYSET_COUNT: u32 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Listen address; overrides the config file
    #[arg(long)]
    addr: Option<String>,

    /// Path to configuration file
    #[arg(long, default_value = "config.toml")]
    config_path: String,

    /// Storage backend: "mem" or "rocks"
    #[arg(long, default_value = "mem")]
    store: String,

    /// RocksDB data directory (used with --store rocks)
    #[arg(long, default_value = "./data/nameserver")]
    data_dir: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    let args = Args::parse();
    let config = match ServerConfig::from_file(&args.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(
                "failed to load {} ({}), using default config",
                args.config_path,
                e
            );
            ServerConfig::default()
        }
    };

    let listen: SocketAddr = args.addr.unwrap_or(config.listen.clone()).parse()?;

    let storage: Arc<dyn NameServerStorage> = match args.store.as_str() {
        "rocks" => {
            tracing::info!("opening rocksdb store at {}", args.data_dir);
            Arc::new(
                RocksNameServerStorage::open(&args.data_dir)
                    .map_err(|e| anyhow::anyhow!("open rocksdb store: {}", e))?,
            )
        }
        "mem" => Arc::new(MemNameServerStorage::new()),
        other => anyhow::bail!("unknown store backend: {}", other),
    };

    // Dev-grade id source; production wires an external allocator. The
    // clock seed keeps ids from colliding across restarts of a persistent
    // store.
    let first_id = Utc::now().timestamp_micros() as u64;
    let inode_ids = Arc::new(SequentialInodeIdGenerator::starting_at(first_id));
    let allocator = Arc::new(RoundRobinChunkAllocator::new(DEV_COPYSET_COUNT));
    let cleaner = Arc::new(CleanTaskManager::new(storage.clone()));

    let fs = Arc::new(
        PageFs::new(storage, inode_ids, allocator, cleaner, config.options)
            .map_err(|e| anyhow::anyhow!("namespace init: {}", e))?,
    );

    tracing::info!("nameserver listening on {}", listen);
    Server::builder()
        .add_service(NameServerGrpcService::new(fs).into_server())
        .serve(listen)
        .await?;

    Ok(())
}
