use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use slashguard_rpc::{StateQuery, SystemSlotClock, start_rpc_server};
use slashguard_storage::{Store, backend::RocksDBBackend};
use slashguard_types::config::{
    ChainConfig, DEFAULT_SLOTS_PER_EPOCH, DEFAULT_WEAK_SUBJECTIVITY_PERIOD,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod keys;

#[derive(Debug, clap::Parser)]
#[command(name = "slashguard")]
#[command(about = "Slashing protection proposal history for validator clients")]
struct CliOptions {
    /// Directory holding the RocksDB database
    #[arg(long, default_value = "./slashguard-db")]
    datadir: PathBuf,
    /// JSON list of validator public keys to bootstrap history partitions for
    #[arg(long)]
    validators_file: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_SLOTS_PER_EPOCH)]
    slots_per_epoch: u64,
    /// Epochs of proposal history to keep
    #[arg(long, default_value_t = DEFAULT_WEAK_SUBJECTIVITY_PERIOD)]
    weak_subjectivity_period: u64,
    /// Unix time of the genesis slot, used to reject state queries for future slots
    #[arg(long, default_value_t = 0)]
    genesis_time: u64,
    #[arg(long, default_value_t = 12)]
    seconds_per_slot: u64,
    #[arg(long, default_value = "127.0.0.1:5052")]
    http_address: SocketAddr,
    #[arg(long, default_value = "info")]
    log: String,
}

#[tokio::main]
async fn main() {
    let options = CliOptions::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.log)),
        )
        .init();

    let config = ChainConfig {
        slots_per_epoch: options.slots_per_epoch,
        weak_subjectivity_period: options.weak_subjectivity_period,
    };

    // Fails if another process already owns the database
    let backend = RocksDBBackend::open(&options.datadir).expect("Failed to open database");
    let store = Store::open(Arc::new(backend), config).expect("Failed to open store");

    if let Some(path) = &options.validators_file {
        let pubkeys = keys::read_validators_file(path).expect("Failed to read validators file");
        store
            .bootstrap_partitions(&pubkeys)
            .expect("Failed to bootstrap proposal history");
    }

    let clock = SystemSlotClock::new(options.genesis_time, options.seconds_per_slot);
    let query = StateQuery::new(store, Arc::new(clock));

    info!(datadir = %options.datadir.display(), "slashguard started");

    tokio::select! {
        result = start_rpc_server(options.http_address, query) => {
            if let Err(err) = result {
                error!(%err, "RPC server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {}
    }

    info!("Shutting down...");
}
