//! `tbb`: command-line entry point for a ledger node.
//!
//! # Usage
//! ```text
//! tbb version
//! tbb balances list --datadir <dir>
//! tbb run --datadir <dir> [--ip <ip>] [--port <port>] [--bootstrap-ip <ip>] [--bootstrap-port <port>]
//! tbb migrate --datadir <dir>
//! ```
//!
//! The data directory holds `database/genesis.json` and `database/block.db`;
//! both are created on first use.

use clap::{Args, Parser, Subcommand};
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tbb::core::ledger::Ledger;
use tbb::core::migrate::seed_demo_chain;
use tbb::core::state::StateError;
use tbb::network::http_transport::HttpTransport;
use tbb::network::peer::PeerNode;
use tbb::network::server::{DEFAULT_HTTP_PORT, DEFAULT_IP, Server, ServerError, ServerOps, unix_now};
use tbb::storage::fs::expand_path;
use tbb::utils::log::{self, Level};
use tbb::{error, info};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "tbb", version, about = "The Blockchain Bar ledger node")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prints the version.
    Version,
    /// Interacts with balances (list...).
    Balances {
        #[command(subcommand)]
        command: BalancesCommand,
    },
    /// Launches the node and its HTTP API.
    Run(RunArgs),
    /// Appends the demonstration chain on top of the current head.
    Migrate(DataDir),
}

#[derive(Subcommand)]
enum BalancesCommand {
    /// Lists all balances.
    List(DataDir),
}

#[derive(Args)]
struct DataDir {
    /// Path to the node data directory where the DB is stored.
    #[arg(long)]
    datadir: String,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    data: DataDir,
    /// IP address this node listens on and advertises.
    #[arg(long, default_value = DEFAULT_IP)]
    ip: String,
    /// HTTP port this node listens on.
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    port: u64,
    /// IP of the bootstrap peer.
    #[arg(long, default_value = DEFAULT_IP)]
    bootstrap_ip: String,
    /// Port of the bootstrap peer.
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT)]
    bootstrap_port: u64,
    /// Seconds between sync passes over known peers.
    #[arg(long, default_value_t = 45)]
    sync_interval_secs: u64,
    /// Seconds before a peer call is abandoned.
    #[arg(long, default_value_t = 5)]
    peer_timeout_secs: u64,
    /// Lowest log level written to stderr (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: Level,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Version => {
            println!("tbb {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Balances {
            command: BalancesCommand::List(args),
        } => list_balances(&args),
        Command::Run(args) => run(args).await,
        Command::Migrate(args) => migrate(&args),
    };

    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
}

fn list_balances(args: &DataDir) -> Result<(), CliError> {
    let ledger = Ledger::open(&expand_path(&args.datadir))?;
    let (hash, balances) = ledger.balances();

    println!("Accounts balances at {hash}:");
    println!("__________________");
    println!();
    for (account, balance) in balances {
        println!("{account}: {balance}");
    }
    Ok(())
}

fn migrate(args: &DataDir) -> Result<(), CliError> {
    let ledger = Ledger::open(&expand_path(&args.datadir))?;
    for hash in seed_demo_chain(&ledger, unix_now())? {
        println!("committed block {hash}");
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<(), CliError> {
    log::set_level(args.log_level);

    let mut ops = ServerOps::new(expand_path(&args.data.datadir), args.ip, args.port);
    ops.bootstrap = Some(PeerNode::new(
        args.bootstrap_ip,
        args.bootstrap_port,
        true,
        false,
    ));
    ops.sync_interval = Duration::from_secs(args.sync_interval_secs.max(1));
    ops.peer_timeout = Duration::from_secs(args.peer_timeout_secs.max(1));

    let transport = Arc::new(HttpTransport::new(ops.peer_timeout)?);
    let server = Arc::new(Server::open(ops, transport)?);
    info!(
        "node {} starting at block {}",
        server.address(),
        server.ledger().latest_block_hash()
    );

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for shutdown signal: {e}");
            return;
        }
        info!("shutdown signal received");
        shutdown.cancel();
    });

    server.run(token).await?;
    Ok(())
}
