//! donation-forwarder daemon.
//!
//! `run` starts every enabled loop and serves until SIGINT/SIGTERM.
//! `refund-btc` sweeps the UTXO deposit address to an operator address once.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use donation_forwarder::admin::{serve_admin, AdminState};
use donation_forwarder::blockchain::{BlockchainClient, NodeEndpoint, Wallet};
use donation_forwarder::config::watcher::{ConfigChange, ConfigWatcher};
use donation_forwarder::config::{load_config, ForwarderConfig};
use donation_forwarder::forwarding::{engine_channel, ForwardingEngine, ForwardingSettings};
use donation_forwarder::health::ConnectivityMonitor;
use donation_forwarder::lifecycle::signals::shutdown_signal;
use donation_forwarder::lifecycle::{ScheduledTask, Shutdown};
use donation_forwarder::observability::{logging, metrics};
use donation_forwarder::status::{ContractStatusOracle, StatusBoard, StatusPoller};
use donation_forwarder::utxo::transaction::parse_address;
use donation_forwarder::utxo::{SweepOutcome, UtxoForwardingWorker};

type BoxError = Box<dyn std::error::Error>;

const ENGINE_QUEUE_CAPACITY: usize = 16;

#[derive(Parser)]
#[command(name = "donation-forwarder", version)]
#[command(about = "Forwards donations received on the deposit addresses", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forwarding daemon
    Run {
        #[arg(short, long, default_value = "forwarder.toml")]
        config: PathBuf,
    },
    /// Sweep the UTXO deposit address to another address, once
    RefundBtc {
        #[arg(short, long, default_value = "forwarder.toml")]
        config: PathBuf,

        /// Address receiving the refund
        #[arg(long)]
        to: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run(&config).await,
        Commands::RefundBtc { config, to } => refund_btc(&config, &to).await,
    }
}

fn init_observability(config: &ForwarderConfig) {
    logging::init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}

async fn run(config_path: &Path) -> Result<(), BoxError> {
    let config = load_config(config_path)?;
    init_observability(&config);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        rpc_url = %config.node.rpc_url,
        chain_id = config.node.chain_id,
        forwarding = config.forwarding.enabled,
        status = config.status.enabled,
        bitcoin = config.bitcoin.enabled,
        "donation-forwarder starting"
    );

    let board = StatusBoard::new();
    let client = BlockchainClient::new(config.node.clone()).await?;
    let endpoint = NodeEndpoint::new(Arc::new(client));

    let monitor = ConnectivityMonitor::new(endpoint.clone(), Arc::new(board.clone()));
    let mut tasks: Vec<ScheduledTask> =
        vec![monitor.start(Duration::from_millis(config.node.ping_interval_ms))];

    let wallet = if config.forwarding.enabled || config.status.enabled {
        Some(Wallet::from_env(config.node.chain_id)?)
    } else {
        None
    };
    let forwarding_address = wallet.as_ref().map(Wallet::address);

    let mut engine_handle = None;
    if let (true, Some(wallet)) = (config.forwarding.enabled, wallet) {
        let settings = ForwardingSettings::from_config(&config.forwarding)?;
        let (handle, commands) = engine_channel(ENGINE_QUEUE_CAPACITY);
        let engine = ForwardingEngine::new(
            settings,
            wallet,
            endpoint.clone(),
            monitor.handle(),
            board.clone(),
        );
        tasks.push(engine.start(commands));
        engine_handle = Some(handle);
    }

    if let (true, Some(eth_address)) = (config.status.enabled, forwarding_address) {
        let contract = Address::from_str(&config.status.oracle_address)?;
        let oracle = ContractStatusOracle::new(endpoint.clone(), contract);
        let mut poller = StatusPoller::new(
            Arc::new(oracle),
            config.status.phase,
            eth_address,
            config.status.btc_address.clone(),
            board.clone(),
        );
        if let Some(handle) = &engine_handle {
            poller = poller.with_engine(handle.clone());
        }
        tasks.push(poller.start(Duration::from_millis(config.status.poll_interval_ms)));
    }

    if config.bitcoin.enabled {
        let worker = UtxoForwardingWorker::from_config(&config.bitcoin, board.clone())?;
        tasks.push(worker.start());
    }

    let admin_shutdown = Shutdown::new();
    let admin_server = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState {
            board: board.clone(),
            engine: engine_handle.clone(),
            api_key: Arc::from(config.admin.api_key.as_str()),
        };
        let mut stop = admin_shutdown.subscribe();
        Some(tokio::spawn(serve_admin(listener, state, async move {
            let _ = stop.recv().await;
        })))
    } else {
        None
    };

    let (watcher, mut updates) = ConfigWatcher::new(config_path, config);
    let _watcher = match watcher.run() {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload unavailable");
            None
        }
    };

    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            _ = &mut signal => break,
            Some(change) = updates.recv() => apply_reload(&change, &endpoint, &monitor),
        }
    }

    tracing::info!("Shutting down");
    for task in tasks {
        let name = task.name();
        task.stop().await;
        tracing::debug!(task = name, "Task stopped");
    }
    admin_shutdown.trigger();
    if let Some(server) = admin_server {
        match server.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin server task panicked"),
            Ok(Ok(())) => {}
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Rebuild the node client if its endpoints moved; report what needs a restart.
fn apply_reload(change: &ConfigChange, endpoint: &NodeEndpoint, monitor: &ConnectivityMonitor) {
    if change.reconnect_node {
        let node = &change.config.node;
        match BlockchainClient::connect(node.clone()) {
            Ok(client) => {
                endpoint.replace(Arc::new(client));
                let generation = monitor.on_generation_change();
                tracing::info!(rpc_url = %node.rpc_url, generation, "Node endpoint replaced");
            }
            Err(e) => tracing::error!(error = %e, "Rejected new node endpoint"),
        }
    }

    if !change.restart_required.is_empty() {
        tracing::warn!(
            changed = ?change.restart_required,
            "Configuration changes take effect after restart"
        );
    }
}

async fn refund_btc(config_path: &Path, to: &str) -> Result<(), BoxError> {
    let config = load_config(config_path)?;
    init_observability(&config);

    let worker = UtxoForwardingWorker::from_config(&config.bitcoin, StatusBoard::new())?;
    let to = parse_address(to, worker.settings().network)?;

    match worker.refund_all(&to).await? {
        SweepOutcome::NothingToSweep => tracing::info!("Nothing to refund"),
        SweepOutcome::Swept(receipt) => tracing::info!(
            txid = %receipt.txid,
            refunded = receipt.forwarded,
            fee = receipt.fee,
            "Refund broadcast"
        ),
    }
    Ok(())
}
