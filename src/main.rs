use chrono::Utc;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use presale_ledger::application::purchase::PurchaseOrchestrator;
use presale_ledger::application::query::PresaleQueryService;
use presale_ledger::application::reconciliation::ReconciliationHandler;
use presale_ledger::application::sweeper::PendingSweeper;
use presale_ledger::config::AppConfig;
use presale_ledger::domain::ports::{StageStoreRef, TransactionStoreRef};
use presale_ledger::infrastructure::in_memory::{InMemoryStageStore, InMemoryTransactionStore};
use presale_ledger::infrastructure::nowpayments::{IpnSignatureVerifier, NowPaymentsClient};
use presale_ledger::interfaces::csv::seed_stages;
use presale_ledger::interfaces::http::{self, AppState};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Print stages and stats as JSON
    Snapshot,
    /// Expire stale pending purchases once and exit
    Sweep,
}

struct Ledger {
    stages: StageStoreRef,
    transactions: TransactionStoreRef,
}

#[cfg(feature = "storage-rocksdb")]
fn open_ledger(db_path: Option<PathBuf>) -> Result<Ledger> {
    use presale_ledger::infrastructure::rocksdb::RocksDBStore;

    if let Some(db_path) = db_path {
        // Use persistent storage (RocksDB)
        let store = RocksDBStore::open(db_path).into_diagnostic()?;
        return Ok(Ledger {
            stages: Arc::new(store.clone()),
            transactions: Arc::new(store),
        });
    }
    Ok(in_memory_ledger())
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_ledger(db_path: Option<PathBuf>) -> Result<Ledger> {
    if db_path.is_some() {
        warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_ledger())
}

fn in_memory_ledger() -> Ledger {
    Ledger {
        stages: Arc::new(InMemoryStageStore::new()),
        transactions: Arc::new(InMemoryTransactionStore::new()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("presale_ledger=info,tower_http=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let ledger = open_ledger(config.db_path.clone())?;
    if let Some(path) = &config.stages {
        let file = File::open(path).into_diagnostic()?;
        let report = seed_stages(ledger.stages.as_ref(), file)
            .await
            .into_diagnostic()?;
        info!(
            inserted = report.inserted,
            skipped = report.skipped,
            rejected = report.rejected,
            "stages seeded"
        );
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, ledger).await,
        Command::Snapshot => {
            let snapshot = PresaleQueryService::new(ledger.stages)
                .get_presale_data()
                .await;
            let json = serde_json::to_string_pretty(&snapshot).into_diagnostic()?;
            println!("{}", json);
            Ok(())
        }
        Command::Sweep => {
            let sweeper =
                PendingSweeper::new(ledger.stages, ledger.transactions, config.pending_ttl());
            let expired = sweeper.sweep_once(Utc::now()).await.into_diagnostic()?;
            println!("{}", expired);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, ledger: Ledger) -> Result<()> {
    let processor_config = config
        .nowpayments()
        .ok_or_else(|| miette!("NOWPAYMENTS_API_KEY is required to serve purchases"))?;
    let ipn_secret = config
        .ipn_secret()
        .ok_or_else(|| miette!("NOWPAYMENTS_IPN_SECRET is required to verify payment callbacks"))?;

    let processor = NowPaymentsClient::new(processor_config).into_diagnostic()?;
    let verifier = IpnSignatureVerifier::new(ipn_secret);

    let state = AppState::new(
        PresaleQueryService::new(ledger.stages.clone()),
        PurchaseOrchestrator::new(
            ledger.stages.clone(),
            ledger.transactions.clone(),
            Arc::new(processor),
            config.purchase_settings(),
        ),
        ReconciliationHandler::new(
            ledger.stages.clone(),
            ledger.transactions.clone(),
            Arc::new(verifier),
        ),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = PendingSweeper::new(ledger.stages, ledger.transactions, config.pending_ttl());
    let sweeper_task = tokio::spawn(sweeper.run(config.sweep_interval(), shutdown_rx));

    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("shutting down");
        let _ = shutdown_tx.send(true);
    };

    http::serve(config.listen, state, shutdown)
        .await
        .into_diagnostic()?;
    sweeper_task.await.into_diagnostic()?;
    Ok(())
}
