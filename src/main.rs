use clap::Parser;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{interval, timeout, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use zafira_backend::ai::client::{ClassifierAdapter, OpenAiClassifier};
use zafira_backend::config::ServerConfig;
use zafira_backend::db::memory::MemoryStore;
use zafira_backend::db::Stores;
use zafira_backend::dispatch::{ActionWorker, QueueInvoker};
use zafira_backend::tags::reconcile::reconcile_duplicate_tags;
use zafira_backend::version::VERSION;
use zafira_backend::web::{create_axum_router, AppState};

const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "server.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn save_snapshot(store: &MemoryStore, path: &Path) {
    if let Err(e) = store.save_snapshot(path).await {
        error!(error = %e, path = %path.display(), "Failed to write store snapshot.");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if std::env::args().any(|arg| arg == "--version") {
        println!("Server version: {VERSION}");
        return Ok(());
    }

    let args = Args::parse();

    // --- Server Config Setup ---
    let server_config = match ServerConfig::load(args.config.as_deref()) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&server_config.log_dir);
    info!("Starting server, version: {}", VERSION);

    // --- Store Setup ---
    let snapshot_path = server_config.snapshot_path();
    let store = match MemoryStore::load_snapshot(&snapshot_path).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(error = %e, "Failed to load store snapshot.");
            return Err(e.into());
        }
    };
    let stores = Stores::from_backend(store.clone());

    // --- Completion API ---
    if server_config.openai_api_key.is_none() {
        warn!("No completion API key configured. Every message will be classified as a thought.");
    }
    let adapter: Arc<dyn ClassifierAdapter> = match OpenAiClassifier::from_config(&server_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to create completion client.");
            return Err(e.into());
        }
    };

    // --- Action Queue ---
    let (invoker, receiver) = QueueInvoker::new(server_config.dispatch_queue_capacity);
    let app_state = Arc::new(AppState::new(
        server_config.clone(),
        stores.clone(),
        adapter,
        Arc::new(invoker),
    ));

    let worker = ActionWorker::new(receiver, Arc::new(app_state.actions.clone()));
    let worker_task = tokio::spawn(worker.run());

    // --- Duplicate Tag Reconciliation Task ---
    if server_config.tag_reconcile_interval_secs > 0 {
        let stores_for_reconcile = stores.clone();
        let period = Duration::from_secs(server_config.tag_reconcile_interval_secs);
        tokio::spawn(async move {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_seconds = period.as_secs(), "Tag reconciliation task started.");

            loop {
                interval.tick().await;
                match reconcile_duplicate_tags(&stores_for_reconcile, false).await {
                    Ok(report) if report.merged > 0 => {
                        info!(
                            groups = report.groups,
                            merged = report.merged,
                            thoughts = report.rewritten_thoughts,
                            lists = report.rewritten_lists,
                            notes = report.rewritten_notes,
                            messages = report.rewritten_messages,
                            "Duplicate tags merged."
                        );
                    }
                    Ok(_) => debug!("No duplicate tags found."),
                    Err(e) => error!(error = %e, "Tag reconciliation failed."),
                }
            }
        });
    }

    // --- Snapshot Task ---
    if server_config.snapshot_interval_secs > 0 {
        let store_for_snapshot = store.clone();
        let path = snapshot_path.clone();
        let period = Duration::from_secs(server_config.snapshot_interval_secs);
        tokio::spawn(async move {
            let mut interval = interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                save_snapshot(&store_for_snapshot, &path).await;
            }
        });
    }

    // --- Axum HTTP Server Setup ---
    let addr: SocketAddr = server_config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening.");

    let http_router = create_axum_router(app_state.clone());
    let serve_result = axum::serve(listener, http_router)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &serve_result {
        error!(error = %e, "HTTP server error.");
    }

    // The queue closes once the last sender is dropped; the worker then
    // finishes the jobs already in flight.
    drop(app_state);
    match timeout(WORKER_DRAIN_TIMEOUT, worker_task).await {
        Ok(Ok(())) => debug!("Action worker drained."),
        Ok(Err(e)) => error!(error = %e, "Action worker stopped abnormally."),
        Err(_) => warn!("Timed out waiting for in-flight actions."),
    }

    save_snapshot(&store, &snapshot_path).await;
    info!("Server stopped.");
    serve_result.map_err(Into::into)
}
