use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use failover_tester::poll_until_healthy;
use failover_tester::server;
use failover_tester::utils::async_task::spawn_task;
use failover_tester::ControlPlane;
use failover_tester::ControlPlaneClient;
use failover_tester::Error;
use failover_tester::MongoConnector;
use failover_tester::ProfileRegistry;
use failover_tester::Result;
use failover_tester::Settings;
use failover_tester::TestOrchestrator;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

const LOG_FILE_NAME: &str = "failover-tester.log";

#[derive(Parser, Debug)]
#[command(name = "failover-tester", version, about = "Replica set failover test engine")]
struct Cli {
    /// Configuration file, layered over `config/default.toml`
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Serve the HTTP API and WebSocket event stream (default)
    Serve,
    /// Drop the collection holding workload documents
    Cleanup,
    /// Block until the control plane reports the cluster idle
    WaitHealthy,
    /// List the database processes of the configured cluster
    Processes,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Arc::new(Settings::load(cli.config.as_deref())?);

    // Initializing Logs
    let _guard = init_observability(settings.server.log_dir.as_deref())?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(settings).await,
        Command::Cleanup => MongoConnector::new(settings.database.clone()).drop_test_data().await,
        Command::WaitHealthy => {
            let client = ControlPlaneClient::new(&settings.control_plane)?;
            info!("waiting for cluster {} to become idle", settings.control_plane.cluster_name);
            poll_until_healthy(
                &client,
                settings.test.healthy_max_wait(),
                settings.test.healthy_poll_interval(),
            )
            .await?;
            info!("cluster is healthy");
            Ok(())
        }
        Command::Processes => {
            let client = ControlPlaneClient::new(&settings.control_plane)?;
            for process in client.cluster_processes().await? {
                println!(
                    "{}:{}\t{}\t{}",
                    process.hostname,
                    process.port,
                    process.type_name,
                    process.user_alias.unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}

async fn run_server(settings: Arc<Settings>) -> Result<()> {
    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let control_plane = Arc::new(ControlPlaneClient::new(&settings.control_plane)?);
    let connector = Arc::new(MongoConnector::new(settings.database.clone()));
    let orchestrator = TestOrchestrator::new(
        settings.clone(),
        control_plane,
        connector,
        Arc::new(ProfileRegistry::new()),
    );

    info!(
        "project {}, cluster {}, test duration {}s, operation interval {}ms",
        settings.control_plane.project_id,
        settings.control_plane.cluster_name,
        settings.test.duration_seconds,
        settings.test.operation_interval_ms
    );

    // Listen on Shutdown Signal
    spawn_task("shutdown signal", graceful_shutdown(graceful_tx));

    let addr = settings.server.socket_addr()?;
    server::serve(orchestrator.clone(), addr, graceful_rx).await?;

    // A test still running at shutdown gets its report and releases its connections
    orchestrator.stop_test();
    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("cannot listen for SIGINT: {}", e)))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("cannot listen for SIGTERM: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let (non_blocking, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .map_err(|e| Error::Fatal(format!("cannot create log dir {}: {}", dir.display(), e)))?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(dir, LOG_FILE_NAME))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_filter(filter);
    tracing_subscriber::registry()
        .with(base_subscriber)
        .try_init()
        .map_err(|e| Error::Fatal(format!("cannot install log subscriber: {}", e)))?;

    Ok(guard)
}
