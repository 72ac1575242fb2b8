use clap::Parser;
use rota::{config::Config, StatusMonitor, WeightedPool};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[derive(Parser)]
#[command(name = "rota")]
#[command(about = "Weighted Redis replica pool with health-checked failover")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "rota.yaml")]
    config: String,

    /// Probe every endpoint once, print the report as YAML and exit
    #[arg(long)]
    once: bool,
}

fn init_logging() {
    let (non_blocking_writer, guard) = non_blocking(std::io::stderr());
    // Keep guard alive for the program lifetime to avoid log loss
    let _ = LOG_GUARD.set(guard);

    let fmt = tracing_subscriber::fmt()
        .with_writer(non_blocking_writer)
        .with_ansi(true)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .compact();

    // Map RUST_LOG to a max level (debug/info/warn/error/trace)
    let level = match std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    let _ = fmt.with_max_level(level).try_init();
}

/// Probe once and render the report
async fn report_once(pool: &WeightedPool) -> Result<String, Box<dyn std::error::Error>> {
    let report = pool.status_all().await;
    Ok(serde_yaml::to_string(&report)?)
}

async fn run_with_config_path_and_shutdown(
    config_path: &str,
    once: bool,
    shutdown: impl std::future::Future<Output = ()> + Send,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_yaml_file(config_path).await?;
    for (index, endpoint) in config.endpoints.iter().enumerate() {
        info!(
            "Endpoint {}: {} (db {}, weight {})",
            index,
            endpoint.address(),
            endpoint.db,
            endpoint.weight
        );
    }

    let pool = Arc::new(WeightedPool::from_config(&config)?);

    if once {
        print!("{}", report_once(&pool).await?);
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let monitor = StatusMonitor::new(Arc::clone(&pool), config.status_interval());
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    shutdown.await;
    info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
    if let Err(e) = monitor_task.await {
        error!("Status monitor task failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let args = Args::parse();
    info!("Starting rota");
    run_with_config_path_and_shutdown(&args.config, args.once, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;
    info!("rota stopped");
    Ok(())
}
