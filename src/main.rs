use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use toolset::config::ToolsetConfig;
use toolset::http::{router, AppParts, HttpServer};
use toolset::ratelimit::{CounterStore, MemoryCounterStore, RateLimiter, RedisCounterStore};
use toolset::seo::{MemorySeoStore, SeoStore, YamlSeoStore};

/// Serve the toolset pages with rate limiting and SEO overrides.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "TOOLSET_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ToolsetConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    init_tracing(cli.json_logs || config.logging.json, &config.logging.filter);

    info!("Starting toolset");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        bind_addr = %config.server.bind_addr,
        pages_dir = %config.server.pages_dir.display(),
        routes = config.rate_limiting.routes.len(),
        "Configuration loaded"
    );

    // Counter store: Redis when configured, otherwise in-process.
    let counters: Arc<dyn CounterStore> = match &config.rate_limiting.redis_url {
        Some(url) => Arc::new(RedisCounterStore::connect(url).await?),
        None => {
            let store = Arc::new(MemoryCounterStore::new());
            spawn_purge_task(
                store.clone(),
                Duration::from_secs(config.rate_limiting.purge_interval_secs.max(1)),
            );
            info!("Using in-process rate limit counters");
            store as Arc<dyn CounterStore>
        }
    };
    let limiter = RateLimiter::with_policy(counters, config.rate_limiting.failure_policy);

    let seo_store: Arc<dyn SeoStore> = match &config.seo.overrides_path {
        Some(path) => Arc::new(YamlSeoStore::open(path)?),
        None => Arc::new(MemorySeoStore::new()),
    };

    if config.admin.token.is_none() {
        info!("Admin token not set, SEO admin endpoints disabled");
    }

    let app = router(AppParts {
        limiter,
        rules: config.rate_limiting.routes.clone(),
        debug_remote_ip: config.rate_limiting.debug_remote_ip.clone(),
        seo_store,
        max_body_bytes: config.seo.max_body_bytes,
        admin_token: config.admin.token.clone(),
        pages_dir: config.server.pages_dir.clone(),
    });

    HttpServer::new(config.server.bind_addr, app)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Toolset stopped");
    Ok(())
}

fn init_tracing(json: bool, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .init();
    }
}

fn spawn_purge_task(store: Arc<MemoryCounterStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            store.purge_expired();
        }
    });
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
