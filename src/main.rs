use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marquee::config::{LogFormat, LoggingConfig, MarqueeConfig};
use marquee::data::Models;
use marquee::http::{AppState, HttpServer};
use marquee::ratelimit::{LimiterSettings, RateLimiterRegistry};

/// Movie catalogue API server.
#[derive(Debug, Parser)]
#[command(name = "marquee", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "MARQUEE_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen port, overriding the configured address's port
    #[arg(long, env = "MARQUEE_PORT")]
    port: Option<u16>,

    /// Environment (development|staging|production)
    #[arg(long, env = "MARQUEE_ENV")]
    env: Option<String>,

    /// Rate limiter maximum requests per second
    #[arg(long, env = "MARQUEE_LIMITER_RPS")]
    limiter_rps: Option<f64>,

    /// Rate limiter maximum burst
    #[arg(long, env = "MARQUEE_LIMITER_BURST")]
    limiter_burst: Option<u32>,

    /// Enable the rate limiter
    #[arg(long, env = "MARQUEE_LIMITER_ENABLED")]
    limiter_enabled: Option<bool>,
}

impl Args {
    fn apply(&self, config: &mut MarqueeConfig) {
        if let Some(port) = self.port {
            config.server.http_addr.set_port(port);
        }
        if let Some(env) = &self.env {
            config.server.env = env.clone();
        }
        if let Some(rps) = self.limiter_rps {
            config.limiter.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.limiter.burst_capacity = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.limiter.enabled = enabled;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = MarqueeConfig::load(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.logging);

    info!("Starting Marquee");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        http_addr = %config.server.http_addr,
        env = %config.server.env,
        "Configuration loaded"
    );

    let limiter = Arc::new(RateLimiterRegistry::new(LimiterSettings::from(&config.limiter)));
    limiter.start();

    let models = Arc::new(Models::in_memory(&config.storage));
    let listener = TcpListener::bind(config.server.http_addr).await?;

    let state = AppState {
        config: Arc::new(config),
        models,
        limiter: Arc::clone(&limiter),
    };
    HttpServer::new(state).run(listener, shutdown_signal()).await?;

    limiter.stop().await;
    info!("Marquee stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
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
