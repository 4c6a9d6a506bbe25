use anyhow::{Context, Result};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use simpcity_bot::chat::HttpGroupChat;
use simpcity_bot::config::BotConfig;
use simpcity_bot::greeter::Greeter;
use simpcity_bot::monitor::WelcomeMonitor;
use simpcity_bot::roster::MemberRoster;
use simpcity_bot::scheduler::{IntervalTicker, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = BotConfig::from_env().context("invalid bot configuration")?;
    let chat = HttpGroupChat::new(&config).context("failed to build chat client")?;
    tracing::info!(
        thread_id = %config.thread_id,
        poll_secs = config.poll_interval.as_secs(),
        "SimpCity welcome bot starting"
    );

    let monitor = WelcomeMonitor::new(chat, MemberRoster::default(), Greeter::from_entropy());
    let scheduler = Scheduler::start(IntervalTicker::new(config.poll_interval), monitor);

    shutdown_signal().await;
    if let Some(monitor) = scheduler.stop().await {
        tracing::info!(known_members = monitor.roster().len(), "welcome bot stopped");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
