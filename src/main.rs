use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use poll_guide_worker::{
    app::{ComponentRegistry, build_router},
    config::Config,
    scheduler::spawn_daily_guide_daemon,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");
        let message = panic_info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .map(String::as_str)
            })
            .unwrap_or("unknown panic payload");

        match panic_info.location() {
            Some(location) => error!(
                thread = thread_name,
                file = location.file(),
                line = location.line(),
                message,
                "panic occurred"
            ),
            None => error!(thread = thread_name, message, "panic occurred"),
        }
    }));

    // Tracing is initialized inside ComponentRegistry::build via Telemetry::new()
    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = config.http_bind();
    let sweep_enabled = config.guide_sweep_enabled();
    let registry = ComponentRegistry::build(config).context("failed to build component registry")?;

    if sweep_enabled {
        let cadence = registry
            .sweep_cadence()
            .context("invalid guide sweep schedule")?;
        let _sweep_daemon = spawn_daily_guide_daemon(registry.scheduler().clone(), cadence);
    } else {
        warn!("daily guide sweep disabled; sweeps run only when triggered over HTTP");
    }

    let router = build_router(registry);
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {bind_addr}"))?;

    info!(%bind_addr, "listening");

    if let Err(error) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        warn!(error = %error, "server exited with error");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
