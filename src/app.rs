use crate::config::Config;
use crate::openclaw::ProcessRunner;
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

impl App {
    /// Create a new App instance from loaded configuration
    pub fn new(config: Config) -> Result<Self, anyhow::Error> {
        let mut runner = ProcessRunner::new(config.openclaw_bin.clone());
        if let Some(path) = &config.openclaw_path {
            runner = runner.env("PATH", path);
        }
        if let Some(home) = &config.openclaw_home {
            runner = runner.env("HOME", home);
        }

        let settings = config.dataset_settings();
        info!(
            program = runner.program(),
            status_ttl = fmt_duration(settings.status.ttl),
            cost_text_ttl = fmt_duration(settings.cost_text.ttl),
            cost_json_ttl = fmt_duration(settings.cost_json.ttl),
            cron_ttl = fmt_duration(settings.cron.ttl),
            "openclaw client configured"
        );

        let app_state = AppState::new(Arc::new(runner), &settings);
        Ok(App { config, app_state })
    }

    /// Start a background status fetch so the first page load is warm.
    pub fn warm_up(&self) {
        let status = self.app_state.openclaw.status.clone();
        tokio::spawn(async move {
            match status.read().await {
                Ok(_) => info!("status cache warmed"),
                // Not fatal: the dashboard serves the error until the CLI recovers.
                Err(e) => warn!(kind = e.kind(), error = %e, "status warm-up failed"),
            }
        });
    }

    /// Serve HTTP until a shutdown signal arrives, then drain within the
    /// configured budget.
    pub async fn run(self) -> ExitCode {
        match self.serve().await {
            Ok(code) => code,
            Err(e) => {
                error!(error = ?e, "server failed");
                ExitCode::FAILURE
            }
        }
    }

    async fn serve(self) -> Result<ExitCode, anyhow::Error> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        info!(address = %addr, "web server listening");

        let router = create_router(self.app_state);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tokio::select! {
            result = &mut server => {
                result.context("Server task panicked")?.context("Server error")?;
                warn!("server exited without a shutdown signal");
                return Ok(ExitCode::FAILURE);
            }
            signal = shutdown_signal() => {
                info!(
                    signal,
                    timeout = fmt_duration(self.config.shutdown_timeout),
                    "shutdown requested"
                );
            }
        }

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(self.config.shutdown_timeout, server).await {
            Ok(result) => {
                result.context("Server task panicked")?.context("Server error")?;
                info!("graceful shutdown complete");
                Ok(ExitCode::SUCCESS)
            }
            Err(_) => {
                warn!("graceful shutdown timed out, abandoning open connections");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

/// Resolves with the name of the first shutdown signal received.
async fn shutdown_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
