//! Server startup and shutdown

use std::sync::Arc;

use anyhow::{Context, Result};
use loadrig_config::LoadrigConfig;
use loadrig_execution::{EventHub, ExecutionManager, K6Launcher, RunServices};
use loadrig_storage::{FileExecutionStore, FileProfileStore};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::{create_app, AppConfig};
use crate::context::AppContext;

/// Wire the orchestrator to the filesystem stores and the real k6 launcher
pub async fn build_manager(config: &LoadrigConfig) -> Result<Arc<ExecutionManager>> {
    tokio::fs::create_dir_all(&config.storage.executions_dir)
        .await
        .with_context(|| {
            format!(
                "creating execution store at {}",
                config.storage.executions_dir.display()
            )
        })?;
    let profiles = FileProfileStore::new(&config.storage.profiles_dir);
    let executions = FileExecutionStore::new(&config.storage.executions_dir);

    let services = RunServices {
        launcher: Arc::new(K6Launcher::new()),
        persister: Arc::new(executions),
        hub: Arc::new(EventHub::new(&config.hub)),
    };
    Ok(Arc::new(ExecutionManager::new(
        Arc::new(profiles),
        services,
        config.runner.clone(),
    )))
}

/// HTTP server over one [`ExecutionManager`]
pub struct Server {
    config: LoadrigConfig,
    manager: Arc<ExecutionManager>,
}

impl Server {
    pub async fn new(config: LoadrigConfig) -> Result<Self> {
        let manager = build_manager(&config).await?;
        Ok(Self { config, manager })
    }

    pub fn build_app(&self) -> axum::Router {
        create_app(AppContext::new(self.manager.clone()), AppConfig::default())
    }

    /// Serve until Ctrl+C or SIGTERM, then stop the active runs
    pub async fn start(self) -> Result<()> {
        let addr = self.config.server.socket_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {}", addr))?;

        self.log_config_summary();
        info!("Server listening on {}", addr);

        axum::serve(listener, self.build_app())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        let stopped = self.manager.shutdown().await;
        info!("Server shutdown complete ({} runs stopped)", stopped.len());
        Ok(())
    }

    fn log_config_summary(&self) {
        info!("=== loadrig server configuration ===");
        info!("Runner: {}", self.config.runner.binary.display());
        info!("Profiles: {}", self.config.storage.profiles_dir.display());
        info!("Executions: {}", self.config.storage.executions_dir.display());
        info!("Grace period: {:?}", self.config.runner.grace_period);
        match self.config.runner.max_run_duration {
            Some(limit) => info!("Max run duration: {:?}", limit),
            None => info!("Max run duration: unlimited"),
        }
    }
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
