//! Git Deploy Agent - 拉取仓库并执行 restore / build / run
//!
//! 库入口：模块声明与服务启动

pub mod error;
pub mod infra;
pub mod domain;
pub mod config;
pub mod state;
pub mod api;
pub mod services;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::env::constants::{SERVICE_NAME, VERSION};
use crate::config::EnvConfig;
use crate::state::app_state::{get_shutdown_token, trigger_shutdown};
use crate::state::AppState;

/// 命令行运行时配置
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    /// 覆盖 PORT 环境变量
    pub port_override: Option<u16>,
}

/// 服务启动错误
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// 初始化日志
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,git_deploy_agent=info,tower_http=info"));
    // 测试或嵌入场景下可能已初始化
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化并运行服务
pub async fn init_and_run_agent_with_config(runtime: RuntimeConfig) {
    init_tracing();

    let mut config = EnvConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    tracing::info!(service = SERVICE_NAME, version = VERSION, "Starting");

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "Agent stopped with error");
        std::process::exit(1);
    }
}

/// 绑定端口并提供 HTTP 服务，直到收到关闭信号
pub async fn run(config: EnvConfig) -> Result<(), StartupError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let state = Arc::new(AppState::new(config));
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;
    tracing::info!(%addr, "Listening");

    tokio::spawn(async {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received, initiating graceful shutdown");
        trigger_shutdown();
    });

    let shutdown = get_shutdown_token();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
