//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::env::EnvConfig;
use crate::infra::command::{CommandExecutor, CommandRunner};
use crate::services::deploy::DeployService;

/// 全局 shutdown token，用于优雅关闭
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN
        .get_or_init(CancellationToken::new)
        .clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

/// 应用状态
///
/// 启动时构建，之后只读；请求之间只共享文件系统命名空间
pub struct AppState {
    /// 环境配置
    pub config: EnvConfig,
    /// 部署服务
    pub deployer: DeployService,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 使用真实子进程执行器创建应用状态
    pub fn new(config: EnvConfig) -> Self {
        Self::with_executor(config, Arc::new(CommandRunner))
    }

    /// 使用指定执行器创建应用状态
    pub fn with_executor(config: EnvConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        tracing::info!(
            port = config.port,
            workspace_root = %config.workspace_root.display(),
            git = %config.toolchain.git,
            dotnet = %config.toolchain.dotnet,
            step_timeout_secs = ?config.step_timeout.map(|t| t.as_secs()),
            failure_policy = config.failure_policy.as_str(),
            cleanup_policy = config.cleanup_policy.as_str(),
            "Loaded configuration"
        );

        let deployer = DeployService::from_config(&config, executor);

        Self {
            config,
            deployer,
            started_at: Utc::now(),
        }
    }
}
