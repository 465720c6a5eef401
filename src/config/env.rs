//! 环境变量配置加载
//!
//! 启动时读取一次，之后只读

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::domain::deploy::FailurePolicy;
use crate::domain::workspace::{absolute_root, CleanupPolicy};

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 服务监听端口
    pub port: u16,
    /// 工作区根目录
    pub workspace_root: PathBuf,
    /// 外部工具路径
    pub toolchain: ToolchainConfig,
    /// 单步超时，None 表示无限等待
    pub step_timeout: Option<Duration>,
    /// 步骤失败策略
    pub failure_policy: FailurePolicy,
    /// 工作区清理策略
    pub cleanup_policy: CleanupPolicy,
}

/// 外部工具配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolchainConfig {
    /// git 可执行文件
    pub git: String,
    /// dotnet 可执行文件
    pub dotnet: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            dotnet: "dotnet".to_string(),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_PORT,
            workspace_root: env::temp_dir(),
            toolchain: ToolchainConfig::default(),
            step_timeout: None,
            failure_policy: FailurePolicy::default(),
            cleanup_policy: CleanupPolicy::default(),
        }
    }
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意 key-value 来源加载配置
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // Port
        let port = get("PORT")
            .and_then(|v| parse_or_warn("PORT", &v))
            .unwrap_or(defaults.port);

        // Workspace root，相对路径在启动时解析一次
        let workspace_root = get("DEPLOY_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .map(absolute_root)
            .unwrap_or(defaults.workspace_root);

        // Toolchain
        let toolchain = ToolchainConfig {
            git: get("DEPLOY_GIT_PATH").unwrap_or(defaults.toolchain.git),
            dotnet: get("DEPLOY_DOTNET_PATH").unwrap_or(defaults.toolchain.dotnet),
        };

        // Step timeout (0 = disabled)
        let step_timeout = get("DEPLOY_STEP_TIMEOUT_SECS")
            .and_then(|v| parse_or_warn::<u64>("DEPLOY_STEP_TIMEOUT_SECS", &v))
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let failure_policy = get("DEPLOY_FAILURE_POLICY")
            .and_then(|v| {
                let policy = FailurePolicy::from_str(&v);
                if policy.is_none() {
                    warn!(value = %v, "Unknown DEPLOY_FAILURE_POLICY, using default");
                }
                policy
            })
            .unwrap_or(defaults.failure_policy);

        let cleanup_policy = get("DEPLOY_WORKSPACE_CLEANUP")
            .and_then(|v| {
                let policy = CleanupPolicy::from_str(&v);
                if policy.is_none() {
                    warn!(value = %v, "Unknown DEPLOY_WORKSPACE_CLEANUP, using default");
                }
                policy
            })
            .unwrap_or(defaults.cleanup_policy);

        Self {
            port,
            workspace_root,
            toolchain,
            step_timeout,
            failure_policy,
            cleanup_policy,
        }
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.trim().parse().ok();
    if parsed.is_none() {
        warn!(key = key, value = %value, "Invalid value, using default");
    }
    parsed
}

/// 常量
pub mod constants {
    /// 服务名称
    pub const SERVICE_NAME: &str = "git-deploy-agent";

    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 5000;

    /// 部署成功响应
    pub const DEPLOY_SUCCESS_MESSAGE: &str = "Deployment process completed successfully.";

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EnvConfig::from_lookup(lookup(&[]));
        assert_eq!(config.port, 5000);
        assert_eq!(config.workspace_root, env::temp_dir());
        assert_eq!(config.toolchain, ToolchainConfig::default());
        assert!(config.step_timeout.is_none());
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.cleanup_policy, CleanupPolicy::Retain);
    }

    #[test]
    fn test_overrides() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("DEPLOY_WORKSPACE_ROOT", "/srv/scratch"),
            ("DEPLOY_GIT_PATH", "/usr/bin/git"),
            ("DEPLOY_DOTNET_PATH", "/opt/dotnet/dotnet"),
            ("DEPLOY_STEP_TIMEOUT_SECS", "600"),
            ("DEPLOY_FAILURE_POLICY", "halt"),
            ("DEPLOY_WORKSPACE_CLEANUP", "delete"),
        ]));
        assert_eq!(config.port, 8080);
        assert_eq!(config.workspace_root, PathBuf::from("/srv/scratch"));
        assert_eq!(config.toolchain.git, "/usr/bin/git");
        assert_eq!(config.toolchain.dotnet, "/opt/dotnet/dotnet");
        assert_eq!(config.step_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.failure_policy, FailurePolicy::HaltOnFailure);
        assert_eq!(config.cleanup_policy, CleanupPolicy::Delete);
    }

    #[test]
    fn test_relative_workspace_root_is_resolved() {
        let config = EnvConfig::from_lookup(lookup(&[("DEPLOY_WORKSPACE_ROOT", "scratch")]));
        assert!(config.workspace_root.is_absolute());
        assert_eq!(
            config.workspace_root,
            env::current_dir().unwrap().join("scratch")
        );
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("DEPLOY_STEP_TIMEOUT_SECS", "0"),
            ("DEPLOY_FAILURE_POLICY", "sometimes"),
            ("DEPLOY_WORKSPACE_ROOT", "  "),
        ]));
        assert_eq!(config.port, 5000);
        assert!(config.step_timeout.is_none());
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.workspace_root, env::temp_dir());
    }
}
