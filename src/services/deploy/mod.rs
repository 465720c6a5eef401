//! 部署服务模块
//!
//! 请求校验 → 分配工作区 → 执行流水线 → 按策略释放工作区

pub mod context;
pub mod pipeline;

use std::sync::Arc;
use thiserror::Error;

use crate::config::EnvConfig;
use crate::domain::deploy::{DeploymentRequest, PipelineReport, ValidationError};
use crate::domain::workspace::{CleanupPolicy, WorkspaceProvisioner};
use crate::infra::command::CommandExecutor;

pub use context::DeployContext;
pub use pipeline::{PipelineError, PipelineExecutor};

/// 部署错误
#[derive(Debug, Error)]
pub enum DeployError {
    /// 请求无效，未产生任何副作用
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// 某个步骤无法启动
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// 部署服务
///
/// 无跨请求的可变状态，可在多个请求间共享
pub struct DeployService {
    provisioner: WorkspaceProvisioner,
    pipeline: PipelineExecutor,
    cleanup_policy: CleanupPolicy,
}

impl DeployService {
    pub fn new(
        provisioner: WorkspaceProvisioner,
        pipeline: PipelineExecutor,
        cleanup_policy: CleanupPolicy,
    ) -> Self {
        Self {
            provisioner,
            pipeline,
            cleanup_policy,
        }
    }

    /// 根据环境配置构建
    pub fn from_config(config: &EnvConfig, executor: Arc<dyn CommandExecutor>) -> Self {
        let pipeline = PipelineExecutor::new(executor, config.toolchain.clone())
            .with_step_timeout(config.step_timeout)
            .with_failure_policy(config.failure_policy);

        Self::new(
            WorkspaceProvisioner::new(config.workspace_root.clone()),
            pipeline,
            config.cleanup_policy,
        )
    }

    pub fn provisioner(&self) -> &WorkspaceProvisioner {
        &self.provisioner
    }

    pub fn pipeline(&self) -> &PipelineExecutor {
        &self.pipeline
    }

    pub fn cleanup_policy(&self) -> CleanupPolicy {
        self.cleanup_policy
    }

    /// 执行一次部署
    ///
    /// 步骤失败只体现在返回的报告中；只有校验失败和步骤无法启动会返回错误
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<PipelineReport, DeployError> {
        let request = request.validate().map_err(|e| {
            let missing: Vec<&str> = e.missing.iter().map(|f| f.as_str()).collect();
            tracing::info!(missing = ?missing, "Rejected deployment request");
            e
        })?;

        let workspace = self.provisioner.allocate();
        let ctx = DeployContext::new(workspace, request);

        tracing::info!(
            task_id = %ctx.task_id,
            repository = %ctx.request.repository_url(),
            project_path = %ctx.request.project_path(),
            workspace = %ctx.workspace.path().display(),
            "Deployment started"
        );

        let result = self.pipeline.execute(&ctx).await;

        ctx.workspace.release(self.cleanup_policy).await;

        Ok(result?)
    }
}
