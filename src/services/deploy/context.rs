//! 部署上下文
//!
//! 单次部署的执行上下文：任务标识、工作区、项目目录与日志输出

use std::path::PathBuf;

use crate::domain::deploy::{StepKind, ValidatedRequest};
use crate::domain::workspace::Workspace;

/// 部署执行上下文
///
/// 一个请求对应一个上下文，请求之间不共享
#[derive(Clone, Debug)]
pub struct DeployContext {
    /// 任务 ID（与工作区 uuid 相同，用于日志关联）
    pub task_id: String,
    /// 工作区
    pub workspace: Workspace,
    /// 已校验的请求
    pub request: ValidatedRequest,
    /// 项目目录 = 工作区 / projectPath
    pub project_dir: PathBuf,
}

impl DeployContext {
    pub fn new(workspace: Workspace, request: ValidatedRequest) -> Self {
        let project_dir = workspace.project_dir(request.project_path());
        Self {
            task_id: workspace.id().to_string(),
            workspace,
            request,
            project_dir,
        }
    }

    /// 输出部署日志
    pub fn log(&self, content: &str) {
        tracing::info!(task_id = %self.task_id, "{}", content);
    }

    /// 将某一步骤捕获的 stdout 转发到日志，每个非空行一条
    pub fn log_step_output(&self, step: StepKind, output: &str) {
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            tracing::info!(
                target: "git_deploy_agent::step_output",
                task_id = %self.task_id,
                step = %step,
                "{}",
                line
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deploy::DeploymentRequest;
    use crate::domain::workspace::WorkspaceProvisioner;

    #[test]
    fn test_context_resolves_project_dir() {
        let ws = WorkspaceProvisioner::new("/tmp").allocate();
        let request = DeploymentRequest::new("https://example.com/r.git", "app")
            .validate()
            .unwrap();

        let ctx = DeployContext::new(ws.clone(), request);
        assert_eq!(ctx.task_id, ws.id());
        assert_eq!(ctx.project_dir, ws.path().join("app"));
    }
}
