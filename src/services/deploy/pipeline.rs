//! 部署流水线：clone → restore → build → run
//!
//! 步骤严格串行：上一步进程退出且 stdout 读完后才启动下一步。
//! 每步的退出状态都会记录，失败后是否继续由 [`FailurePolicy`] 决定

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::ToolchainConfig;
use crate::domain::deploy::{
    CommandStep, FailurePolicy, PipelineReport, StepKind, StepRecord, ValidatedRequest,
};
use crate::domain::workspace::Workspace;
use crate::infra::command::{CommandError, CommandExecutor, CommandOutput};

use super::context::DeployContext;

/// 流水线错误，仅在步骤无法启动时产生
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{step} step could not be executed: {source}")]
    Command {
        step: StepKind,
        #[source]
        source: CommandError,
    },
}

/// 在工作区上按固定顺序执行步骤
pub struct PipelineExecutor {
    executor: Arc<dyn CommandExecutor>,
    toolchain: ToolchainConfig,
    step_timeout: Option<Duration>,
    failure_policy: FailurePolicy,
}

impl PipelineExecutor {
    pub fn new(executor: Arc<dyn CommandExecutor>, toolchain: ToolchainConfig) -> Self {
        Self {
            executor,
            toolchain,
            step_timeout: None,
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout
    }

    /// 生成单次请求的步骤列表
    ///
    /// clone 在进程工作目录下执行，其余三步在项目目录下执行
    pub fn plan(&self, workspace: &Workspace, request: &ValidatedRequest) -> Vec<CommandStep> {
        let workspace_path = workspace.path().to_string_lossy().into_owned();
        let project_dir = workspace.project_dir(request.project_path());
        let project_arg = project_dir.to_string_lossy().into_owned();

        let dotnet = |kind: StepKind, args: Vec<String>| CommandStep {
            kind,
            program: self.toolchain.dotnet.clone(),
            args,
            work_dir: Some(project_dir.clone()),
        };

        vec![
            CommandStep {
                kind: StepKind::Clone,
                program: self.toolchain.git.clone(),
                args: vec![
                    "clone".to_string(),
                    request.repository_url().to_string(),
                    workspace_path,
                ],
                work_dir: None,
            },
            dotnet(
                StepKind::Restore,
                vec!["restore".to_string(), project_arg.clone()],
            ),
            dotnet(StepKind::Build, vec!["build".to_string(), project_arg.clone()]),
            dotnet(
                StepKind::Run,
                vec!["run".to_string(), "--project".to_string(), project_arg],
            ),
        ]
    }

    /// 执行全部步骤
    ///
    /// 非零退出或超时只记为失败步骤，不作为错误返回
    pub async fn execute(&self, ctx: &DeployContext) -> Result<PipelineReport, PipelineError> {
        let steps = self.plan(&ctx.workspace, &ctx.request);
        let mut records: Vec<StepRecord> = steps.iter().map(|s| StepRecord::new(s.kind)).collect();

        ctx.log(&format!(
            "=== Starting deployment of {} ===",
            ctx.request.repository_url()
        ));
        ctx.log(&format!("Workspace: {}", ctx.workspace.path().display()));
        ctx.log(&format!("Project directory: {}", ctx.project_dir.display()));

        let mut halted_by: Option<StepKind> = None;

        for (step, record) in steps.iter().zip(records.iter_mut()) {
            if let Some(failed) = halted_by {
                record.skip(Some(format!("{} step failed", failed)));
                continue;
            }

            record.start();
            ctx.log(&format!(">>> {}", step.command_line()));

            let output = match self.executor.execute(step, self.step_timeout).await {
                Ok(output) => output,
                Err(e) => {
                    error!(task_id = %ctx.task_id, step = %step.kind, error = %e, "Step could not be executed");
                    return Err(PipelineError::Command {
                        step: step.kind,
                        source: e,
                    });
                }
            };

            ctx.log_step_output(step.kind, &output.stdout);
            apply_output(record, &output, self.step_timeout);

            if record.is_failed() {
                warn!(
                    task_id = %ctx.task_id,
                    step = %step.kind,
                    exit_code = ?output.exit_code,
                    timed_out = output.timed_out,
                    policy = self.failure_policy.as_str(),
                    "Step failed"
                );
                if self.failure_policy == FailurePolicy::HaltOnFailure {
                    halted_by = Some(step.kind);
                }
            }
        }

        let report = PipelineReport {
            workspace: ctx.workspace.path().to_path_buf(),
            project_dir: ctx.project_dir.clone(),
            steps: records,
        };

        info!(
            task_id = %ctx.task_id,
            failed_steps = report.failed_steps().count(),
            "Pipeline finished"
        );

        Ok(report)
    }
}

fn apply_output(record: &mut StepRecord, output: &CommandOutput, timeout: Option<Duration>) {
    record.exit_code = output.exit_code;
    record.timed_out = output.timed_out;
    record.stdout = output.stdout.clone();

    if output.success {
        record.finish(true, None);
        return;
    }

    let message = match (output.timed_out, output.exit_code) {
        (true, _) => format!(
            "timed out after {}s",
            timeout.map(|t| t.as_secs()).unwrap_or_default()
        ),
        (false, Some(code)) => format!("exited with code {}", code),
        (false, None) => "terminated by signal".to_string(),
    };
    record.finish(false, Some(message));
}
