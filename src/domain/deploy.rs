//! 部署相关领域模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// 校验失败时返回给调用方的固定提示
pub const REQUIRED_FIELDS_MESSAGE: &str = "GitRepositoryUrl and ProjectPath are required.";

/// 部署请求
///
/// 两个字段在线上都是可选的：缺失与空字符串一样交给 [`DeploymentRequest::validate`] 处理
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    /// Git 仓库地址
    #[serde(default)]
    pub git_repository_url: Option<String>,
    /// 项目路径（相对于仓库根目录）
    #[serde(default)]
    pub project_path: Option<String>,
}

/// 缺失或为空的必填字段
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequiredField {
    GitRepositoryUrl,
    ProjectPath,
}

impl RequiredField {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredField::GitRepositoryUrl => "gitRepositoryUrl",
            RequiredField::ProjectPath => "projectPath",
        }
    }
}

/// 请求校验错误
///
/// Display 输出固定提示，`missing` 保留具体字段供日志使用
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("GitRepositoryUrl and ProjectPath are required.")]
pub struct ValidationError {
    pub missing: Vec<RequiredField>,
}

/// 通过校验的请求
///
/// 只能由 [`DeploymentRequest::validate`] 构造
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
    repository_url: String,
    project_path: String,
}

impl ValidatedRequest {
    pub fn repository_url(&self) -> &str {
        &self.repository_url
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }
}

impl DeploymentRequest {
    pub fn new(git_repository_url: impl Into<String>, project_path: impl Into<String>) -> Self {
        Self {
            git_repository_url: Some(git_repository_url.into()),
            project_path: Some(project_path.into()),
        }
    }

    /// 校验必填字段
    ///
    /// 只检查非空，不做 URL 语法或路径穿越检查
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let url = non_empty(&self.git_repository_url);
        let path = non_empty(&self.project_path);

        match (url, path) {
            (Some(url), Some(path)) => Ok(ValidatedRequest {
                repository_url: url.to_string(),
                project_path: path.to_string(),
            }),
            (url, path) => {
                let mut missing = Vec::new();
                if url.is_none() {
                    missing.push(RequiredField::GitRepositoryUrl);
                }
                if path.is_none() {
                    missing.push(RequiredField::ProjectPath);
                }
                Err(ValidationError { missing })
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// 流水线步骤类型
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Clone,
    Restore,
    Build,
    Run,
}

impl StepKind {
    /// 固定执行顺序
    pub const ORDER: [StepKind; 4] = [
        StepKind::Clone,
        StepKind::Restore,
        StepKind::Build,
        StepKind::Run,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Clone => "clone",
            StepKind::Restore => "restore",
            StepKind::Build => "build",
            StepKind::Run => "run",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StepKind::Clone => "Git Clone",
            StepKind::Restore => "Restore Dependencies",
            StepKind::Build => "Build",
            StepKind::Run => "Run",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单个外部命令步骤
///
/// 参数以独立列表传给子进程，不经过 shell
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandStep {
    pub kind: StepKind,
    pub program: String,
    pub args: Vec<String>,
    /// 工作目录，None 表示继承当前进程的工作目录
    pub work_dir: Option<PathBuf>,
}

impl CommandStep {
    /// 用于日志展示的命令行
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// 步骤状态
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

/// 步骤失败后的处理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 记录失败并继续执行后续步骤（默认）
    #[default]
    Continue,
    /// 首个失败步骤之后的步骤全部跳过
    HaltOnFailure,
}

impl FailurePolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continue" => Some(FailurePolicy::Continue),
            "halt" | "halt_on_failure" => Some(FailurePolicy::HaltOnFailure),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::Continue => "continue",
            FailurePolicy::HaltOnFailure => "halt",
        }
    }
}

/// 步骤执行记录
#[derive(Clone, Debug, Serialize)]
pub struct StepRecord {
    pub kind: StepKind,
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// 捕获的 stdout
    pub stdout: String,
    pub message: Option<String>,
}

impl StepRecord {
    /// 创建新的待执行步骤
    pub fn new(kind: StepKind) -> Self {
        Self {
            kind,
            display_name: kind.display_name().to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StepStatus::Pending,
            exit_code: None,
            timed_out: false,
            stdout: String::new(),
            message: None,
        }
    }

    /// 开始执行
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StepStatus::Running;
    }

    /// 完成步骤
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }

    /// 跳过步骤
    pub fn skip(&mut self, reason: Option<String>) {
        self.status = StepStatus::Skipped;
        self.message = reason;
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// 一次流水线执行的完整记录
///
/// 只写入日志，不返回给 HTTP 调用方
#[derive(Clone, Debug, Serialize)]
pub struct PipelineReport {
    pub workspace: PathBuf,
    pub project_dir: PathBuf,
    pub steps: Vec<StepRecord>,
}

impl PipelineReport {
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.is_failed())
    }

    pub fn step(&self, kind: StepKind) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok() {
        let req = DeploymentRequest::new("https://example.com/r.git", "app");
        let valid = req.validate().unwrap();
        assert_eq!(valid.repository_url(), "https://example.com/r.git");
        assert_eq!(valid.project_path(), "app");
    }

    #[test]
    fn test_validate_empty_url() {
        let req = DeploymentRequest::new("", "x");
        let err = req.validate().unwrap_err();
        assert_eq!(err.missing, vec![RequiredField::GitRepositoryUrl]);
        assert_eq!(err.to_string(), REQUIRED_FIELDS_MESSAGE);
    }

    #[test]
    fn test_validate_missing_both() {
        let err = DeploymentRequest::default().validate().unwrap_err();
        assert_eq!(
            err.missing,
            vec![RequiredField::GitRepositoryUrl, RequiredField::ProjectPath]
        );
    }

    #[test]
    fn test_validate_does_not_trim() {
        // 只拒绝空字符串，空白字符串照常放行
        let req = DeploymentRequest::new(" ", " ");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_deserialize_camel_case() {
        let req: DeploymentRequest = serde_json::from_str(
            r#"{"gitRepositoryUrl":"https://example.com/r.git","projectPath":"src/App"}"#,
        )
        .unwrap();
        assert_eq!(req.git_repository_url.as_deref(), Some("https://example.com/r.git"));
        assert_eq!(req.project_path.as_deref(), Some("src/App"));

        let req: DeploymentRequest = serde_json::from_str(r#"{"projectPath":"app"}"#).unwrap();
        assert!(req.git_repository_url.is_none());
    }

    #[test]
    fn test_step_record_lifecycle() {
        let mut step = StepRecord::new(StepKind::Build);
        assert_eq!(step.status, StepStatus::Pending);
        assert_eq!(step.display_name, "Build");

        step.start();
        assert_eq!(step.status, StepStatus::Running);
        assert!(step.started_at.is_some());

        step.finish(false, Some("exit code 1".to_string()));
        assert!(step.is_failed());
        assert!(step.duration_ms.is_some());
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!(FailurePolicy::from_str("halt"), Some(FailurePolicy::HaltOnFailure));
        assert_eq!(FailurePolicy::from_str("CONTINUE"), Some(FailurePolicy::Continue));
        assert_eq!(FailurePolicy::from_str("retry"), None);
        assert_eq!(FailurePolicy::default(), FailurePolicy::Continue);
    }

    #[test]
    fn test_command_line() {
        let step = CommandStep {
            kind: StepKind::Run,
            program: "dotnet".to_string(),
            args: vec!["run".to_string(), "--project".to_string(), "/tmp/x".to_string()],
            work_dir: None,
        };
        assert_eq!(step.command_line(), "dotnet run --project /tmp/x");
    }
}
