//! 领域模型模块
//!
//! 请求、工作区与流水线记录

pub mod deploy;
pub mod workspace;

// Re-exports for convenience
pub use deploy::{
    CommandStep, DeploymentRequest, FailurePolicy, PipelineReport, StepKind, StepRecord, StepStatus,
    ValidatedRequest, ValidationError,
};
pub use workspace::{CleanupPolicy, Workspace, WorkspaceProvisioner};
