//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - stdout 完整捕获（stderr 继承父进程）
//! - 可选超时控制
//! - 可替换的执行后端（测试中使用记录型 mock）

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, error};

use crate::domain::deploy::CommandStep;

/// 超时后等待 stdout 读取收尾的时间
const DRAIN_GRACE: Duration = Duration::from_secs(5);

/// 命令执行错误
#[derive(Debug, Error)]
pub enum CommandError {
    /// 命令启动失败
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// 等待命令完成失败
    #[error("Failed to wait for command: {0}")]
    WaitFailed(#[source] std::io::Error),
    /// 读取 stdout 失败
    #[error("Failed to read command output: {0}")]
    ReadFailed(#[source] std::io::Error),
}

/// 命令执行结果
#[derive(Clone, Debug, Default)]
pub struct CommandOutput {
    /// 退出码（被信号终止时为 None）
    pub exit_code: Option<i32>,
    pub success: bool,
    /// 捕获的 stdout
    pub stdout: String,
    /// 是否因超时而终止
    pub timed_out: bool,
}

/// 命令执行后端
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// 执行一个步骤并等待其结束
    ///
    /// 非零退出码不是错误，由调用方根据 [`CommandOutput`] 判断
    async fn execute(
        &self,
        step: &CommandStep,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;
}

/// 基于 tokio::process 的命令执行器
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandRunner;

impl CommandRunner {
    /// 执行命令并捕获 stdout
    ///
    /// # Arguments
    /// * `program` - 要执行的程序
    /// * `args` - 命令行参数（不经过 shell）
    /// * `work_dir` - 工作目录，None 时继承当前进程
    /// * `timeout` - 超时时间，None 时无限等待
    pub async fn run_capturing_stdout(
        program: &str,
        args: &[String],
        work_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = work_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| CommandError::SpawnFailed {
            program: program.to_string(),
            source,
        })?;

        // 读取 stdout 与等待进程并行，避免管道写满阻塞子进程
        let stdout = child.stdout.take();
        let mut reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(mut stdout) = stdout {
                stdout.read_to_end(&mut buf).await?;
            }
            Ok::<_, std::io::Error>(buf)
        });

        let (status, timed_out) = match timeout {
            Some(limit) => tokio::select! {
                status = child.wait() => (status.map_err(CommandError::WaitFailed)?, false),
                _ = tokio::time::sleep(limit) => {
                    error!(program = %program, "Command timed out after {:?}", limit);
                    let _ = child.kill().await;
                    // 等待进程实际终止
                    (child.wait().await.map_err(CommandError::WaitFailed)?, true)
                }
            },
            None => (child.wait().await.map_err(CommandError::WaitFailed)?, false),
        };

        let bytes = if timed_out {
            // 被杀进程的子孙进程可能仍持有管道
            match tokio::time::timeout(DRAIN_GRACE, &mut reader).await {
                Ok(joined) => join_output(joined)?,
                Err(_) => {
                    reader.abort();
                    Vec::new()
                }
            }
        } else {
            join_output(reader.await)?
        };

        debug!(
            program = %program,
            exit_code = ?status.code(),
            stdout_bytes = bytes.len(),
            "Command finished"
        );

        Ok(CommandOutput {
            exit_code: status.code(),
            success: status.success() && !timed_out,
            stdout: String::from_utf8_lossy(&bytes).into_owned(),
            timed_out,
        })
    }
}

fn join_output(
    joined: Result<std::io::Result<Vec<u8>>, tokio::task::JoinError>,
) -> Result<Vec<u8>, CommandError> {
    joined
        .map_err(|e| CommandError::ReadFailed(std::io::Error::other(e)))?
        .map_err(CommandError::ReadFailed)
}

#[async_trait]
impl CommandExecutor for CommandRunner {
    async fn execute(
        &self,
        step: &CommandStep,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        Self::run_capturing_stdout(&step.program, &step.args, step.work_dir.as_deref(), timeout)
            .await
    }
}
