//! 基础设施模块
//!
//! 封装外部依赖（子进程执行）

pub mod command;

pub use command::{CommandError, CommandExecutor, CommandOutput, CommandRunner};
