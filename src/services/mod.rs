//! 服务层模块
//!
//! 部署编排

pub mod deploy;
