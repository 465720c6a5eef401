//! 工作区分配与释放
//!
//! 每个部署请求独占一个 `<root>/repo-<uuid>` 目录

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// 工作区目录名前缀
const WORKSPACE_PREFIX: &str = "repo-";

/// 工作区清理策略
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    /// 保留工作区（默认）
    #[default]
    Retain,
    /// 流水线结束后删除工作区
    Delete,
}

impl CleanupPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" | "keep" => Some(CleanupPolicy::Retain),
            "delete" | "remove" => Some(CleanupPolicy::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupPolicy::Retain => "retain",
            CleanupPolicy::Delete => "delete",
        }
    }
}

/// 单次请求的工作区
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Workspace {
    id: String,
    path: PathBuf,
}

impl Workspace {
    /// 工作区标识（uuid）
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 项目目录 = 工作区 / 相对路径
    ///
    /// 纯路径拼接，不检查是否存在
    pub fn project_dir(&self, project_path: &str) -> PathBuf {
        self.path.join(project_path)
    }

    /// 按策略释放工作区
    ///
    /// 删除失败只记录日志
    pub async fn release(&self, policy: CleanupPolicy) {
        match policy {
            CleanupPolicy::Retain => {
                debug!(workspace = %self.path.display(), "Retaining workspace");
            }
            CleanupPolicy::Delete => match tokio::fs::remove_dir_all(&self.path).await {
                Ok(()) => debug!(workspace = %self.path.display(), "Workspace removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(workspace = %self.path.display(), error = %e, "Failed to remove workspace");
                }
            },
        }
    }
}

/// 工作区分配器
#[derive(Clone, Debug)]
pub struct WorkspaceProvisioner {
    root: PathBuf,
}

impl WorkspaceProvisioner {
    /// 相对路径按当前进程工作目录转为绝对路径
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: absolute_root(root.into()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 分配新的工作区路径
    ///
    /// 不创建目录；目录由 clone 步骤创建。唯一性依赖 v4 uuid
    pub fn allocate(&self) -> Workspace {
        let id = uuid::Uuid::new_v4().to_string();
        let path = self.root.join(format!("{}{}", WORKSPACE_PREFIX, id));
        Workspace { id, path }
    }
}

/// 将工作区根目录转为绝对路径
///
/// clone 在进程工作目录下执行，其余步骤在项目目录下执行，
/// 两者看到的必须是同一个路径
pub fn absolute_root(root: PathBuf) -> PathBuf {
    if root.is_absolute() {
        return root;
    }
    match std::path::absolute(&root) {
        Ok(abs) => abs,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "Failed to resolve workspace root");
            root
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_allocate_is_rooted_and_not_created() {
        let provisioner = WorkspaceProvisioner::new("/tmp");
        let ws = provisioner.allocate();

        assert!(ws.path().starts_with("/tmp"));
        let leaf = ws.path().file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(leaf, format!("repo-{}", ws.id()));
        assert!(!ws.path().exists());
    }

    #[test]
    fn test_allocate_unique() {
        let provisioner = WorkspaceProvisioner::new("/tmp");
        let paths: HashSet<PathBuf> = (0..1000)
            .map(|_| provisioner.allocate().path().to_path_buf())
            .collect();
        assert_eq!(paths.len(), 1000);
    }

    #[test]
    fn test_relative_root_becomes_absolute() {
        let provisioner = WorkspaceProvisioner::new("scratch");
        let expected = std::env::current_dir().unwrap().join("scratch");

        assert_eq!(provisioner.root(), expected);
        let ws = provisioner.allocate();
        assert!(ws.path().is_absolute());
        assert!(ws.project_dir("app").is_absolute());
    }

    #[test]
    fn test_project_dir_join() {
        let provisioner = WorkspaceProvisioner::new("/scratch");
        let ws = provisioner.allocate();
        assert_eq!(ws.project_dir("src/App"), ws.path().join("src").join("App"));
    }

    #[test]
    fn test_cleanup_policy_from_str() {
        assert_eq!(CleanupPolicy::from_str("delete"), Some(CleanupPolicy::Delete));
        assert_eq!(CleanupPolicy::from_str(" Retain "), Some(CleanupPolicy::Retain));
        assert_eq!(CleanupPolicy::from_str("sometimes"), None);
    }

    #[tokio::test]
    async fn test_release_delete_removes_tree() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceProvisioner::new(root.path()).allocate();
        std::fs::create_dir_all(ws.path().join("app")).unwrap();
        std::fs::write(ws.path().join("app/Program.cs"), "class P {}").unwrap();

        ws.release(CleanupPolicy::Delete).await;
        assert!(!ws.path().exists());

        // 目录不存在时不报错
        ws.release(CleanupPolicy::Delete).await;
    }

    #[tokio::test]
    async fn test_release_retain_keeps_tree() {
        let root = tempfile::tempdir().unwrap();
        let ws = WorkspaceProvisioner::new(root.path()).allocate();
        std::fs::create_dir_all(ws.path()).unwrap();

        ws.release(CleanupPolicy::Retain).await;
        assert!(ws.path().exists());
    }
}
