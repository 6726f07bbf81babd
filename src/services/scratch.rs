// 请求级临时目录：UUID 命名。正常路径调用 `remove` 异步删除，
// 错误返回与 panic 展开时由 Drop 兜底。
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

const SCRATCH_DIR_NAME: &str = "doc2md_uploads";

#[derive(Debug)]
pub struct ScratchSpace {
    dir: PathBuf,
}

impl ScratchSpace {
    pub async fn create(root: Option<&str>) -> std::io::Result<Self> {
        let mut dir = scratch_root(root);
        dir.push(Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// 文件名由目录内部决定，不使用上传者提供的名字。
    pub fn input_path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("input{extension}"))
    }

    /// 在异步上下文中删除目录，之后 Drop 不再做任何事。
    pub async fn remove(mut self) {
        let dir = std::mem::take(&mut self.dir);
        if let Err(err) = tokio::fs::remove_dir_all(&dir).await {
            log_remove_failure(&dir, &err);
        }
    }
}

impl Drop for ScratchSpace {
    fn drop(&mut self) {
        if self.dir.as_os_str().is_empty() {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.dir) {
            log_remove_failure(&self.dir, &err);
        }
    }
}

fn log_remove_failure(dir: &Path, err: &std::io::Error) {
    if err.kind() != std::io::ErrorKind::NotFound {
        warn!("failed to remove scratch dir {}: {err}", dir.display());
    }
}

fn scratch_root(root: Option<&str>) -> PathBuf {
    match root.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => PathBuf::from(value),
        None => std::env::temp_dir().join(SCRATCH_DIR_NAME),
    }
}
