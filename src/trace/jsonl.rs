//! JSON Lines 轨迹文件：每条记录一行，只追加

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{TraceRecord, TraceStore};
use crate::core::StoreError;

#[derive(Debug)]
pub struct JsonlTraceStore {
    path: PathBuf,
    /// 串行化并发追加，避免行交错
    write_lock: Mutex<()>,
}

impl JsonlTraceStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TraceStore for JsonlTraceStore {
    async fn append(&self, record: &TraceRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// 文件不存在时返回空；无法解析的行被跳过
    async fn list(&self) -> Result<Vec<TraceRecord>, StoreError> {
        let data = match fs::read_to_string(&self.path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(data
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| match serde_json::from_str::<TraceRecord>(l) {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::warn!("Skipping malformed trace line in {:?}: {}", self.path, e);
                    None
                }
            })
            .collect())
    }
}
