use crate::domain::ports::DocumentStore;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::error;

/// One pretty-printed `<collection>.json` file per collection. Writes go to
/// a temporary file that is then renamed over the old one.
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, AppError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Store(format!("cannot create {}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.dir.join(format!("{}.json", collection))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, AppError> {
        let path = self.path_for(collection);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) if text.trim().is_empty() => Ok(Vec::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                Err(AppError::Store(format!("cannot read {}: {}", collection, e)))
            }
        }
    }

    async fn write_all(&self, collection: &str, documents: &[Value]) -> Result<(), AppError> {
        let path = self.path_for(collection);
        let tmp = self.dir.join(format!(".{}.json.tmp", collection));
        let body = serde_json::to_vec_pretty(documents)?;

        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| AppError::Store(format!("cannot write {}: {}", collection, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| AppError::Store(format!("cannot replace {}: {}", collection, e)))?;
        Ok(())
    }
}
