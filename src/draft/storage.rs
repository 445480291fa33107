use std::collections::HashMap;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use tokio::sync::RwLock;
use super::errors::StorageError;

/// 键值存储适配器 - 草稿落盘的唯一出口
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// 读取，不存在时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// 写入，覆盖旧值
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// 删除，不存在也算成功
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// 文件存储：目录下每个键一个 `<key>.json`
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        // 先写临时文件再替换，避免半截内容
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").await.unwrap(), None);

        storage.set("k", "one").await.unwrap();
        storage.set("k", "two").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("two"));

        storage.delete("k").await.unwrap();
        storage.delete("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("nested"));

        assert_eq!(storage.get("video-upload-draft").await.unwrap(), None);
        storage.set("video-upload-draft", "{}").await.unwrap();
        assert!(dir.path().join("nested/video-upload-draft.json").exists());
        assert_eq!(storage.get("video-upload-draft").await.unwrap().as_deref(), Some("{}"));

        storage.delete("video-upload-draft").await.unwrap();
        storage.delete("video-upload-draft").await.unwrap();
        assert_eq!(storage.get("video-upload-draft").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path());

        assert!(matches!(storage.set("../escape", "x").await, Err(StorageError::InvalidKey(_))));
        assert!(matches!(storage.get("").await, Err(StorageError::InvalidKey(_))));
    }
}
