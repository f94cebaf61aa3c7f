//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

const APP_DIR: &str = "photo-browser";

/// Tokio-based file system implementation
///
/// Directories default to the platform cache/data locations with a
/// `photo-browser` subdirectory.
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    data_dir: PathBuf,
}

impl TokioFileSystem {
    /// Create a new file system accessor with default directories
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR);

        Self { cache_dir, data_dir }
    }

    /// Create a new file system accessor with custom directories
    pub fn with_directories(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self { cache_dir, data_dir }
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        if e.kind() == ErrorKind::NotFound {
            BridgeError::NotFound(path.display().to_string())
        } else {
            BridgeError::Io(e)
        }
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !fs::try_exists(dir)
            .await
            .map_err(|e| Self::map_io_error(dir, e))?
        {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Self::map_io_error(dir, e))?;
            debug!(path = ?dir, "Created directory");
        }
        Ok(())
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("replace"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    async fn write_and_rename(tmp_path: &Path, path: &Path, data: &Bytes) -> Result<()> {
        let mut file = fs::File::create(tmp_path)
            .await
            .map_err(|e| Self::map_io_error(tmp_path, e))?;
        file.write_all(data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(tmp_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| Self::map_io_error(tmp_path, e))?;
        drop(file);

        fs::rename(tmp_path, path)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        self.ensure_dir(&self.cache_dir).await?;
        Ok(self.cache_dir.clone())
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        self.ensure_dir(&self.data_dir).await?;
        Ok(self.data_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        Ok(FileMetadata {
            size: metadata.len(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
            is_directory: metadata.is_dir(),
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }

        fs::write(path, data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn replace_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.ensure_dir(parent).await?;
        }

        let tmp_path = Self::temp_path_for(path);
        if let Err(e) = Self::write_and_rename(&tmp_path, path, &data).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e);
        }

        debug!(path = ?path, size = data.len(), "Replaced file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, TokioFileSystem) {
        let dir = TempDir::new().unwrap();
        let fs = TokioFileSystem::with_directories(
            dir.path().join("cache"),
            dir.path().join("data"),
        );
        (dir, fs)
    }

    #[tokio::test]
    async fn test_directories_are_created_on_demand() {
        let (dir, fs) = scratch();

        let data_dir = fs.get_data_directory().await.unwrap();
        assert_eq!(data_dir, dir.path().join("data"));
        assert!(data_dir.is_dir());
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (dir, fs) = scratch();
        let path = dir.path().join("nested").join("file.txt");

        let data = Bytes::from("Hello, World!");
        fs.write_file(&path, data.clone()).await.unwrap();

        assert_eq!(fs.read_file(&path).await.unwrap(), data);
        assert_eq!(fs.metadata(&path).await.unwrap().size, 13);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let (dir, fs) = scratch();

        let err = fs
            .read_file(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_replace_file_overwrites_without_leftovers() {
        let (dir, fs) = scratch();
        let path = dir.path().join("FavoritesList.json");

        fs.replace_file(&path, Bytes::from("[1]")).await.unwrap();
        fs.replace_file(&path, Bytes::from("[1,2]")).await.unwrap();

        assert_eq!(fs.read_file(&path).await.unwrap(), Bytes::from("[1,2]"));
        let entries = fs.list_directory(dir.path()).await.unwrap();
        assert_eq!(entries, vec![path]);
    }

    #[tokio::test]
    async fn test_failed_replace_removes_temp_file() {
        let (dir, fs) = scratch();
        let path = dir.path().join("FavoritesList.json");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(fs.replace_file(&path, Bytes::from("[1]")).await.is_err());

        assert!(!TokioFileSystem::temp_path_for(&path).exists());
        assert!(path.is_dir());
    }
}
