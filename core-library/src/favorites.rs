//! Favorites store
//!
//! An insertion-ordered list of photo copies with a JSON archive on disk.
//! The store holds its own copies: later thumbnail updates in the result
//! cache do not reach a favorited photo, and the reverse.

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{LibraryError, Result};
use crate::models::{Photo, PhotoId};

/// Outcome of [`FavoritesStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The list already had items; nothing was read.
    Skipped,
    /// No archive exists yet.
    Missing,
    /// The list was replaced by this many archived items.
    Restored(usize),
}

/// Outcome of [`FavoritesStore::save`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The list was empty; any existing archive was left alone.
    Skipped,
    /// This many items were written.
    Saved(usize),
}

pub struct FavoritesStore {
    items: Vec<Photo>,
    fs: Arc<dyn FileSystemAccess>,
    archive_path: PathBuf,
}

impl FavoritesStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            items: Vec::new(),
            fs,
            archive_path: archive_path.into(),
        }
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Append a copy of `photo`. Duplicates are allowed.
    pub fn add(&mut self, photo: Photo) {
        debug!(photo_id = %photo.id, "Adding favorite");
        self.items.push(photo);
    }

    /// Remove every entry with `id`; returns how many were removed.
    pub fn remove(&mut self, id: &PhotoId) -> usize {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        let removed = before - self.items.len();
        debug!(photo_id = %id, removed, "Removed favorite");
        removed
    }

    pub fn exists(&self, id: &PhotoId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    pub fn list(&self) -> &[Photo] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&Photo> {
        self.items.get(index)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop the in-memory list. The archive is untouched.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Write the list to the archive, replacing it atomically.
    ///
    /// An empty list is never written, so a session that never restored
    /// its favorites cannot wipe a saved archive.
    pub async fn save(&self) -> Result<SaveOutcome> {
        if self.items.is_empty() {
            debug!("Favorites empty; archive left untouched");
            return Ok(SaveOutcome::Skipped);
        }

        let json = serde_json::to_vec(&self.items)?;
        self.fs
            .replace_file(&self.archive_path, Bytes::from(json))
            .await?;

        info!(count = self.items.len(), "Saved favorites archive");
        Ok(SaveOutcome::Saved(self.items.len()))
    }

    /// Replace the list with the archived one, but only while empty.
    ///
    /// A corrupt archive is reported as [`LibraryError::CorruptArchive`]
    /// and leaves the list empty.
    pub async fn load(&mut self) -> Result<LoadOutcome> {
        if !self.items.is_empty() {
            debug!(count = self.items.len(), "Favorites already loaded");
            return Ok(LoadOutcome::Skipped);
        }

        let data = match self.fs.read_file(&self.archive_path).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                debug!("No favorites archive yet");
                return Ok(LoadOutcome::Missing);
            }
            Err(e) => return Err(LibraryError::Bridge(e)),
        };

        let items: Vec<Photo> = serde_json::from_slice(&data).map_err(|e| {
            warn!(error = %e, "Favorites archive could not be decoded");
            LibraryError::CorruptArchive(e.to_string())
        })?;

        info!(count = items.len(), "Restored favorites archive");
        self.items = items;
        Ok(LoadOutcome::Restored(self.items.len()))
    }
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore")
            .field("count", &self.items.len())
            .field("archive_path", &self.archive_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::storage::FileMetadata;
    use mockall::mock;

    mock! {
        FileSystem {}

        #[async_trait]
        impl FileSystemAccess for FileSystem {
            async fn get_cache_directory(&self) -> BridgeResult<PathBuf>;
            async fn get_data_directory(&self) -> BridgeResult<PathBuf>;
            async fn exists(&self, path: &Path) -> BridgeResult<bool>;
            async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata>;
            async fn create_dir_all(&self, path: &Path) -> BridgeResult<()>;
            async fn read_file(&self, path: &Path) -> BridgeResult<Bytes>;
            async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()>;
            async fn replace_file(&self, path: &Path, data: Bytes) -> BridgeResult<()>;
            async fn delete_file(&self, path: &Path) -> BridgeResult<()>;
            async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>>;
        }
    }

    fn store(fs: MockFileSystem) -> FavoritesStore {
        FavoritesStore::new(Arc::new(fs), "/docs/FavoritesList.json")
    }

    #[test]
    fn test_duplicates_added_and_removed_together() {
        let mut favorites = store(MockFileSystem::new());
        let id = PhotoId::new("48071474457");

        favorites.add(Photo::new("1"));
        favorites.add(Photo::new("48071474457"));
        favorites.add(Photo::new("48071474457").with_title("same id, other title"));
        assert_eq!(favorites.count(), 3);
        assert!(favorites.exists(&id));

        assert_eq!(favorites.remove(&id), 2);
        assert!(!favorites.exists(&id));
        assert_eq!(favorites.count(), 1);
        assert_eq!(favorites.remove(&id), 0);
    }

    #[test]
    fn test_get_by_position() {
        let mut favorites = store(MockFileSystem::new());
        favorites.add(Photo::new("a"));
        favorites.add(Photo::new("b"));

        assert_eq!(favorites.get(1).map(|p| p.id.as_str()), Some("b"));
        assert!(favorites.get(2).is_none());
        assert_eq!(favorites.list().len(), 2);
    }

    #[tokio::test]
    async fn test_save_empty_does_not_touch_archive() {
        let mut fs = MockFileSystem::new();
        fs.expect_replace_file().never();
        let favorites = store(fs);

        assert_eq!(favorites.save().await.unwrap(), SaveOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_save_replaces_archive_atomically() {
        let mut fs = MockFileSystem::new();
        fs.expect_replace_file()
            .withf(|path, _| path == Path::new("/docs/FavoritesList.json"))
            .times(1)
            .returning(|_, data| {
                let items: Vec<Photo> = serde_json::from_slice(&data).unwrap();
                assert_eq!(items.len(), 2);
                Ok(())
            });
        let mut favorites = store(fs);
        favorites.add(Photo::new("a"));
        favorites.add(Photo::new("b"));

        assert_eq!(favorites.save().await.unwrap(), SaveOutcome::Saved(2));
    }

    #[tokio::test]
    async fn test_save_failure_is_reported() {
        let mut fs = MockFileSystem::new();
        fs.expect_replace_file()
            .returning(|_, _| Err(BridgeError::OperationFailed("disk full".to_string())));
        let mut favorites = store(fs);
        favorites.add(Photo::new("a"));

        assert!(matches!(
            favorites.save().await,
            Err(LibraryError::Bridge(_))
        ));
        assert_eq!(favorites.count(), 1);
    }

    #[tokio::test]
    async fn test_load_skipped_when_not_empty() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_file().never();
        let mut favorites = store(fs);
        favorites.add(Photo::new("a"));

        assert_eq!(favorites.load().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(favorites.count(), 1);
    }

    #[tokio::test]
    async fn test_load_missing_archive() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_file()
            .returning(|path| Err(BridgeError::NotFound(path.display().to_string())));
        let mut favorites = store(fs);

        assert_eq!(favorites.load().await.unwrap(), LoadOutcome::Missing);
        assert!(favorites.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_archive_leaves_list_empty() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_file()
            .returning(|_| Ok(Bytes::from_static(b"[{\"title\": \"no id\"}")));
        let mut favorites = store(fs);

        assert!(matches!(
            favorites.load().await,
            Err(LibraryError::CorruptArchive(_))
        ));
        assert!(favorites.is_empty());
    }

    #[tokio::test]
    async fn test_load_restores_archived_items() {
        let mut fs = MockFileSystem::new();
        fs.expect_read_file().returning(|_| {
            Ok(Bytes::from_static(
                br#"[{"id":"1","title":"one","imageThumbnailData":"AQID"},{"id":"2"}]"#,
            ))
        });
        let mut favorites = store(fs);

        assert_eq!(favorites.load().await.unwrap(), LoadOutcome::Restored(2));
        assert_eq!(favorites.get(0).unwrap().title(), Some("one"));
        assert_eq!(
            favorites.get(0).unwrap().thumbnail,
            Some(Bytes::from_static(&[1, 2, 3]))
        );
    }
}
