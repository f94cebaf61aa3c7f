//! Fixture replay transport
//!
//! Serves recorded responses from a directory instead of the network:
//!
//! - `{term}-P{page}.json` holds the listing envelope for one page
//! - `{term}-I{page}.json` maps each absolute image URL on that page to its
//!   base64-encoded bytes
//!
//! A missing file, or a URL missing from an image archive, is reported as
//! [`RequestError::NotFound`], the same way the live transport reports a 404.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use tracing::debug;

use crate::descriptor::{Target, TargetArgs};
use crate::error::{RequestError, Result};
use crate::transport::Transport;

pub struct FixtureTransport {
    fs: Arc<dyn FileSystemAccess>,
    directory: PathBuf,
}

impl FixtureTransport {
    pub fn new(fs: Arc<dyn FileSystemAccess>, directory: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn listing_key(search_term: &str, page: u32) -> String {
        format!("{}-P{}.json", search_term, page)
    }

    pub fn image_archive_key(search_term: &str, page: u32) -> String {
        format!("{}-I{}.json", search_term, page)
    }

    async fn read_fixture(&self, key: &str) -> Result<Bytes> {
        let path = self.directory.join(key);
        debug!(fixture = %key, "Reading recorded response");

        self.fs.read_file(&path).await.map_err(|e| {
            if e.is_not_found() {
                RequestError::NotFound(key.to_string())
            } else {
                RequestError::Transport(e)
            }
        })
    }

    async fn read_image(&self, key: &str, url: &str) -> Result<Bytes> {
        let raw = self.read_fixture(key).await?;
        let archive: HashMap<String, String> = serde_json::from_slice(&raw)
            .map_err(|e| RequestError::CorruptFixture(format!("{}: {}", key, e)))?;

        let encoded = archive
            .get(url)
            .ok_or_else(|| RequestError::NotFound(format!("{} in {}", url, key)))?;

        STANDARD
            .decode(encoded)
            .map(Bytes::from)
            .map_err(|e| RequestError::CorruptFixture(format!("{} in {}: {}", url, key, e)))
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn fetch(&self, target: &Target, args: &TargetArgs) -> Result<Bytes> {
        match args {
            TargetArgs::Listing { search_term, page } => {
                self.read_fixture(&Self::listing_key(search_term, *page))
                    .await
            }
            TargetArgs::Thumbnail {
                search_term, page, ..
            } => {
                self.read_image(&Self::image_archive_key(search_term, *page), target.url())
                    .await
            }
        }
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::TokioFileSystem;

    const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../core-library/tests/fixtures");
    const FIRST_IMAGE: &str = "https://live.staticflickr.com/65535/48070001000_27d511c528_m.jpg";

    fn transport() -> FixtureTransport {
        let scratch = std::env::temp_dir();
        let fs = TokioFileSystem::with_directories(scratch.clone(), scratch);
        FixtureTransport::new(Arc::new(fs), FIXTURES)
    }

    fn listing(page: u32) -> TargetArgs {
        TargetArgs::Listing {
            search_term: "Cats".to_string(),
            page,
        }
    }

    fn thumbnail(url: &str) -> TargetArgs {
        TargetArgs::Thumbnail {
            search_term: "Cats".to_string(),
            page: 1,
            index: 0,
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_keys() {
        assert_eq!(FixtureTransport::listing_key("Cats", 3), "Cats-P3.json");
        assert_eq!(FixtureTransport::image_archive_key("Cats", 1), "Cats-I1.json");
    }

    #[tokio::test]
    async fn test_replays_listing_page() {
        let body = transport()
            .fetch(&Target::new("ignored"), &listing(2))
            .await
            .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["stat"], "ok");
        assert_eq!(json["photos"]["page"], 2);
    }

    #[tokio::test]
    async fn test_missing_page_is_not_found() {
        let err = transport()
            .fetch(&Target::new("ignored"), &listing(9))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_replays_image_by_url() {
        let body = transport()
            .fetch(&Target::new(FIRST_IMAGE), &thumbnail(FIRST_IMAGE))
            .await
            .unwrap();

        assert_eq!(&body[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn test_unknown_image_url_is_not_found() {
        let url = "https://live.staticflickr.com/1/nope_m.jpg";
        let err = transport()
            .fetch(&Target::new(url), &thumbnail(url))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_corrupt_image_archive() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dogs-I1.json"), b"[1, 2").unwrap();

        let fs = TokioFileSystem::with_directories(dir.path().into(), dir.path().into());
        let transport = FixtureTransport::new(Arc::new(fs), dir.path());
        let args = TargetArgs::Thumbnail {
            search_term: "Dogs".to_string(),
            page: 1,
            index: 0,
            url: Some(FIRST_IMAGE.to_string()),
        };

        assert!(matches!(
            transport.fetch(&Target::new(FIRST_IMAGE), &args).await,
            Err(RequestError::CorruptFixture(_))
        ));
    }
}
