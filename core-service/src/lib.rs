//! Core service façade.
//!
//! Wires host-provided bridges (HTTP, filesystem, lifecycle) into the photo
//! browser core: a [`PhotoBrowserService`] built from a
//! [`CoreConfig`](core_runtime::config::CoreConfig) searches, pages through
//! and caches results, fetches thumbnails and keeps the favorites list.
//! Desktop hosts typically enable the `desktop-shims` feature, which fills in
//! `bridge-desktop` implementations for any bridge left unset.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::{CoreConfig, SearchApiConfig};
//! use core_service::PhotoBrowserService;
//!
//! let config = CoreConfig::builder()
//!     .search_api(SearchApiConfig::from_env()?)
//!     .build()?;
//! let core = PhotoBrowserService::new(config).await?;
//!
//! core.search("Cats").await?;
//! core.prefetch(120).await?;
//! println!("{} results", core.item_count().await);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod lifecycle;
pub mod service;

pub use error::{CoreError, Result};
pub use service::{PageFetch, PhotoBrowserService, PrefetchReport, ThumbnailFetch};
