//! # Core Configuration Module
//!
//! Provides configuration management for the photo browser core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all necessary dependencies and settings for the core library.
//! It enforces fail-fast validation to ensure all required bridges are provided
//! before initialization.
//!
//! ## Dependencies
//!
//! - `FileSystemAccess` - Required for the favorites archive and fixture replay
//!   (desktop default: tokio fs)
//! - `HttpClient` - Required in [`TransportMode::Live`] (desktop default: reqwest)
//! - `LifecycleObserver` - App lifecycle (optional)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `FileSystemAccess` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, SearchApiConfig, TransportMode};
//!
//! let config = CoreConfig::builder()
//!     .search_api(SearchApiConfig::from_env()?)
//!     .transport_mode(TransportMode::Live)
//!     .build()?;
//! ```
//!
//! Replaying recorded fixtures needs no network bridge:
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .transport_mode(TransportMode::fixture("tests/fixtures"))
//!     .file_system(Arc::new(MyFileSystem))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::redact_if_sensitive;
use bridge_traits::{FileSystemAccess, HttpClient, LifecycleObserver};
use std::path::PathBuf;
use std::sync::Arc;

/// Number of results the remote API returns per listing page.
pub const RESULTS_PER_PAGE: u32 = 50;

/// Default REST endpoint of the search API.
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.flickr.com/services/rest/";

/// Environment variable holding the search API key.
pub const API_KEY_ENV: &str = "PHOTO_SEARCH_API_KEY";

/// Environment variable overriding the search API base URL.
pub const BASE_URL_ENV: &str = "PHOTO_SEARCH_BASE_URL";

/// File name of the favorites archive inside the data directory.
pub const FAVORITES_FILE_NAME: &str = "FavoritesList.json";

const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

/// Where fetched bytes come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TransportMode {
    /// Fetch over the network through the injected `HttpClient`.
    #[default]
    Live,
    /// Replay recorded files from `directory`.
    Fixture { directory: PathBuf },
}

impl TransportMode {
    pub fn fixture(directory: impl Into<PathBuf>) -> Self {
        TransportMode::Fixture {
            directory: directory.into(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, TransportMode::Live)
    }
}

/// Remote search API settings.
///
/// # Security Note
///
/// The API key should never be hardcoded in the binary. Load it from the
/// environment ([`SearchApiConfig::from_env`]) or the host's secure
/// configuration, and only log it through
/// [`redact_if_sensitive`](crate::logging::redact_if_sensitive).
#[derive(Clone, PartialEq, Eq)]
pub struct SearchApiConfig {
    /// REST endpoint, without query string
    pub base_url: String,

    /// API key sent with every listing request
    pub api_key: Option<String>,

    /// Results per page; must equal [`RESULTS_PER_PAGE`]
    pub page_size: u32,
}

impl std::fmt::Debug for SearchApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchApiConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_key",
                &self
                    .api_key
                    .as_deref()
                    .map(|key| redact_if_sensitive("api_key", key)),
            )
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl Default for SearchApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            api_key: None,
            page_size: RESULTS_PER_PAGE,
        }
    }
}

impl SearchApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `PHOTO_SEARCH_API_KEY` and, if set, `PHOTO_SEARCH_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            Error::Config(format!(
                "{} is not set. Export the search API key or use fixture mode.",
                API_KEY_ENV
            ))
        })?;

        let mut config = Self::new().with_api_key(api_key);
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config = config.with_base_url(base_url);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("Search API base URL cannot be empty".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "Search API base URL must be http(s): {}",
                self.base_url
            )));
        }

        if let Some(ref key) = self.api_key {
            if key.is_empty() {
                return Err(Error::Config("Search API key cannot be empty".to_string()));
            }
        }

        // Flat index math assumes fixed-size pages.
        if self.page_size != RESULTS_PER_PAGE {
            return Err(Error::Config(format!(
                "Page size must be {} (got {})",
                RESULTS_PER_PAGE, self.page_size
            )));
        }

        Ok(())
    }
}

/// Core configuration for the photo browser core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Live network or recorded fixtures
    pub transport_mode: TransportMode,

    /// Remote search API settings
    pub search_api: SearchApiConfig,

    /// Explicit favorites archive location; `None` means
    /// `<data dir>/FavoritesList.json`
    pub favorites_path: Option<PathBuf>,

    /// HTTP client (required in live mode)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// File system access abstraction (required)
    pub file_system: Arc<dyn FileSystemAccess>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Capacity of the event bus
    pub event_buffer_size: usize,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("transport_mode", &self.transport_mode)
            .field("search_api", &self.search_api)
            .field("favorites_path", &self.favorites_path)
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .field("event_buffer_size", &self.event_buffer_size)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Search API settings are well formed
    /// - Live mode has an HTTP client and an API key
    /// - Fixture mode names a directory
    /// - The event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        self.search_api.validate()?;

        match &self.transport_mode {
            TransportMode::Live => {
                if self.http_client.is_none() {
                    return Err(http_client_missing_error());
                }
                if !self.search_api.has_api_key() {
                    return Err(Error::Config(format!(
                        "Live transport requires a search API key. Set {} or call \
                         SearchApiConfig::with_api_key().",
                        API_KEY_ENV
                    )));
                }
            }
            TransportMode::Fixture { directory } => {
                if directory.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "Fixture directory cannot be empty".to_string(),
                    ));
                }
            }
        }

        if let Some(ref path) = self.favorites_path {
            if path.as_os_str().is_empty() {
                return Err(Error::Config("Favorites path cannot be empty".to_string()));
            }
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn http_client_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "HttpClient implementation is required for live transport. \
                 Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
                 Mobile: inject a platform-native HTTP client. \
                 Tests: use TransportMode::Fixture."
            .to_string(),
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn file_system_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required for the favorites archive. \
                 Desktop: enable the 'desktop-shims' feature to use the default TokioFileSystem. \
                 Mobile: inject sandboxed document storage."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(mode: &TransportMode) -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    if !mode.is_live() {
        return Ok(None);
    }

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Internal(format!("Failed to create default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_mode: &TransportMode) -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(file_system_missing_error())
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Call [`build()`](CoreConfigBuilder::build) to validate and create the
/// final config.
#[derive(Default)]
pub struct CoreConfigBuilder {
    transport_mode: Option<TransportMode>,
    search_api: Option<SearchApiConfig>,
    favorites_path: Option<PathBuf>,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the transport mode.
    ///
    /// Default: [`TransportMode::Live`]
    pub fn transport_mode(mut self, mode: TransportMode) -> Self {
        self.transport_mode = Some(mode);
        self
    }

    /// Sets the search API configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::{CoreConfig, SearchApiConfig};
    ///
    /// let builder = CoreConfig::builder()
    ///     .search_api(SearchApiConfig::new().with_api_key("key"));
    /// ```
    pub fn search_api(mut self, config: SearchApiConfig) -> Self {
        self.search_api = Some(config);
        self
    }

    /// Sets an explicit favorites archive path.
    pub fn favorites_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.favorites_path = Some(path.into());
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used in
    /// live mode when the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the lifecycle observer implementation (optional).
    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 256
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error if:
    /// - Required bridges are missing (FileSystemAccess, HttpClient in live mode)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<CoreConfig> {
        let transport_mode = self.transport_mode.unwrap_or_default();

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client(&transport_mode)?,
        };

        let config = CoreConfig {
            transport_mode,
            search_api: self.search_api.unwrap_or_default(),
            favorites_path: self.favorites_path,
            http_client,
            file_system,
            lifecycle_observer: self.lifecycle_observer,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}
