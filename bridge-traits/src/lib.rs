//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the photo browser core and
//! platform-specific implementations. Each trait represents a capability that
//! the core requires but that must be provided differently per host (desktop
//! shell, mobile shell, test harness).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for fixtures and the favorites archive
//!
//! ### Platform Integration
//! - [`LifecycleObserver`](lifecycle::LifecycleObserver) - App foreground/background transitions
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! Desktop implementations live in `bridge-desktop`. Tests usually mock
//! these traits with `mockall` or use the desktop versions over a temporary
//! directory.
//!
//! ## Errors
//!
//! Every trait returns [`BridgeError`](error::BridgeError). A missing file
//! must come back as [`BridgeError::NotFound`] so the favorites store and
//! the fixture transport can tell "nothing recorded yet" apart from an I/O
//! failure.
//!
//! All traits are `Send + Sync`; the core holds them as `Arc<dyn Trait>`.

pub mod error;
pub mod http;
pub mod lifecycle;
pub mod logging;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use lifecycle::{LifecycleChangeStream, LifecycleObserver, LifecycleState};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use storage::{FileMetadata, FileSystemAccess};
