//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`, with atomic replace via rename
//! - `LifecycleObserver` driven by the host through a watch channel
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//!
//! #[tokio::main]
//! async fn main() {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!
//!     // Inject into CoreConfig::builder()
//! }
//! ```

mod filesystem;
mod http;
mod lifecycle;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use lifecycle::ChannelLifecycleObserver;
