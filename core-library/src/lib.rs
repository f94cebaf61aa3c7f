//! # Photo Library Module
//!
//! Owns the in-memory state of the photo browser.
//!
//! ## Overview
//!
//! This module manages:
//! - The listing data model decoded from the remote search API
//! - The paginated result cache for the current search
//! - The favorites list and its JSON archive

pub mod cache;
pub mod error;
pub mod favorites;
pub mod models;

pub use cache::PageCache;
pub use error::{LibraryError, Result};
pub use favorites::{FavoritesStore, LoadOutcome, SaveOutcome};
pub use models::{Photo, PhotoId, PhotoListPage, ResultsEnvelope, RESULTS_PER_PAGE};
