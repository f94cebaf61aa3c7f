use bridge_traits::error::BridgeError;
use core_request::RejectReason;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Request error: {0}")]
    Request(#[from] core_request::RequestError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("No search is active")]
    NoActiveSearch,

    #[error("Search term is empty")]
    EmptySearchTerm,

    #[error("No cached item at index {0}")]
    NoItem(usize),

    #[error("Request was not dispatched: {0:?}")]
    NotDispatched(RejectReason),
}

pub type Result<T> = std::result::Result<T, CoreError>;
