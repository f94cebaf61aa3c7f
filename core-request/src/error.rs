use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Why a fetch produced no usable payload.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Transport failure: {0}")]
    Transport(#[from] BridgeError),

    /// 404, or no recorded fixture for the request
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("HTTP {status} from {target}")]
    HttpStatus { status: u16, target: String },

    #[error("Empty payload from {0}")]
    EmptyPayload(String),

    #[error("Fixture is unreadable: {0}")]
    CorruptFixture(String),

    /// The fetch task ended without reporting back
    #[error("Request was abandoned before completing")]
    Abandoned,
}

impl RequestError {
    pub fn is_not_found(&self) -> bool {
        match self {
            RequestError::NotFound(_) => true,
            RequestError::HttpStatus { status, .. } => *status == 404,
            RequestError::Transport(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RequestError>;
