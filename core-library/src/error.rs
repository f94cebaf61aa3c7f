use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Remote service reported failure (code {code:?}): {message}")]
    RemoteStatus { code: Option<i64>, message: String },

    #[error("Listing envelope has no photos object")]
    MissingPage,

    #[error("Page {received} arrived out of order; expected page {expected}")]
    OutOfOrder { expected: u32, received: u32 },

    #[error("Favorites archive is corrupt: {0}")]
    CorruptArchive(String),
}

impl LibraryError {
    /// Whether the failure came from the payload rather than from storage.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            LibraryError::Decode(_)
                | LibraryError::RemoteStatus { .. }
                | LibraryError::MissingPage
                | LibraryError::OutOfOrder { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
