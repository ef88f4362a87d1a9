//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] nevars_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] nevars_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] nevars_types::Error),

    #[error("Meter not connected")]
    NotConnected,

    #[error("Invalid response from meter: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Core error carried by this error, if any
    pub fn as_core(&self) -> Option<&nevars_core::Error> {
        match self {
            Self::Core(e) => Some(e),
            _ => None,
        }
    }
}
