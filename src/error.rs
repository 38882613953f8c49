use std::{error, fmt};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by graincloud.
#[derive(Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    SourceError(String),
    ParameterError(String),
    SendError(String),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceError(str) => write!(f, "Invalid audio source: {str}"),
            Self::ParameterError(str) => write!(f, "Invalid parameter: {str}"),
            Self::SendError(str) => write!(f, "Failed to send engine message: {str}"),
        }
    }
}
