//! Failure taxonomy shared by the transport, provider and client layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response from server")]
    InvalidResponse,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("No internet connection")]
    NoConnectivity,

    #[error("Server responded with status {status}")]
    ServerError { status: u16, body: Option<Vec<u8>> },

    #[error("Unclassified failure: {0}")]
    Unclassified(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl WeatherError {
    /// Whether re-invoking the same fetch later could succeed.
    ///
    /// The library never retries on its own; this is a hint for callers.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NoConnectivity => true,
            Self::ServerError { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Response body of a server error, lossily decoded as UTF-8.
    pub fn server_body_text(&self) -> Option<String> {
        match self {
            Self::ServerError { body: Some(body), .. } => {
                Some(String::from_utf8_lossy(body).into_owned())
            }
            _ => None,
        }
    }
}
