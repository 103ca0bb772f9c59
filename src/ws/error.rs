#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

use super::attempt::StopRetry;

/// WebSocket-specific error variants, covering the connection-attempt and
/// retry paths. `Transport`, `ParamsTimeout`, and `ConnectionTimeout` are
/// non-terminal and drive a retry; `ParamsThrow`, `CloseByServerFatal`, and
/// `RetriesExhausted` are terminal and move the socket to `Disconnected`.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// The transport failed to open or was closed unexpectedly.
    Transport(tokio_tungstenite::tungstenite::Error),
    /// The params provider did not resolve within `params_timeout`.
    ParamsTimeout,
    /// The transport did not open within `connection_timeout`.
    ConnectionTimeout,
    /// The params provider returned a terminal [`StopRetry`] sentinel.
    ParamsThrow(StopRetry),
    /// The server closed with a close code not eligible for reconnection.
    CloseByServerFatal { code: u16, reason: String },
    /// `max_retries` was reached without a successful reconnection.
    RetriesExhausted,
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "WebSocket transport error: {e}"),
            Self::ParamsTimeout => write!(f, "timed out waiting for connection params"),
            Self::ConnectionTimeout => write!(f, "timed out waiting for the connection to open"),
            Self::ParamsThrow(_) => write!(f, "params provider requested the socket stop retrying"),
            Self::CloseByServerFatal { code, reason } => {
                write!(f, "server closed with fatal code {code}: {reason}")
            }
            Self::RetriesExhausted => write!(f, "exhausted all reconnection attempts"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Transport(e))
    }
}

impl WsError {
    /// Whether this error is terminal (no further reconnection attempts
    /// should be made) as opposed to one that should drive the retry path.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ParamsThrow(_) | Self::CloseByServerFatal { .. } | Self::RetriesExhausted
        )
    }
}
