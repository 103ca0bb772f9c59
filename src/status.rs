//! Socket lifecycle status and the standard WebSocket `readyState` mirror.
//!
//! `Status` is grounded on the teacher's `ws::connection::ConnectionState`
//! enum shape, generalized to the full transition table this crate
//! implements (connecting/connected/reconnecting/disconnected, with
//! `reconnecting` carrying the current [`crate::retry`] bookkeeping via the
//! socket core rather than on the enum itself, since the core owns the
//! single writer to the `watch` channel this type flows through).

/// Coarse lifecycle status, observable via `Socket::status()`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
}

impl Status {
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Status::Connected)
    }

    #[must_use]
    pub fn is_disconnected(self) -> bool {
        matches!(self, Status::Disconnected)
    }
}

/// Numeric ready state mirroring the standard WebSocket API, derivable from
/// [`Status`] for callers that want the familiar 0..3 values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl From<Status> for ReadyState {
    fn from(status: Status) -> Self {
        match status {
            Status::Connecting | Status::Reconnecting => ReadyState::Connecting,
            Status::Connected => ReadyState::Open,
            Status::Disconnected => ReadyState::Closed,
        }
    }
}

/// Mirrors the standard WebSocket API's `binaryType`. Purely descriptive in
/// this crate, since `Payload::Binary(Vec<u8>)` is the only representation
/// for a binary frame regardless of this setting; kept so a host ported
/// from that API has a place to store and read back its preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinaryType {
    #[default]
    Blob,
    ArrayBuffer,
}
