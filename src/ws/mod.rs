//! WebSocket-specific plumbing: the pluggable transport seam, per-attempt
//! sequencing, and WS error variants. The socket lifecycle state machine
//! itself lives in [`crate::socket`], which composes these with
//! [`crate::retry`], [`crate::heartbeat`], and [`crate::buffer`].
//!
//! # Architecture
//!
//! - [`attempt`]: resolves connection params, composes the URL, and owns
//!   the per-attempt timeout budget.
//! - [`transport`]: abstracts the actual socket (`tokio-tungstenite` in
//!   production) behind an object-safe trait so `socket.rs` never imports a
//!   transport crate directly.
//! - [`error`]: the WS-specific error taxonomy that funnels into
//!   [`crate::error::Error`].

pub mod attempt;
pub mod error;
pub mod transport;

pub use attempt::{CloseCodes, NoParams, ParamsProvider, StopRetry, UrlBuilder};
pub use error::WsError;
pub use transport::{Transport, TransportEvent, TransportFactory};

/// A scripted [`Transport`] for tests that don't want a real socket.
/// Gated behind the `test-util` feature so integration tests outside this
/// crate (`tests/socket.rs`) can reach it without shipping it in normal
/// builds.
#[cfg(any(test, feature = "test-util"))]
pub use transport::testing;
