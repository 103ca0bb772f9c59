#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod buffer;
pub mod clock;
pub mod config;
pub mod debug;
pub mod emitter;
pub mod env_signals;
pub mod error;
pub mod heartbeat;
pub mod retry;
pub mod socket;
pub mod status;
pub mod ui;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub use buffer::{Buffer, BufferPolicy, Payload};
pub use clock::{Clock, SystemClock, TimerHandle};
pub use config::SocketOptions;
pub use debug::DebugLogger;
pub use emitter::{Emitter, Subscription};
pub use env_signals::{EnvironmentSignals, NoopEnvironmentSignals};
pub use heartbeat::HeartbeatOptions;
pub use retry::{RetryConfig, RetryPolicy};
pub use socket::{Event, LostConnectionState, Socket};
pub use status::{BinaryType, ReadyState, Status};
pub use ui::SocketContext;
pub use ws::{CloseCodes, NoParams, ParamsProvider, StopRetry, Transport, TransportEvent, TransportFactory, UrlBuilder, WsError};
#[cfg(any(test, feature = "test-util"))]
pub use ws::testing;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn socket_is_constructible_with_default_options() {
        let socket = Socket::new("ws://127.0.0.1:0/", SocketOptions::default());
        assert_eq!(socket.status(), Status::Connecting);
    }
}
