//! Aggregate socket configuration, mirroring the teacher's
//! `ws::config::Config` (a single struct collecting every sub-component's
//! settings with sensible defaults) generalized to every knob this crate's
//! Socket Core needs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::buffer::BufferPolicy;
use crate::clock::{Clock, SystemClock};
use crate::debug::DebugLogger;
use crate::env_signals::{EnvironmentSignals, NoopEnvironmentSignals};
use crate::heartbeat::HeartbeatOptions;
use crate::retry::RetryConfig;
use crate::status::BinaryType;
use crate::ws::attempt::{AttemptTimeouts, CloseCodes, NoParams, ParamsProvider, UrlBuilder};
use crate::ws::transport::{TokioTungsteniteTransportFactory, TransportFactory};

/// Aggregate configuration for a [`crate::socket::Socket`]. Build with
/// [`SocketOptions::builder`] or construct the struct directly — every
/// field has a spec-mandated default via [`Default`].
pub struct SocketOptions {
    pub protocols: Vec<String>,
    pub buffer_policy: BufferPolicy,
    pub heartbeat: HeartbeatOptions,
    pub retry: RetryConfig,
    pub attempt_timeouts: AttemptTimeouts,
    pub close_codes: CloseCodes,
    pub params: Arc<dyn ParamsProvider>,
    /// Overrides the default query-merge URL composition for every attempt.
    pub url_builder: Option<UrlBuilder>,
    /// Descriptive only: this crate always represents binary frames as
    /// `Payload::Binary(Vec<u8>)`, so there is no behavior to switch. Kept so
    /// a host translating from the standard WebSocket API has somewhere to
    /// put its `binaryType` preference and read it back via
    /// `Socket::binary_type`.
    pub binary_type: BinaryType,
    pub environment_signals: Arc<dyn EnvironmentSignals>,
    pub transport_factory: Arc<dyn TransportFactory>,
    pub debug: bool,
    pub debug_logger: Arc<dyn DebugLogger>,
    /// Consulted on every non-fatal server close (a code not already in
    /// `close_codes`); returning `false` vetoes the reconnect that would
    /// otherwise follow.
    pub should_reconnect: Option<Arc<dyn Fn(u16, &str) -> bool + Send + Sync>>,
    /// Grace period the lost-connection detector waits after losing the
    /// transport before firing `lostConnection`.
    pub lost_connection_grace_period: Duration,
    /// Source of `now()` and cancellable delayed callbacks for every
    /// one-shot wait in the socket core (retry backoff, attempt timeouts,
    /// lost-connection grace period, ping timeout). Swappable for tests that
    /// need to observe or fake scheduling directly instead of going through
    /// `tokio::time::pause`/`advance`.
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for SocketOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketOptions")
            .field("protocols", &self.protocols)
            .field("buffer_policy", &self.buffer_policy)
            .field("heartbeat", &self.heartbeat)
            .field("retry", &self.retry)
            .field("attempt_timeouts", &self.attempt_timeouts)
            .field("debug", &self.debug)
            .field(
                "lost_connection_grace_period",
                &self.lost_connection_grace_period,
            )
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            protocols: Vec::new(),
            buffer_policy: BufferPolicy::Unbounded,
            heartbeat: HeartbeatOptions::default(),
            retry: RetryConfig::default(),
            attempt_timeouts: AttemptTimeouts::default(),
            close_codes: CloseCodes::default(),
            params: Arc::new(NoParams),
            url_builder: None,
            binary_type: BinaryType::default(),
            environment_signals: Arc::new(NoopEnvironmentSignals),
            transport_factory: Arc::new(TokioTungsteniteTransportFactory),
            debug: false,
            debug_logger: crate::debug::default_logger(),
            should_reconnect: None,
            lost_connection_grace_period: Duration::from_secs(5),
            clock: Arc::new(SystemClock),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_heartbeat_interval_is_five_seconds() {
        let options = SocketOptions::default();
        assert_eq!(options.heartbeat.interval, Duration::from_secs(5));
    }

    #[test]
    fn default_buffer_policy_is_unbounded() {
        let options = SocketOptions::default();
        assert_eq!(options.buffer_policy, BufferPolicy::Unbounded);
    }

    #[test]
    fn default_lost_connection_grace_period_is_five_seconds() {
        let options = SocketOptions::default();
        assert_eq!(
            options.lost_connection_grace_period,
            Duration::from_secs(5)
        );
    }
}
