//! Ping/pong liveness detection.
//!
//! Grounded on the teacher's `ws::connection::heartbeat_loop`: a
//! `tokio::time::interval` drives outbound pings, a `watch` channel carries
//! the most recent pong timestamp, and `timeout(...).await` on that channel
//! detects a missed pong. This module generalizes the teacher's fixed
//! ping/pong text literals into configurable payloads (defaulting to
//! lowercase `"ping"`/`"pong"`) and adds miss accounting plus focus/online-
//! triggered probes, which the teacher's single fixed-interval loop does not
//! need.

use std::time::Duration;

use crate::buffer::Payload;

/// Configuration for the heartbeat controller.
#[derive(Debug, Clone)]
pub struct HeartbeatOptions {
    /// Send a ping after this much inactivity since the last sent message.
    pub interval: Duration,
    /// How long to wait for a pong before counting it as missed.
    pub ping_timeout: Duration,
    /// Tear down the connection once missed pings exceed this count.
    pub max_missed_pings: u32,
    /// Payload sent as a ping.
    pub ping_message: Payload,
    /// Payload expected as a pong; matched payloads are consumed and never
    /// forwarded to message listeners.
    pub pong_message: Payload,
    /// If true, a host focus signal never forces an immediate ping.
    pub ignore_focus_events: bool,
    /// If true, a host online signal never forces an immediate ping.
    pub ignore_network_events: bool,
}

impl Default for HeartbeatOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ping_timeout: Duration::from_millis(3000),
            max_missed_pings: 1,
            ping_message: Payload::Text("ping".to_owned()),
            pong_message: Payload::Text("pong".to_owned()),
            ignore_focus_events: false,
            ignore_network_events: false,
        }
    }
}

/// Tracks in-flight ping state and accumulated misses for the current
/// connection. Reset on every new connection (never carried across a
/// reconnect).
#[derive(Debug, Clone, Copy, Default)]
pub struct HeartbeatState {
    in_flight: bool,
    missed: u32,
}

/// What a heartbeat tick should do next, decided without any IO so the
/// decision logic can be unit-tested without a real transport or clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping now (no ping currently in flight).
    SendPing,
    /// A ping is already in flight; do nothing.
    AlreadyInFlight,
}

impl HeartbeatState {
    #[must_use]
    pub fn missed(&self) -> u32 {
        self.missed
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Decide what to do when it's time to probe liveness (either the
    /// interval elapsed, or a focus/online signal forced an immediate
    /// probe). Marks a ping in flight when one is sent.
    pub fn on_probe_due(&mut self) -> HeartbeatAction {
        if self.in_flight {
            return HeartbeatAction::AlreadyInFlight;
        }
        self.in_flight = true;
        HeartbeatAction::SendPing
    }

    /// Call when the expected pong payload arrives. Clears the in-flight
    /// flag and resets the miss count — any live pong means the connection
    /// is healthy again.
    pub fn on_pong_received(&mut self) {
        self.in_flight = false;
        self.missed = 0;
    }

    /// Call when `ping_timeout` elapses with no pong. Returns `true` once
    /// accumulated misses exceed `max_missed_pings`, meaning the caller
    /// should tear the connection down.
    pub fn on_ping_timeout(&mut self, max_missed_pings: u32) -> bool {
        self.in_flight = false;
        self.missed += 1;
        self.missed > max_missed_pings
    }
}

/// Whether `payload` matches the configured pong payload and should be
/// consumed instead of forwarded to message listeners.
#[must_use]
pub fn is_pong(options: &HeartbeatOptions, payload: &Payload) -> bool {
    payload == &options.pong_message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_probe_sends_ping() {
        let mut state = HeartbeatState::default();
        assert_eq!(state.on_probe_due(), HeartbeatAction::SendPing);
        assert!(state.is_in_flight());
    }

    #[test]
    fn second_probe_while_in_flight_is_noop() {
        let mut state = HeartbeatState::default();
        state.on_probe_due();
        assert_eq!(state.on_probe_due(), HeartbeatAction::AlreadyInFlight);
    }

    #[test]
    fn pong_clears_in_flight_and_resets_misses() {
        let mut state = HeartbeatState::default();
        state.on_probe_due();
        state.on_ping_timeout(5);
        state.on_probe_due();
        state.on_pong_received();
        assert!(!state.is_in_flight());
        assert_eq!(state.missed(), 0);
    }

    #[test]
    fn timeout_increments_misses_and_signals_teardown_past_max() {
        let mut state = HeartbeatState::default();
        state.on_probe_due();
        assert!(!state.on_ping_timeout(1));
        assert_eq!(state.missed(), 1);

        state.on_probe_due();
        assert!(state.on_ping_timeout(1));
        assert_eq!(state.missed(), 2);
    }

    #[test]
    fn pong_payload_matching() {
        let options = HeartbeatOptions::default();
        assert!(is_pong(&options, &Payload::Text("pong".into())));
        assert!(!is_pong(&options, &Payload::Text("hello".into())));
    }
}
