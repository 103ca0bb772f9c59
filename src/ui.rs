//! Thin UI-runtime adapter exposing the socket's reactive surface as plain
//! subscriptions, since Rust UI frameworks expose reactivity through
//! channels/signals rather than the hook macros of the system this crate's
//! design was distilled from. Grounded on the teacher's
//! `rtds::subscription::SubscriptionManager::start_reconnection_handler`
//! (a background task driven by a `watch::Receiver` of connection state),
//! adapted from "resubscribe on reconnect" into a general subscription
//! facade over [`Event`].

use tokio::sync::watch;

use crate::config::SocketOptions;
use crate::emitter::Subscription;
use crate::socket::{Event, LostConnectionState, Socket};
use crate::status::Status;

/// Owns exactly one [`Socket`] and closes it when dropped, the Rust
/// equivalent of a component-scoped provider disposing its socket on
/// unmount.
pub struct SocketContext {
    socket: Socket,
}

impl SocketContext {
    #[must_use]
    pub fn new(url: impl Into<String>, options: SocketOptions) -> Self {
        Self {
            socket: Socket::new(url, options),
        }
    }

    /// A stable cloned handle to the underlying socket (`useSocket`).
    #[must_use]
    pub fn socket(&self) -> Socket {
        self.socket.clone()
    }

    /// Current status, readable synchronously, updated on change
    /// (`useStatus`).
    #[must_use]
    pub fn status(&self) -> watch::Receiver<Status> {
        self.socket.status_receiver()
    }

    /// Register a callback for every `message` event until the returned
    /// [`Subscription`] is dropped (`useMessage`).
    pub fn on_message<F>(&self, callback: F) -> Subscription<Event>
    where
        F: Fn(&crate::buffer::Payload) + Send + Sync + 'static,
    {
        self.socket.on_event(move |event| {
            if let Event::Message(payload) = event {
                callback(payload);
            }
        })
    }

    /// Register a callback for `lostConnection` events until the returned
    /// [`Subscription`] is dropped (`useLostConnectionListener`). Called
    /// with `Lost`, `Restored`, or `Failed` depending on how the armed
    /// grace period resolved.
    pub fn on_lost_connection<F>(&self, callback: F) -> Subscription<Event>
    where
        F: Fn(LostConnectionState) + Send + Sync + 'static,
    {
        self.socket.on_event(move |event| {
            if let Event::LostConnection(state) = event {
                callback(*state);
            }
        })
    }
}

impl Drop for SocketContext {
    fn drop(&mut self) {
        self.socket.close(None, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn context_exposes_initial_connecting_status() {
        let ctx = SocketContext::new("ws://127.0.0.1:0/", SocketOptions::default());
        assert_eq!(*ctx.status().borrow(), Status::Connecting);
    }
}
