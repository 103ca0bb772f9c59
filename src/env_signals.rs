//! Injectable focus/online environment notifications.
//!
//! The crate has no window system or network-status API of its own; hosts
//! that can observe these signals (a GUI shell, a mobile runtime) implement
//! [`EnvironmentSignals`] and hand it to [`crate::config::SocketOptions`].
//! [`NoopEnvironmentSignals`] is the default and never fires, which degrades
//! heartbeat's focus/online-triggered pings to a no-op cleanly.

use std::fmt;

/// A callback fired when the host environment reports a focus or
/// online-status change.
pub type SignalCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Released (unregistered) when dropped.
#[must_use = "dropping a SignalSubscription immediately unregisters it"]
pub struct SignalSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SignalSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription that does nothing on drop, for no-op implementations.
    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for SignalSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Source of host-environment focus/online notifications.
pub trait EnvironmentSignals: Send + Sync + fmt::Debug + 'static {
    /// Register a callback invoked whenever the host regains focus (e.g. a
    /// window becomes foreground, an app resumes).
    fn on_focus(&self, callback: SignalCallback) -> SignalSubscription;

    /// Register a callback invoked whenever the host regains network
    /// connectivity.
    fn on_online(&self, callback: SignalCallback) -> SignalSubscription;
}

/// The default [`EnvironmentSignals`]: never fires either callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnvironmentSignals;

impl EnvironmentSignals for NoopEnvironmentSignals {
    fn on_focus(&self, _callback: SignalCallback) -> SignalSubscription {
        SignalSubscription::noop()
    }

    fn on_online(&self, _callback: SignalCallback) -> SignalSubscription {
        SignalSubscription::noop()
    }
}
