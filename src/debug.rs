//! The socket's debug hook (spec'd as "a `debugLogger` or a default logger;
//! no stable format"). Implemented as a trait so hosts can route debug
//! output anywhere, with a default that forwards to `tracing` when the
//! `tracing` feature is enabled and discards output otherwise — the same
//! feature-gating shape the teacher uses throughout `ws::connection.rs`.

use std::fmt;
use std::sync::Arc;

/// Receives free-form debug lines from the socket core, heartbeat
/// controller, and retry path. No stable message format is guaranteed.
pub trait DebugLogger: Send + Sync + 'static {
    fn log(&self, message: fmt::Arguments<'_>);
}

/// Forwards to `tracing::debug!` when the `tracing` feature is enabled;
/// otherwise discards its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDebugLogger;

impl DebugLogger for TracingDebugLogger {
    fn log(&self, message: fmt::Arguments<'_>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("{message}");
        #[cfg(not(feature = "tracing"))]
        {
            let _ = message;
        }
    }
}

#[must_use]
pub fn default_logger() -> Arc<dyn DebugLogger> {
    Arc::new(TracingDebugLogger)
}

/// Emit a debug line through a `SocketOptions::debug_logger`, only when
/// `SocketOptions::debug` is enabled. Mirrors the teacher's
/// `#[cfg(feature = "tracing")]` / `#[cfg(not(feature = "tracing"))]` pairs,
/// but gated on the runtime `debug` flag rather than a compile-time feature
/// since the spec requires an opt-in debug surface usable without
/// recompiling.
macro_rules! socket_debug {
    ($options:expr, $($arg:tt)*) => {
        if $options.debug {
            $options.debug_logger.log(format_args!($($arg)*));
        }
    };
}

pub(crate) use socket_debug;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingLogger(Mutex<Vec<String>>);

    impl DebugLogger for RecordingLogger {
        fn log(&self, message: fmt::Arguments<'_>) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn recording_logger_captures_messages() {
        let logger = RecordingLogger(Mutex::new(Vec::new()));
        logger.log(format_args!("hello {}", 42));
        assert_eq!(logger.0.lock().unwrap()[0], "hello 42");
    }
}
