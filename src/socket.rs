//! The socket lifecycle state machine: the heart of the crate, composing
//! [`crate::retry`], [`crate::heartbeat`], [`crate::buffer`], and
//! [`crate::ws::transport`] behind a single command loop. Grounded on the
//! teacher's `ws::connection::ConnectionManager::connection_loop` /
//! `handle_connection`, whose `tokio::select!`-over-one-task shape is kept;
//! the transition table and triggers are generalized to the full state
//! machine this crate implements (params resolution, heartbeat misses,
//! lost-connection arming, `StopRetry`, `close_codes`/`should_reconnect`).

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::buffer::{Buffer, Payload};
use crate::clock::Clock;
use crate::config::SocketOptions;
use crate::debug::socket_debug;
use crate::emitter::{Emitter, Subscription};
use crate::error::Error;
use crate::heartbeat::{HeartbeatAction, HeartbeatState};
use crate::retry::RetryPolicy;
use crate::status::{BinaryType, ReadyState, Status};
use crate::ws::attempt::build_attempt_url;
use crate::ws::error::WsError;
use crate::ws::transport::{Transport, TransportEvent};

/// Await `clock`'s timer firing after `delay`, cancelling it if this future
/// is dropped first (e.g. it lost a `select!` race). Turns [`Clock`]'s
/// callback-based API into something `await`-able, so every one-shot wait in
/// this module goes through the same injectable clock rather than calling
/// `tokio::time` directly.
async fn clock_sleep(clock: &dyn Clock, delay: Duration) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let _handle = clock.set_timer(delay, Box::new(move || {
        let _ = tx.send(());
    }));
    let _ = rx.await;
}

/// Race `fut` against `clock`'s timer firing after `delay`. `None` means the
/// timer won; the Clock-based analogue of `tokio::time::timeout`.
async fn clock_timeout<T>(clock: &dyn Clock, delay: Duration, fut: impl std::future::Future<Output = T>) -> Option<T> {
    tokio::pin!(fut);
    tokio::select! {
        biased;
        value = &mut fut => Some(value),
        () = clock_sleep(clock, delay) => None,
    }
}

/// Events delivered through [`Socket::on_event`] and consumed by
/// [`crate::ui::SocketContext`]. Carries the payload for every one of the
/// seven event kinds in one enum rather than a per-kind `Emitter`, since
/// every listener in this crate wants to `match` on the kind anyway.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Event {
    Open,
    Message(Payload),
    Close { code: u16, reason: String },
    Retry { attempt: u32 },
    Reconnect,
    LostConnection(LostConnectionState),
    Disconnect { error: Option<Arc<Error>> },
}

/// The three states of one lost-connection cycle, armed by
/// [`GraceTask::arm`] and resolved by exactly one of [`GraceTask::disarm`]
/// (`Restored`) or [`GraceTask::fail`] (`Failed`) — unless the grace period
/// itself never elapsed, in which case neither fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LostConnectionState {
    /// The grace period elapsed with the socket still not `Connected`.
    Lost,
    /// The socket reached `Connected` after having emitted `Lost`.
    Restored,
    /// The socket gave up for good after having emitted `Lost`.
    Failed,
}

enum Command {
    Send(Payload),
    Close {
        code: Option<u16>,
        reason: Option<String>,
    },
    Reconnect,
}

/// Readable-view state mutated by the command loop and read from any
/// `Socket` clone without going through the command channel, mirroring the
/// spec's "proxied from transport when present, or frozen last values when
/// not" rule: fields here are only ever overwritten with a fresher live
/// value, never reset on teardown.
#[derive(Default)]
struct SharedState {
    retry_count: AtomicU32,
    buffered_amount: AtomicUsize,
    can_send: AtomicBool,
    last_message_sent: Mutex<Option<Instant>>,
    protocol: Mutex<Option<String>>,
    extensions: Mutex<Option<String>>,
}

/// A reconnecting WebSocket client. Cheap to clone: all clones share the
/// same underlying command loop and state, mirroring the teacher's
/// `ConnectionManager`.
#[derive(Clone)]
pub struct Socket {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<Status>,
    events: Emitter<Event>,
    url: Arc<str>,
    binary_type: BinaryType,
    shared: Arc<SharedState>,
}

impl Socket {
    /// Start a new socket. The connection loop is spawned immediately and
    /// begins its first connection attempt right away.
    #[must_use]
    pub fn new(url: impl Into<String>, options: SocketOptions) -> Self {
        let url: Arc<str> = Arc::from(url.into());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(Status::Connecting);
        let events = Emitter::new();
        let shared = Arc::new(SharedState::default());
        let binary_type = options.binary_type;

        let loop_events = events.clone();
        let loop_shared = Arc::clone(&shared);
        let loop_url = Arc::clone(&url);
        tokio::spawn(run(loop_url, options, cmd_rx, status_tx, loop_events, loop_shared));

        Self {
            cmd_tx,
            status_rx,
            events,
            url,
            binary_type,
            shared,
        }
    }

    /// Current status, updated by the command loop.
    #[must_use]
    pub fn status(&self) -> Status {
        *self.status_rx.borrow()
    }

    /// A `watch::Receiver` that observes every status transition.
    #[must_use]
    pub fn status_receiver(&self) -> watch::Receiver<Status> {
        self.status_rx.clone()
    }

    /// Numeric ready state mirroring the standard WebSocket API, derived
    /// from `status()`.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.status())
    }

    /// The `binary_type` configured at construction. Descriptive only; see
    /// [`BinaryType`].
    #[must_use]
    pub fn binary_type(&self) -> BinaryType {
        self.binary_type
    }

    /// The URL passed to [`Socket::new`]. Unlike the connection attempt URL
    /// (which may carry resolved params in its query string), this is
    /// always the configured base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Number of payloads currently queued in the send buffer, pending a
    /// reconnect.
    #[must_use]
    pub fn buffered_amount(&self) -> usize {
        self.shared.buffered_amount.load(Ordering::SeqCst)
    }

    /// Current zero-based retry count, reset to 0 on reaching `Connected`.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.retry_count.load(Ordering::SeqCst)
    }

    /// Subprotocol the server selected on the most recent handshake, frozen
    /// across a disconnect until a new handshake completes.
    #[must_use]
    pub fn protocol(&self) -> Option<String> {
        self.shared.protocol.lock().unwrap().clone()
    }

    /// Extensions the server negotiated on the most recent handshake,
    /// frozen across a disconnect until a new handshake completes.
    #[must_use]
    pub fn extensions(&self) -> Option<String> {
        self.shared.extensions.lock().unwrap().clone()
    }

    /// When the most recent user-initiated `send()` actually reached the
    /// transport (as opposed to being buffered).
    #[must_use]
    pub fn last_message_sent(&self) -> Option<Instant> {
        *self.shared.last_message_sent.lock().unwrap()
    }

    /// True iff the transport is currently open and write-ready.
    #[must_use]
    pub fn can_send(&self) -> bool {
        self.shared.can_send.load(Ordering::SeqCst)
    }

    /// Enqueue a payload to send. Buffered per [`crate::buffer::BufferPolicy`]
    /// while not `Connected`.
    pub fn send(&self, payload: Payload) {
        let _ = self.cmd_tx.send(Command::Send(payload));
    }

    /// Close the socket permanently. Does not fire `disconnect`: an
    /// explicit close is a deliberate, successful teardown, not a failure.
    pub fn close(&self, code: Option<u16>, reason: Option<String>) {
        let _ = self.cmd_tx.send(Command::Close { code, reason });
    }

    /// Force an immediate reconnect attempt, bypassing the current retry
    /// delay. Usable from `Disconnected` to resume after exhausting
    /// `max_retries`, or from any other state to force a fresh connection.
    pub fn reconnect(&self) {
        let _ = self.cmd_tx.send(Command::Reconnect);
    }

    /// Register a listener for every socket event. Returns a
    /// [`Subscription`] that unregisters on drop.
    pub fn on_event<F>(&self, listener: F) -> Subscription<Event>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.events.on(listener)
    }
}

async fn run(
    url: Arc<str>,
    options: SocketOptions,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    status_tx: watch::Sender<Status>,
    events: Emitter<Event>,
    shared: Arc<SharedState>,
) {
    let base_url = match url::Url::parse(&url) {
        Ok(u) => u,
        Err(e) => {
            events.emit(&Event::Disconnect {
                error: Some(Arc::new(e.into())),
            });
            let _ = status_tx.send(Status::Disconnected);
            return;
        }
    };

    let mut retry_policy = RetryPolicy::new(options.retry.clone(), &mut rand::rng());
    let mut retry_count: u32 = 0;
    let mut last_error: Option<Error> = None;
    let mut buffer = Buffer::new(options.buffer_policy);
    let mut grace_task = GraceTask::default();

    'outer: loop {
        shared.retry_count.store(retry_count, Ordering::SeqCst);

        if retry_count == 0 {
            let _ = status_tx.send(Status::Connecting);
        } else {
            let _ = status_tx.send(Status::Reconnecting);
            events.emit(&Event::Retry {
                attempt: retry_count,
            });
        }

        if retry_policy.retries_exhausted(retry_count) {
            grace_task.fail(&events);
            terminal_disconnect(&status_tx, &events, WsError::RetriesExhausted.into());
            return;
        }

        if retry_count > 0 {
            let delay = retry_policy.delay_for(retry_count - 1, last_error.as_ref());
            if !wait_or_command(&*options.clock, delay, &mut cmd_rx, &status_tx, &events, &mut buffer, &shared).await {
                return;
            }
        }

        let params = match clock_timeout(
            &*options.clock,
            options.attempt_timeouts.params_timeout,
            options.params.resolve(),
        )
        .await
        {
            Some(Ok(params)) => params,
            Some(Err(stop_retry)) => {
                grace_task.fail(&events);
                terminal_disconnect(&status_tx, &events, WsError::ParamsThrow(stop_retry).into());
                return;
            }
            None => {
                socket_debug!(options, "params resolution timed out");
                last_error = Some(WsError::ParamsTimeout.into());
                retry_count += 1;
                continue 'outer;
            }
        };

        let attempt_url = build_attempt_url(
            &base_url,
            &params,
            retry_count,
            last_error.as_ref(),
            options.url_builder.as_ref(),
        );

        let connect_result = clock_timeout(
            &*options.clock,
            options.attempt_timeouts.connection_timeout,
            options.transport_factory.connect(&attempt_url, &options.protocols),
        )
        .await;

        let mut transport: Box<dyn Transport> = match connect_result {
            Some(Ok(transport)) => transport,
            Some(Err(e)) => {
                socket_debug!(options, "connection attempt failed: {e}");
                last_error = Some(e);
                retry_count += 1;
                continue 'outer;
            }
            None => {
                socket_debug!(options, "connection attempt timed out");
                last_error = Some(WsError::ConnectionTimeout.into());
                retry_count += 1;
                continue 'outer;
            }
        };

        // Connected.
        let was_reconnecting = retry_count > 0;
        retry_count = 0;
        shared.retry_count.store(0, Ordering::SeqCst);
        last_error = None;
        grace_task.disarm(&events);
        *shared.protocol.lock().unwrap() = transport.protocol().map(str::to_owned);
        *shared.extensions.lock().unwrap() = transport.extensions().map(str::to_owned);
        shared.can_send.store(true, Ordering::SeqCst);
        let _ = status_tx.send(Status::Connected);
        events.emit(&Event::Open);
        if was_reconnecting {
            events.emit(&Event::Reconnect);
        }

        // Flush anything buffered while disconnected, in enqueue order.
        while let Some(payload) = buffer.pop_front() {
            if transport.send(payload.clone()).await.is_err() {
                buffer.push_front(payload);
                break;
            }
            shared.last_message_sent.lock().unwrap().replace(options.clock.now());
        }
        shared.buffered_amount.store(buffer.len(), Ordering::SeqCst);

        let teardown = handle_connection(
            &options,
            &mut *transport,
            &mut cmd_rx,
            &status_tx,
            &events,
            &shared,
        )
        .await;

        transport.close().await;
        shared.can_send.store(false, Ordering::SeqCst);

        match teardown {
            Teardown::ClosedByUser => return,
            Teardown::ServerClosed { code, reason } => {
                let reconnect_allowed = !options.close_codes.contains(code)
                    && options
                        .should_reconnect
                        .as_ref()
                        .is_none_or(|predicate| predicate(code, &reason));
                events.emit(&Event::Close {
                    code,
                    reason: reason.clone(),
                });
                if !reconnect_allowed {
                    grace_task.fail(&events);
                    terminal_disconnect(
                        &status_tx,
                        &events,
                        WsError::CloseByServerFatal { code, reason }.into(),
                    );
                    return;
                }
                last_error = None;
                retry_count = 1;
                grace_task.arm(&options, &status_tx, &events);
            }
            Teardown::Error(err) => {
                last_error = Some(err);
                retry_count = 1;
                grace_task.arm(&options, &status_tx, &events);
            }
            Teardown::ReconnectRequested => {
                retry_count = 1;
            }
        }
    }
}

/// Owns the lost-connection grace-period timer task, aborting it on drop so
/// no socket ever outlives the `run` loop (every `return` in `run` drops this
/// implicitly, whether it took the `Connected` path or not). Tracks whether
/// `Lost` actually fired for the current cycle so `disarm`/`fail` know
/// whether `Restored`/`Failed` are owed.
#[derive(Default)]
struct GraceTask {
    task: Option<tokio::task::JoinHandle<()>>,
    lost_emitted: Arc<AtomicBool>,
}

impl GraceTask {
    /// Arm the grace period, unless it is already running from an earlier
    /// disruption in the same outage. Spawns a task that races the grace
    /// period against the socket reaching `Connected` again.
    fn arm(&mut self, options: &SocketOptions, status_tx: &watch::Sender<Status>, events: &Emitter<Event>) {
        if self.task.is_some() {
            return;
        }
        let grace_period = options.lost_connection_grace_period;
        let clock = Arc::clone(&options.clock);
        let mut status_rx = status_tx.subscribe();
        let events = events.clone();
        let lost_emitted = Arc::clone(&self.lost_emitted);
        self.task = Some(tokio::spawn(async move {
            let wait_connected = async {
                let _ = status_rx.wait_for(|s| *s == Status::Connected).await;
            };
            tokio::select! {
                () = clock_sleep(&*clock, grace_period) => {
                    lost_emitted.store(true, Ordering::SeqCst);
                    events.emit(&Event::LostConnection(LostConnectionState::Lost));
                }
                () = wait_connected => {}
            }
        }));
    }

    /// Reconnection won the race: stop the timer before it fires, and emit
    /// `Restored` if `Lost` had already fired this cycle.
    fn disarm(&mut self, events: &Emitter<Event>) {
        self.stop();
        if self.lost_emitted.swap(false, Ordering::SeqCst) {
            events.emit(&Event::LostConnection(LostConnectionState::Restored));
        }
    }

    /// The socket gave up for good: stop the timer, and emit `Failed` if
    /// `Lost` had already fired this cycle.
    fn fail(&mut self, events: &Emitter<Event>) {
        self.stop();
        if self.lost_emitted.swap(false, Ordering::SeqCst) {
            events.emit(&Event::LostConnection(LostConnectionState::Failed));
        }
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for GraceTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn terminal_disconnect(status_tx: &watch::Sender<Status>, events: &Emitter<Event>, error: Error) {
    let _ = status_tx.send(Status::Disconnected);
    events.emit(&Event::Disconnect {
        error: Some(Arc::new(error)),
    });
}

enum Teardown {
    ClosedByUser,
    ServerClosed { code: u16, reason: String },
    Error(Error),
    ReconnectRequested,
}

async fn handle_connection(
    options: &SocketOptions,
    transport: &mut dyn Transport,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    status_tx: &watch::Sender<Status>,
    events: &Emitter<Event>,
    shared: &SharedState,
) -> Teardown {
    let mut heartbeat_state = HeartbeatState::default();
    let mut heartbeat_tick = tokio::time::interval(options.heartbeat.interval);
    heartbeat_tick.reset();
    let mut ping_deadline: Option<Instant> = None;

    // Focus/online signals force an immediate probe unless the respective
    // `ignore_*_events` flag opts out; subscriptions live only as long as
    // this connection, matching heartbeat state's per-connection reset.
    let (probe_tx, mut probe_rx) = mpsc::unbounded_channel::<()>();
    let _focus_sub = (!options.heartbeat.ignore_focus_events).then(|| {
        let tx = probe_tx.clone();
        options
            .environment_signals
            .on_focus(Box::new(move || {
                let _ = tx.send(());
            }))
    });
    let _online_sub = (!options.heartbeat.ignore_network_events).then(|| {
        let tx = probe_tx.clone();
        options
            .environment_signals
            .on_online(Box::new(move || {
                let _ = tx.send(());
            }))
    });
    // Keep one sender alive for the whole connection so `probe_rx` never
    // observes channel closure (and thus never busy-spins on `None`), even
    // when both signal kinds are ignored and no subscription clone exists.
    let _probe_tx_keepalive = probe_tx;

    loop {
        let ping_wait = async {
            match ping_deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(options.clock.now());
                    clock_sleep(&*options.clock, remaining).await;
                }
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(payload)) => {
                        if transport.send(payload).await.is_err() {
                            return Teardown::Error(WsError::ConnectionTimeout.into());
                        }
                        shared.last_message_sent.lock().unwrap().replace(options.clock.now());
                        heartbeat_tick.reset();
                    }
                    Some(Command::Close { code, reason }) => {
                        let _ = (code, reason);
                        let _ = status_tx.send(Status::Disconnected);
                        return Teardown::ClosedByUser;
                    }
                    Some(Command::Reconnect) => return Teardown::ReconnectRequested,
                    None => return Teardown::ClosedByUser,
                }
            }

            event = transport.recv() => {
                match event {
                    Some(TransportEvent::Message(payload)) => {
                        if crate::heartbeat::is_pong(&options.heartbeat, &payload) {
                            heartbeat_state.on_pong_received();
                            ping_deadline = None;
                        } else {
                            events.emit(&Event::Message(payload));
                        }
                    }
                    Some(TransportEvent::Closed { code, reason }) => {
                        return Teardown::ServerClosed { code, reason };
                    }
                    Some(TransportEvent::Error(e)) => return Teardown::Error(e),
                    None => return Teardown::Error(WsError::ConnectionTimeout.into()),
                }
            }

            () = heartbeat_tick.tick() => {
                if let HeartbeatAction::SendPing = heartbeat_state.on_probe_due() {
                    if transport.send(options.heartbeat.ping_message.clone()).await.is_err() {
                        return Teardown::Error(WsError::ConnectionTimeout.into());
                    }
                    ping_deadline = Some(options.clock.now() + options.heartbeat.ping_timeout);
                }
            }

            Some(()) = probe_rx.recv() => {
                if let HeartbeatAction::SendPing = heartbeat_state.on_probe_due() {
                    if transport.send(options.heartbeat.ping_message.clone()).await.is_err() {
                        return Teardown::Error(WsError::ConnectionTimeout.into());
                    }
                    heartbeat_tick.reset();
                    ping_deadline = Some(options.clock.now() + options.heartbeat.ping_timeout);
                }
            }

            () = ping_wait => {
                let exceeded = heartbeat_state.on_ping_timeout(options.heartbeat.max_missed_pings);
                ping_deadline = None;
                if exceeded {
                    return Teardown::Error(WsError::ConnectionTimeout.into());
                }
            }
        }
    }
}

/// Wait out `delay` (the retry backoff), still able to service `send`/
/// `close`/`reconnect` commands while waiting. Returns `false` if the loop
/// should stop (the user closed the socket while it was reconnecting).
async fn wait_or_command(
    clock: &dyn Clock,
    delay: Duration,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    status_tx: &watch::Sender<Status>,
    events: &Emitter<Event>,
    buffer: &mut Buffer,
    shared: &SharedState,
) -> bool {
    let sleep = clock_sleep(clock, delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Send(payload)) => {
                        buffer.push(payload);
                        shared.buffered_amount.store(buffer.len(), Ordering::SeqCst);
                    }
                    Some(Command::Close { .. }) => {
                        let _ = status_tx.send(Status::Disconnected);
                        return false;
                    }
                    Some(Command::Reconnect) => return true,
                    None => {
                        let _ = events;
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPolicy;
    use crate::clock::{SystemClock, TimerCallback};
    use std::sync::Mutex;

    #[tokio::test(start_paused = true)]
    async fn new_socket_starts_connecting() {
        let options = SocketOptions {
            buffer_policy: BufferPolicy::Unbounded,
            ..Default::default()
        };
        // An unroutable URL fails fast; we only assert the initial status
        // observed before the first attempt resolves.
        let socket = Socket::new("ws://127.0.0.1:0/", options);
        assert_eq!(socket.status(), Status::Connecting);
    }

    /// Delegates timing to [`SystemClock`] but records every requested
    /// delay, proving the retry wait actually goes through
    /// `SocketOptions::clock` rather than calling `tokio::time` directly.
    #[derive(Debug)]
    struct RecordingClock {
        requested_delays: Mutex<Vec<Duration>>,
    }

    impl Clock for RecordingClock {
        fn now(&self) -> Instant {
            SystemClock.now()
        }

        fn set_timer(&self, delay: Duration, callback: TimerCallback) -> crate::clock::TimerHandle {
            self.requested_delays.lock().unwrap().push(delay);
            SystemClock.set_timer(delay, callback)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retry_wait_is_scheduled_through_the_configured_clock() {
        let recording = Arc::new(RecordingClock {
            requested_delays: Mutex::new(Vec::new()),
        });
        let options = SocketOptions {
            retry: crate::retry::RetryConfig {
                min_reconnection_delay: Duration::from_millis(10),
                max_reconnection_delay: Duration::from_millis(50),
                ..Default::default()
            },
            clock: Arc::clone(&recording) as Arc<dyn Clock>,
            ..Default::default()
        };

        // Port 0 is never connectable, so the first attempt fails immediately
        // and the socket core schedules a retry wait through `options.clock`.
        let _socket = Socket::new("ws://127.0.0.1:0/", options);

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if !recording.requested_delays.lock().unwrap().is_empty() {
                    return;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("retry wait should have been scheduled");
    }
}
