//! The pluggable transport seam, generalizing the teacher's
//! `ws::connection.rs` use of `connect_async` + split read/write halves
//! behind an object-safe trait (the Rust rendition of `polyfills.WebSocket`
//! from the spec's Open Questions). The default implementation is backed by
//! `tokio-tungstenite`; tests substitute a fake.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::buffer::Payload;
use crate::error::Error;
use crate::ws::error::WsError;

/// An event surfaced by a live transport.
#[derive(Debug)]
pub enum TransportEvent {
    Message(Payload),
    Closed { code: u16, reason: String },
    Error(Error),
}

/// A single, already-open connection. Implementations own exactly one
/// underlying socket; closing or dropping the transport tears it down.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, payload: Payload) -> Result<(), Error>;

    /// Await the next event. Returns `None` once the transport is
    /// permanently exhausted (closed with nothing further to read).
    async fn recv(&mut self) -> Option<TransportEvent>;

    async fn close(&mut self);

    /// Subprotocol the server selected during the handshake, if any.
    fn protocol(&self) -> Option<&str> {
        None
    }

    /// Extensions the server negotiated during the handshake, if any.
    fn extensions(&self) -> Option<&str> {
        None
    }
}

/// Opens new [`Transport`]s. The production implementation
/// ([`TokioTungsteniteTransportFactory`]) dials a real WebSocket server;
/// tests substitute a fake that never touches the network.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self, url: &Url, protocols: &[String]) -> Result<Box<dyn Transport>, Error>;
}

/// The default [`TransportFactory`], backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTungsteniteTransportFactory;

#[async_trait]
impl TransportFactory for TokioTungsteniteTransportFactory {
    async fn connect(&self, url: &Url, protocols: &[String]) -> Result<Box<dyn Transport>, Error> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;

        let mut request = url.as_str().into_client_request()?;
        if !protocols.is_empty() {
            let joined = protocols.join(", ");
            request.headers_mut().insert(
                "Sec-WebSocket-Protocol",
                joined
                    .parse()
                    .map_err(|_| Error::validation("invalid websocket protocol header value"))?,
            );
        }

        let (stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(WsError::Transport)?;

        let protocol = header_str(&response, "sec-websocket-protocol");
        let extensions = header_str(&response, "sec-websocket-extensions");

        Ok(Box::new(TokioTungsteniteTransport::new(stream, protocol, extensions)))
    }
}

fn header_str<T>(response: &tokio_tungstenite::tungstenite::http::Response<T>, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TokioTungsteniteTransport {
    stream: WsStream,
    protocol: Option<String>,
    extensions: Option<String>,
}

impl TokioTungsteniteTransport {
    fn new(stream: WsStream, protocol: Option<String>, extensions: Option<String>) -> Self {
        Self {
            stream,
            protocol,
            extensions,
        }
    }
}

#[async_trait]
impl Transport for TokioTungsteniteTransport {
    async fn send(&mut self, payload: Payload) -> Result<(), Error> {
        let message = match payload {
            Payload::Text(text) => WsMessage::Text(text.into()),
            Payload::Binary(bytes) => WsMessage::Binary(bytes.into()),
        };
        self.stream
            .send(message)
            .await
            .map_err(WsError::Transport)?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.stream.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    return Some(TransportEvent::Message(Payload::Text(text.to_string())));
                }
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return Some(TransportEvent::Message(Payload::Binary(bytes.to_vec())));
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame.map_or((1000, String::new()), |f| {
                        (u16::from(f.code), f.reason.to_string())
                    });
                    return Some(TransportEvent::Closed { code, reason });
                }
                // Protocol-level pings/pongs are answered here and never
                // surfaced; the heartbeat controller operates purely on
                // application-level text/binary payloads (spec'd ping/pong
                // messages), a separate liveness mechanism from the
                // WebSocket protocol's own ping/pong frames.
                Some(Ok(WsMessage::Ping(data))) => {
                    let _ = self.stream.send(WsMessage::Pong(data)).await;
                }
                Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => return Some(TransportEvent::Error(WsError::Transport(e).into())),
                None => return None,
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }

    fn protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    fn extensions(&self) -> Option<&str> {
        self.extensions.as_deref()
    }
}

/// A fake transport for tests that don't need a real socket: unit tests in
/// this crate, and the paused-clock integration tests in `tests/socket.rs`
/// (reachable there via the `test-util` feature). Grounded on the teacher's
/// `MockWsServer`, generalized from "run a real server" to "hand the socket
/// core a scripted event queue with no network involved."
#[cfg(any(test, feature = "test-util"))]
pub mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{Error, Payload, Transport, TransportEvent};

    pub struct FakeTransport {
        pub inbound: Mutex<VecDeque<TransportEvent>>,
        pub outbound: Mutex<Vec<Payload>>,
        pub closed: Mutex<bool>,
        stay_open_when_exhausted: bool,
    }

    impl FakeTransport {
        /// `recv` replays `inbound` in order, then returns `None` once
        /// exhausted, as a transport that has nothing further to say and is
        /// done.
        pub fn new(inbound: Vec<TransportEvent>) -> Self {
            Self {
                inbound: Mutex::new(inbound.into()),
                outbound: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
                stay_open_when_exhausted: false,
            }
        }

        /// Like `new`, but `recv` pends forever once `inbound` is exhausted
        /// instead of returning `None`, simulating a transport that stays
        /// open with no further inbound traffic.
        pub fn new_open(inbound: Vec<TransportEvent>) -> Self {
            Self {
                inbound: Mutex::new(inbound.into()),
                outbound: Mutex::new(Vec::new()),
                closed: Mutex::new(false),
                stay_open_when_exhausted: true,
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&mut self, payload: Payload) -> Result<(), Error> {
            self.outbound.lock().unwrap().push(payload);
            Ok(())
        }

        async fn recv(&mut self) -> Option<TransportEvent> {
            let next = self.inbound.lock().unwrap().pop_front();
            match next {
                Some(event) => Some(event),
                None if self.stay_open_when_exhausted => std::future::pending().await,
                None => None,
            }
        }

        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }
}
