//! Realtime WebSocket link.
//!
//! Resolves the realtime endpoint from the panel origin, and opens links
//! through the [`Transport`] seam. [`WsTransport`] is the `tokio-tungstenite`
//! implementation; reconnection policy lives one layer up, in
//! `panelink-core`, which only ever talks to the traits.
//!
//! # Example
//!
//! ```rust,ignore
//! use panelink_api::websocket::{Link, LinkEvent, Transport, WsTransport, resolve_endpoint};
//!
//! let url = resolve_endpoint(None, &origin, Some(&credential))?;
//! let mut link = WsTransport::new().open(&url).await?;
//! link.send(&ClientMessage::subscribe("traffic")).await?;
//!
//! while let LinkEvent::Text(text) = link.next_event().await {
//!     println!("{text}");
//! }
//! ```

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::auth::RuntimeCredential;
use crate::error::Error;
use crate::message::ClientMessage;

/// Path of the realtime endpoint on the panel origin.
pub const REALTIME_PATH: &str = "/ws";

// ── Close codes ──────────────────────────────────────────────────────

pub const NORMAL_CLOSURE: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
/// Sent by the server when it refuses the connection on policy grounds
/// (bad or expired credentials).
pub const POLICY_VIOLATION: u16 = 1008;

// ── Endpoint resolution ──────────────────────────────────────────────

/// Work out which URL the realtime link should connect to.
///
/// An explicit override is used verbatim. Otherwise the origin's scheme is
/// upgraded (`http` → `ws`, `https` → `wss`), the path becomes
/// [`REALTIME_PATH`], and, when a credential is available, the bearer token
/// and second-factor code are appended as `token` / `otp` query parameters.
pub fn resolve_endpoint(
    explicit: Option<&Url>,
    origin: &Url,
    credential: Option<&RuntimeCredential>,
) -> Result<Url, Error> {
    if let Some(url) = explicit {
        return Ok(url.clone());
    }

    let scheme = match origin.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "cannot derive a realtime endpoint from a {other}:// origin"
            )));
        }
    };

    let mut url = origin.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::WebSocketConnect(format!("cannot switch {origin} to {scheme}")))?;
    // Credentials travel in the query, never in the userinfo part. These
    // only fail for cannot-be-a-base URLs, ruled out by the scheme check.
    let _ = url.set_username("");
    let _ = url.set_password(None);
    url.set_path(REALTIME_PATH);
    url.set_query(None);
    url.set_fragment(None);

    if let Some(cred) = credential {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("token", &cred.bearer_token());
        if let Some(code) = cred.second_factor_code() {
            pairs.append_pair("otp", code);
        }
    }

    Ok(url)
}

/// `host/path` of an endpoint, safe to log (no token).
pub fn display_endpoint(url: &Url) -> String {
    format!("{}{}", url.host_str().unwrap_or_default(), url.path())
}

// ── Transport seam ───────────────────────────────────────────────────

/// What a live link reports while it is being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A text frame.
    Text(String),
    /// The link closed. `code` is `None` when the stream ended without a
    /// close frame.
    Closed { code: Option<u16>, reason: String },
    /// The link broke with a protocol or I/O error.
    Failed(String),
}

/// Opens realtime links.
pub trait Transport: Send + Sync + 'static {
    type Link: Link;

    /// Open a new link. A handshake refused with 401/403 surfaces as
    /// [`Error::Authentication`].
    fn open(&self, url: &Url) -> impl Future<Output = Result<Self::Link, Error>> + Send;
}

/// One open realtime connection.
pub trait Link: Send + 'static {
    /// Write one message as a text frame.
    fn send(&mut self, message: &ClientMessage) -> impl Future<Output = Result<(), Error>> + Send;

    /// Wait for the next meaningful event. Control frames are handled
    /// internally and never surface here.
    fn next_event(&mut self) -> impl Future<Output = LinkEvent> + Send;

    /// Close the link. Errors are swallowed; the link is unusable afterwards.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ── tokio-tungstenite implementation ─────────────────────────────────

/// [`Transport`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    type Link = WsLink;

    async fn open(&self, url: &Url) -> Result<WsLink, Error> {
        tracing::debug!(endpoint = %display_endpoint(url), "opening WebSocket");

        let uri: tungstenite::http::Uri = url.as_str().parse().map_err(
            |e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()),
        )?;

        let request = ClientRequestBuilder::new(uri);
        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(handshake_error)?;

        Ok(WsLink { stream })
    }
}

fn handshake_error(err: tungstenite::Error) -> Error {
    match err {
        tungstenite::Error::Http(ref response)
            if matches!(response.status().as_u16(), 401 | 403) =>
        {
            Error::Authentication {
                message: format!("realtime handshake refused ({})", response.status()),
            }
        }
        other => Error::WebSocketConnect(other.to_string()),
    }
}

/// A live `tokio-tungstenite` connection.
pub struct WsLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Link for WsLink {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), Error> {
        let text = message.to_text()?;
        self.stream
            .send(Message::text(text))
            .await
            .map_err(|e| Error::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> LinkEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return LinkEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    return match frame {
                        Some(cf) => LinkEvent::Closed {
                            code: Some(u16::from(cf.code)),
                            reason: cf.reason.as_str().to_owned(),
                        },
                        None => LinkEvent::Closed {
                            code: None,
                            reason: String::new(),
                        },
                    };
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!("WebSocket ping");
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                }
                Some(Err(e)) => return LinkEvent::Failed(e.to_string()),
                None => {
                    return LinkEvent::Closed {
                        code: None,
                        reason: "stream ended".into(),
                    };
                }
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::trace!(error = %e, "WebSocket close failed");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
