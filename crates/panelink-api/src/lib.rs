// panelink-api: transport layer for the panelink client (HTTP + realtime WebSocket)

pub mod auth;
pub mod error;
pub mod http;
pub mod message;
pub mod transport;
pub mod websocket;

pub use auth::RuntimeCredential;
pub use error::Error;
pub use http::{ApiClient, ApiRequest, ApiResponse};
pub use message::{ClientMessage, ServerMessage};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{Link, LinkEvent, Transport, WsTransport, resolve_endpoint};
pub use reqwest::Method;
pub use reqwest::header::HeaderMap;
