// ── Core error types ──
//
// User-facing errors from panelink-core. The `From<panelink_api::Error>`
// impl translates transport-layer errors into domain-appropriate variants.
// The caching pipeline itself returns `panelink_api::Error` untouched so a
// cached client fails exactly like an uncached one.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Request errors ───────────────────────────────────────────────
    #[error("Request failed: {message}")]
    RequestFailed {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RequestFailed { status, .. } => *status,
            Self::AuthenticationFailed { .. } => Some(401),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<panelink_api::Error> for CoreError {
    fn from(err: panelink_api::Error) -> Self {
        match err {
            panelink_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            panelink_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::RequestFailed {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            panelink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            panelink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            panelink_api::Error::Status { status, body } => CoreError::RequestFailed {
                message: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
                status: Some(status),
            },
            panelink_api::Error::WebSocketConnect(reason) | panelink_api::Error::Send(reason) => {
                CoreError::ConnectionFailed {
                    url: String::new(),
                    reason: format!("WebSocket: {reason}"),
                }
            }
            panelink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_keeps_code_and_body() {
        let err = CoreError::from(panelink_api::Error::Status {
            status: 404,
            body: "node not found".into(),
        });
        assert!(matches!(
            err,
            CoreError::RequestFailed { ref message, status: Some(404) } if message == "node not found"
        ));
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        let err = CoreError::from(panelink_api::Error::Status {
            status: 502,
            body: String::new(),
        });
        assert_eq!(err.to_string(), "Request failed: HTTP 502");
    }

    #[test]
    fn authentication_maps_through() {
        let err = CoreError::from(panelink_api::Error::Authentication {
            message: "nope".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
    }
}
