// HTTP client for the panel's request/response API
//
// Wraps `reqwest::Client` with base-URL joining, query rendering, and
// status classification. Responses are returned as plain status/headers/body
// triples so a layer above can store and replay them verbatim.

use std::collections::BTreeMap;

use bytes::Bytes;
use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::RuntimeCredential;
use crate::error::Error;
use crate::transport::TransportConfig;

// ── ApiRequest ───────────────────────────────────────────────────────

/// A single request against the panel API.
///
/// Query parameters are kept in a `BTreeMap`, so two requests built with the
/// same parameters in a different order are identical values.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base, e.g. `/api/v1/nodes`.
    pub path: String,
    pub query: BTreeMap<String, Value>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a single query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// `true` for requests that do not change server state.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

// ── ApiResponse ──────────────────────────────────────────────────────

/// A successful response, fully buffered.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: self.text(),
        })
    }

    /// The body as (lossy) UTF-8 text.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ── ApiClient ────────────────────────────────────────────────────────

/// Raw HTTP client for the panel API.
///
/// Attaches the Basic auth header when a credential is configured and turns
/// every non-2xx status into an [`Error`]. No caching happens here.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the panel origin (e.g. `https://panel.example.com`),
    /// optionally with a path prefix.
    pub fn new(
        base_url: Url,
        credential: Option<&RuntimeCredential>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(cred) = credential {
            let mut value = HeaderValue::from_str(&cred.basic_auth_header())
                .map_err(|e| Error::Authentication {
                    message: format!("credential is not a valid header value: {e}"),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        let http = transport.build_client(headers)?;
        Ok(Self { http, base_url })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The API base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the full URL for a request, query string included.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, Error> {
        let full = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&full)?;

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            pairs.append_pair(key, &render_query_value(item));
                        }
                    }
                    other => {
                        pairs.append_pair(key, &render_query_value(other));
                    }
                }
            }
        }

        Ok(url)
    }

    /// Send a request and buffer the response.
    pub async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, Error> {
        let url = self.url_for(request)?;
        debug!(method = %request.method, %url, "sending request");

        let mut builder = self.http.request(request.method.clone(), url);
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "credentials rejected by server".into(),
            });
        }

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

/// JSON strings go out unquoted, `null` as an empty value, everything
/// else in its JSON form.
fn render_query_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn url_joins_base_prefix_and_path() {
        let c = client("https://panel.example.com/admin/");
        let url = c.url_for(&ApiRequest::get("/api/v1/nodes")).unwrap();
        assert_eq!(url.as_str(), "https://panel.example.com/admin/api/v1/nodes");
    }

    #[test]
    fn query_is_rendered_in_key_order() {
        let c = client("https://panel.example.com");
        let req = ApiRequest::get("/api/v1/clients")
            .with_query("node", 3)
            .with_query("email", "a@b.c")
            .with_query("tags", json!(["x", "y"]));
        let url = c.url_for(&req).unwrap();
        assert_eq!(url.query(), Some("email=a%40b.c&node=3&tags=x&tags=y"));
    }

    #[test]
    fn read_classification() {
        assert!(ApiRequest::get("/x").is_read());
        assert!(!ApiRequest::post("/x").is_read());
        assert!(!ApiRequest::delete("/x").is_read());
    }

    #[test]
    fn response_json_failure_keeps_body() {
        let resp = ApiResponse {
            status: 200,
            headers: HeaderMap::new(),
            body: Bytes::from_static(b"not json"),
        };
        let err = resp.json::<Value>().unwrap_err();
        assert!(matches!(err, Error::Deserialization { ref body, .. } if body == "not json"));
    }
}
