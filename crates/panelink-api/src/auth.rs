use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::{ExposeSecret, SecretString};

/// Credentials handed in by the login flow.
///
/// Lives only in process memory. The secret halves are wrapped in
/// [`SecretString`] so they never show up in `Debug` output or logs.
#[derive(Debug, Clone)]
pub struct RuntimeCredential {
    /// Account name.
    pub principal: String,
    /// Password for `principal`.
    pub secret: SecretString,
    /// One-time code, when the account has a second factor enabled.
    pub second_factor: Option<SecretString>,
}

impl RuntimeCredential {
    pub fn new(principal: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            secret: SecretString::from(secret.into()),
            second_factor: None,
        }
    }

    /// Attach a second-factor code.
    pub fn with_second_factor(mut self, code: impl Into<String>) -> Self {
        self.second_factor = Some(SecretString::from(code.into()));
        self
    }

    /// Opaque bearer token: base64 of `principal:secret`.
    pub fn bearer_token(&self) -> String {
        STANDARD.encode(format!(
            "{}:{}",
            self.principal,
            self.secret.expose_secret()
        ))
    }

    /// Value for the HTTP `Authorization` header.
    pub fn basic_auth_header(&self) -> String {
        format!("Basic {}", self.bearer_token())
    }

    /// The second-factor code in plain text, if one was supplied.
    pub fn second_factor_code(&self) -> Option<&str> {
        self.second_factor.as_ref().map(ExposeSecret::expose_secret)
    }
}
