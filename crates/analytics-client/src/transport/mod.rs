//! Request/response types and the transport seam.
//!
//! The session client never talks to `reqwest` directly; it hands an
//! [`ApiRequest`] and the credential to attach to a [`Transport`]. Requests are
//! plain data so the single authorization retry can re-send them.

mod http;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, TransportError};
use crate::session::Credential;

pub use http::{HttpTransport, install_rustls_provider};

/// Longest error body echoed back in [`ClientError::Status`].
const MAX_DETAIL_LEN: usize = 512;

/// Moves one request to the backend and returns whatever it answered.
///
/// Implementations must not interpret status codes; a 401 is a normal
/// response at this layer.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse, TransportError>;
}

/// What the caller expects back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseKind {
    #[default]
    Json,
    Binary,
}

impl ResponseKind {
    pub fn accept_header(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Binary => "*/*",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        mime: Option<String>,
        bytes: Bytes,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// A single outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the configured base URL.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub response: ResponseKind,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            response: ResponseKind::Json,
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

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    pub fn text_part(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_part(FormPart {
            name: name.into(),
            value: FormValue::Text(value.into()),
        });
        self
    }

    pub fn file_part(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        mime: Option<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        self.push_part(FormPart {
            name: name.into(),
            value: FormValue::File {
                file_name: file_name.into(),
                mime,
                bytes: bytes.into(),
            },
        });
        self
    }

    pub fn binary(mut self) -> Self {
        self.response = ResponseKind::Binary;
        self
    }

    fn push_part(&mut self, part: FormPart) {
        match &mut self.body {
            RequestBody::Multipart(parts) => parts.push(part),
            body => *body = RequestBody::Multipart(vec![part]),
        }
    }
}

/// Raw response as returned by the transport.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json_value(status: StatusCode, value: &Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Raw body, for `Binary` requests.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    #[inline]
    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    /// Turn a non-success status into [`ClientError::Status`].
    pub fn error_for_status(self, path: &str) -> Result<Self, ClientError> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(ClientError::status(self.status, path, self.detail()))
        }
    }

    pub fn decode<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        // 204 and friends carry no body; let `()`/`Option` targets decode from null.
        let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
        serde_json::from_slice(body).map_err(|source| ClientError::Decode {
            path: path.to_owned(),
            source,
        })
    }

    /// Backend error message: the `detail` field of a JSON error body, or the
    /// (truncated) body text.
    pub fn detail(&self) -> String {
        if let Ok(value) = serde_json::from_slice::<Value>(&self.body) {
            match value.get("detail") {
                Some(Value::String(detail)) => return detail.clone(),
                Some(other) => return other.to_string(),
                None => {}
            }
        }

        let text = String::from_utf8_lossy(&self.body);
        let text = text.trim();
        if text.is_empty() {
            return self
                .status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_owned();
        }
        match text.char_indices().nth(MAX_DETAIL_LEN) {
            Some((idx, _)) => format!("{}...", &text[..idx]),
            None => text.to_owned(),
        }
    }
}
