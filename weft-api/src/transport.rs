//! One physical HTTP round trip.
//!
//! The invoker only ever talks to [`HttpTransport`]; production uses
//! [`ReqwestTransport`], tests script responses in memory.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::ApiError;

/// A file sent as one part of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Request body encodings.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Sent verbatim as `application/json`.
    Raw(String),
    /// One part per file, named after the file.
    Multipart(Vec<MultipartFile>),
}

impl fmt::Display for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => Ok(()),
            RequestBody::Json(v) => write!(f, "{v}"),
            RequestBody::Raw(s) => f.write_str(s),
            RequestBody::Multipart(files) => {
                let names: Vec<&str> = files.iter().map(|p| p.name.as_str()).collect();
                write!(f, "<multipart: {}>", names.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer_token: String,
    pub user_agent: String,
    pub body: RequestBody,
}

/// Status, lowercased headers and raw body text of a response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.headers
            .insert("content-type".into(), "application/json".into());
        self.body = body.to_string();
        self
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// Parsed body, regardless of the declared content type.
    pub fn json_lossy(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// Sends a single request and returns whatever came back, without
/// interpreting the status code.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse, ApiError>;
}

/// [`HttpTransport`] over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<RawResponse, ApiError> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .bearer_auth(&request.bearer_token)
            .header(reqwest::header::USER_AGENT, &request.user_agent);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Raw(text) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(text.clone()),
            RequestBody::Multipart(files) => {
                let mut form = reqwest::multipart::Form::new();
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.name.clone());
                    form = form.part(file.name.clone(), part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
