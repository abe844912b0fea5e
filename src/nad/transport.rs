use anyhow::{Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::form_urlencoded;

/// A decoded HTTP exchange with the NAD appliance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub text: String,
}

impl Response {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.text)
    }
}

/// The request never produced a response (DNS, TLS, connect, timeout).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "request to {} failed: {}", self.path, self.message)
    }
}

impl std::error::Error for TransportError {}

/// Session-level client for the appliance API. Paths are relative to the
/// API base URL, e.g. `sources/save` or `tasks/{id}`.
pub trait Transport {
    fn get(&self, path: &str) -> Result<Response, TransportError>;
    fn post_json(&self, path: &str, body: &Value) -> Result<Response, TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportOptions {
    pub base_url: String,
    pub api_token: Option<String>,
    pub verify_tls: bool,
    pub request_timeout_secs: u64,
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpTransport {
    pub fn new(opts: &HttpTransportOptions) -> Result<Self> {
        let base_url = opts.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!("NAD base URL is required; set NAD_ARCHIVE_BASE_URL or [nad].base_url");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(opts.request_timeout_secs))
            .danger_accept_invalid_certs(!opts.verify_tls)
            .build()
            .context("failed to build NAD http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: opts
                .api_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(ToOwned::to_owned),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, TransportError> {
        let builder = match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        let response = builder.send().map_err(|err| TransportError {
            path: path.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).to_string(),
                )
            })
            .collect();
        let text = response.text().map_err(|err| TransportError {
            path: path.to_string(),
            message: format!("failed to read response body: {err}"),
        })?;

        Ok(Response {
            status,
            headers,
            text,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<Response, TransportError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "GET");
        self.send(path, self.client.get(&url))
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Response, TransportError> {
        let url = self.url_for(path);
        tracing::debug!(%url, "POST");
        self.send(path, self.client.post(&url).json(body))
    }
}

/// Percent-encode one path segment; `/`, `?`, `#` and spaces included.
pub fn path_segment(raw: &str) -> String {
    // form encoding writes a space as `+`, which a path would keep literally
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// `path?k=v&...` with every pair form-encoded.
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.extend_pairs(pairs.iter().copied());
    format!("{path}?{}", query.finish())
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
