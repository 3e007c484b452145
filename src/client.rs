//! HTTP collaborator - outbound request execution
//!
//! The bridge core never talks to the network directly; it hands a shaped
//! request to a [`Transport`]. The default transport is a shared
//! `reqwest::Client`, but tests (and embedders) inject their own.
//!
//! Connection pooling, TLS, and retries are the transport's concern. The
//! core only applies the pre-call pacing gate and post-call outcome
//! classification.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use tracing::debug;

use crate::compiler::AssembledRequest;
use crate::{Error, Result};

/// A shaped outbound request, ready for the transport
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// Upper-case HTTP method
    pub method: String,
    /// Fully substituted URL (no query string)
    pub url: String,
    /// Query parameters
    pub query: Vec<(String, String)>,
    /// JSON body, when present
    pub body: Option<Value>,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Deadline for the whole call
    pub timeout: Duration,
}

/// Transport-level response: a status and the raw payload text
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text (may be empty)
    pub body: String,
}

/// Injectable transport capability
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request, returning the status and payload.
    ///
    /// Errors represent transport-level failures (connect, deadline); an HTTP
    /// error status is a successful transport result.
    async fn perform(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Default transport backed by a shared `reqwest::Client`
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create the default transport
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: ApiRequest) -> Result<ApiResponse> {
        let method = request
            .method
            .parse::<Method>()
            .map_err(|e| Error::Transport(format!("Invalid HTTP method '{}': {e}", request.method)))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .timeout(request.timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ApiResponse { status, body })
    }
}

/// Client that shapes assembled requests and hands them to the transport
pub struct ApiClient {
    base_url: String,
    credential: Option<String>,
    headers: HashMap<String, String>,
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Create a client for the given base URL and transport
    #[must_use]
    pub fn new(
        base_url: String,
        credential: Option<String>,
        headers: HashMap<String, String>,
        timeout: Duration,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            headers,
            timeout,
            transport,
        }
    }

    /// The base URL every path template is joined onto
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Substitute path variables and perform the call through the transport
    pub async fn perform(
        &self,
        method: &str,
        path_template: &str,
        assembled: &AssembledRequest,
    ) -> Result<ApiResponse> {
        let url = format!(
            "{}{}",
            self.base_url,
            substitute_path(path_template, assembled.path.as_ref())
        );

        let query = assembled
            .query
            .as_ref()
            .map(|params| {
                params
                    .iter()
                    .map(|(k, v)| (k.clone(), value_to_string(v)))
                    .collect()
            })
            .unwrap_or_default();

        let body = assembled
            .body
            .as_ref()
            .map(|fields| Value::Object(fields.clone()));

        let mut headers = self.headers.clone();
        if let Some(ref credential) = self.credential {
            headers.insert("Authorization".to_string(), credential.clone());
        }

        debug!(method = %method, url = %url, "Performing API call");

        self.transport
            .perform(ApiRequest {
                method: method.to_string(),
                url,
                query,
                body,
                headers,
                timeout: self.timeout,
            })
            .await
    }
}

/// Substitute `{name}` placeholders in a path template
pub(crate) fn substitute_path(
    template: &str,
    vars: Option<&serde_json::Map<String, Value>>,
) -> String {
    let Some(vars) = vars else {
        return template.to_string();
    };
    let mut path = template.to_string();
    for (name, value) in vars {
        let placeholder = format!("{{{name}}}");
        if path.contains(&placeholder) {
            path = path.replace(&placeholder, &value_to_string(value));
        }
    }
    path
}

/// Render a scalar argument for a URL position
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
