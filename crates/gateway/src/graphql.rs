use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

const PROBE_QUERY: &str = "query IntrospectionProbe {
  __schema {
    queryType {
      name
    }
  }
}";

/// A parameterized GraphQL document. Caller data only ever travels in `variables`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlRequest {
    pub operation_name: String,
    pub query: String,
    #[serde(default)]
    pub variables: serde_json::Value,
}

impl GraphqlRequest {
    pub fn new(operation_name: &str, query: &str, variables: serde_json::Value) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            query: query.to_string(),
            variables,
        }
    }

    pub fn is_mutation(&self) -> bool {
        self.query.trim_start().starts_with("mutation")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlErrorEntry {
    pub message: String,
}

impl GraphqlResponse {
    pub fn with_data(data: serde_json::Value) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    pub fn with_errors<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data: None,
            errors: messages
                .into_iter()
                .map(|message| GraphqlErrorEntry {
                    message: message.into(),
                })
                .collect(),
        }
    }

    /// Extracts one root field from `data`.
    ///
    /// A non-empty `errors` array wins over any partial data. `Ok(None)` means the
    /// backend answered with an explicit `null` for the field, which the `*_by_pk`
    /// operations use for "no such row".
    pub fn into_root_field(self, field: &str) -> Result<Option<serde_json::Value>, BackendError> {
        if !self.errors.is_empty() {
            return Err(BackendError::Graphql(
                self.errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        let Some(mut data) = self.data else {
            return Err(BackendError::InvalidResponse);
        };

        match data.get_mut(field).map(serde_json::Value::take) {
            None => Err(BackendError::InvalidResponse),
            Some(serde_json::Value::Null) => Ok(None),
            Some(value) => Ok(Some(value)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("GraphQL backend request timed out")]
    Timeout,
    #[error("GraphQL backend HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("GraphQL backend returned status {0}")]
    BadStatus(reqwest::StatusCode),
    #[error("GraphQL backend returned an invalid response")]
    InvalidResponse,
    #[error("GraphQL backend reported errors: {}", .0.join("; "))]
    Graphql(Vec<String>),
    #[error("invalid backend credential header: {0}")]
    InvalidCredential(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Http(value)
        }
    }
}

impl BackendError {
    pub fn outcome(&self) -> &'static str {
        match self {
            BackendError::Timeout => "timeout",
            BackendError::Http(_) | BackendError::InvalidCredential(_) => "transport_error",
            BackendError::BadStatus(_) => "bad_status",
            BackendError::InvalidResponse => "invalid_response",
            BackendError::Graphql(_) => "graphql_error",
        }
    }
}

/// Request/response channel to the GraphQL backend.
///
/// Gateways hold this as `Arc<dyn GraphqlTransport>` so tests can substitute a stub.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, BackendError>;

    async fn probe(&self) -> Result<(), BackendError> {
        let request = GraphqlRequest::new("IntrospectionProbe", PROBE_QUERY, serde_json::json!({}));
        self.execute(request)
            .await?
            .into_root_field("__schema")?
            .map(|_| ())
            .ok_or(BackendError::InvalidResponse)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    pub endpoint: String,
    pub admin_secret: Option<String>,
    pub secret_header: String,
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(secret) = config.admin_secret.as_deref() {
            let name = HeaderName::from_bytes(config.secret_header.as_bytes())
                .map_err(|_| BackendError::InvalidCredential(config.secret_header.clone()))?;
            let mut value = HeaderValue::from_str(secret)
                .map_err(|_| BackendError::InvalidCredential(config.secret_header.clone()))?;
            value.set_sensitive(true);
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(BackendError::Http)?;

        Ok(Self {
            endpoint: config.endpoint,
            http,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn execute(&self, request: GraphqlRequest) -> Result<GraphqlResponse, BackendError> {
        let resp = self.http.post(&self.endpoint).json(&request).send().await?;

        if !resp.status().is_success() {
            return Err(BackendError::BadStatus(resp.status()));
        }

        resp.json::<GraphqlResponse>()
            .await
            .map_err(|_| BackendError::InvalidResponse)
    }
}

/// Executes `request` and returns `root_field` from its data, recording the outcome.
pub(crate) async fn call_root_field(
    backend: &dyn GraphqlTransport,
    request: GraphqlRequest,
    root_field: &str,
) -> Result<Option<serde_json::Value>, BackendError> {
    let operation = request.operation_name.clone();
    let result = match backend.execute(request).await {
        Ok(response) => response.into_root_field(root_field),
        Err(err) => Err(err),
    };

    match &result {
        Ok(_) => crate::metrics::observe_backend_call(&operation, "ok"),
        Err(err) => {
            crate::metrics::observe_backend_call(&operation, err.outcome());
            tracing::warn!(operation = %operation, error = %err, "graphql.call_failed");
        }
    }

    result
}
