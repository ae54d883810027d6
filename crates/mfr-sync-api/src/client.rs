//! REST client for the target platform.
//!
//! Implements [`DhisApi`] over the platform's JSON Web API with basic
//! authentication.

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ApiError, ApiResult};
use crate::query::{MutationType, ResourceMutation, ResourceQuery};
use crate::traits::DhisApi;
use crate::types::Message;

/// Connection settings for [`RestDhisApi`].
#[derive(Debug, Clone)]
pub struct DhisConfig {
    /// Base URL of the platform instance, without the `/api` suffix.
    pub base_url: String,
    /// Basic-auth username.
    pub username: String,
    /// Basic-auth password.
    pub password: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl DhisConfig {
    /// Create a config with the default timeout.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
            timeout_secs: 60,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ApiResult<()> {
        if self.base_url.is_empty() {
            return Err(ApiError::InvalidConfiguration {
                message: "base_url must not be empty".to_string(),
            });
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::InvalidConfiguration {
                message: format!("base_url must be http(s), got '{}'", self.base_url),
            });
        }
        if self.username.is_empty() {
            return Err(ApiError::InvalidConfiguration {
                message: "username must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Copy with the password masked, for logging.
    pub fn redacted(&self) -> Self {
        Self {
            password: "***".to_string(),
            ..self.clone()
        }
    }
}

/// Reqwest-backed implementation of [`DhisApi`].
pub struct RestDhisApi {
    config: DhisConfig,
    client: Client,
}

impl std::fmt::Debug for RestDhisApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestDhisApi")
            .field("config", &self.config.redacted())
            .finish()
    }
}

impl RestDhisApi {
    /// Create a client from a validated configuration.
    pub fn new(config: DhisConfig) -> ApiResult<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidConfiguration {
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/api/{}", self.config.base_url, resource)
    }

    async fn send(&self, method: Method, url: String, body: Option<&Value>) -> ApiResult<Response> {
        let mut builder = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                }
            } else {
                ApiError::connection_failed_with_source(format!("request to {url} failed"), e)
            }
        })
    }

    async fn decode(&self, resource: &str, response: Response) -> ApiResult<Value> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::AuthenticationFailed);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::not_found(resource));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), body));
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::malformed(resource, e.to_string()))
    }
}

#[async_trait]
impl DhisApi for RestDhisApi {
    #[instrument(skip(self), fields(resource = %query.resource))]
    async fn query(&self, query: &ResourceQuery) -> ApiResult<Value> {
        let url = self.url(&query.resource);
        let params = query.query_params();
        debug!(filters = query.filters.len(), "querying resource");
        let response = self
            .client
            .get(&url)
            .query(&params)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    ApiError::connection_failed_with_source(format!("request to {url} failed"), e)
                }
            })?;
        self.decode(&query.resource, response).await
    }

    #[instrument(skip(self), fields(resource = %mutation.resource, mutation_type = %mutation.mutation_type))]
    async fn mutate(&self, mutation: &ResourceMutation) -> ApiResult<Value> {
        let url = self.url(&mutation.path());
        let method = match mutation.mutation_type {
            MutationType::Create => Method::POST,
            MutationType::Update => Method::PUT,
            MutationType::Delete => Method::DELETE,
        };
        let response = self.send(method, url, mutation.payload.as_ref()).await?;
        self.decode(&mutation.resource, response).await
    }

    async fn send_message(&self, message: &Message) -> ApiResult<()> {
        let payload = serde_json::to_value(message)?;
        let mutation = ResourceMutation::create("messageConversations", payload);
        self.mutate(&mutation).await.map(|_| ())
    }
}
