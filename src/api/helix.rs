//! `reqwest`-backed [`ApiClient`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{ApiClient, ApiResponse, Method};
use crate::config::ApiConfig;
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the Helix REST API.
#[derive(Clone)]
pub struct HelixClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    token: Option<String>,
}

impl HelixClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        token: Option<String>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("twitchlink/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            client_id: client_id.into(),
            // Helix wants a bare bearer token
            token: token.map(|t| t.trim_start_matches("oauth:").to_owned()),
        })
    }

    /// `fallback_token` is used when the section has no token of its own.
    pub fn from_config(config: &ApiConfig, fallback_token: Option<&str>) -> Result<Self, ApiError> {
        let token = config
            .oauth_token
            .clone()
            .or_else(|| fallback_token.map(str::to_owned));
        Self::new(config.base_url.clone(), config.client_id.clone(), token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ApiClient for HelixClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiError> {
        let url = self.url(path);
        let mut builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Patch => self.http.patch(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        }
        .header("Client-Id", &self.client_id)
        .query(params);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        debug!(%method, %url, "api request");
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}
