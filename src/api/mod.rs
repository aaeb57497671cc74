//! REST collaborator.
//!
//! The realtime clients only need one thing from the HTTP API: resolving
//! the identity behind a token before opening a session. Everything goes
//! through the generic [`ApiClient::request`] so tests can stand in a fake.

mod helix;
mod paging;

pub use helix::HelixClient;
pub use paging::{DataPage, Page, paginate};

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// A successful response.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Decode the body into `T`.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// `request(method, path, params) -> response`
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Issue one request. `path` is relative to the API base; `params` are
    /// query parameters and may repeat a key.
    async fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<ApiResponse, ApiError>;
}

/// The user behind a token or login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

/// Look up `login`, or the token owner when `login` is `None`.
pub async fn resolve_identity<A>(api: &A, login: Option<&str>) -> Result<Identity, ApiError>
where
    A: ApiClient + ?Sized,
{
    let params: Vec<(&str, &str)> = login.map(|l| ("login", l)).into_iter().collect();
    let response = api.request(Method::Get, "users", &params).await?;
    let page: DataPage<Identity> = response.decode()?;
    page.data
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::NotFound(login.unwrap_or("token owner").to_owned()))
}
