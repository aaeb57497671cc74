//! Cursor pagination.
//!
//! Every paged endpoint answers with a `data` array plus an optional
//! `pagination.cursor`. [`Page`] exposes those pieces so [`paginate`] can
//! walk any paged result type.

use serde::Deserialize;
use tracing::debug;

use super::{ApiClient, Method};
use crate::error::ApiError;

/// A page of results.
pub trait Page {
    type Item;

    /// Cursor for the next page; `None` on the last one.
    fn cursor(&self) -> Option<&str>;

    /// Total count across all pages, when the endpoint reports it.
    fn total(&self) -> Option<u64>;

    fn items(self) -> Vec<Self::Item>;
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    pub cursor: Option<String>,
}

/// The common `{"data": [...], "pagination": {...}, "total": n}` shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct DataPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub pagination: Pagination,
    pub total: Option<u64>,
}

impl<T> Page for DataPage<T> {
    type Item = T;

    fn cursor(&self) -> Option<&str> {
        self.pagination.cursor.as_deref().filter(|c| !c.is_empty())
    }

    fn total(&self) -> Option<u64> {
        self.total
    }

    fn items(self) -> Vec<T> {
        self.data
    }
}

/// Fetch every page of `path`, following cursors, stopping after `limit`
/// items when one is given.
pub async fn paginate<A, P>(
    api: &A,
    path: &str,
    params: &[(&str, &str)],
    limit: Option<usize>,
) -> Result<Vec<P::Item>, ApiError>
where
    A: ApiClient + ?Sized,
    P: Page + for<'de> Deserialize<'de>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let mut query: Vec<(&str, &str)> = params.to_vec();
        if let Some(after) = cursor.as_deref() {
            query.push(("after", after));
        }
        let page: P = api.request(Method::Get, path, &query).await?.decode()?;

        let next = page.cursor().map(str::to_owned);
        if items.is_empty()
            && let Some(total) = page.total()
        {
            debug!(path, total, "paginating");
        }
        items.extend(page.items());

        if let Some(limit) = limit
            && items.len() >= limit
        {
            items.truncate(limit);
            break;
        }
        match next {
            // A repeated cursor would loop forever
            Some(next) if cursor.as_deref() != Some(next.as_str()) => cursor = Some(next),
            _ => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiResponse;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    /// Serves `pages` in order, keyed by the `after` cursor.
    struct PagedApi {
        pages: Vec<Value>,
    }

    #[async_trait]
    impl ApiClient for PagedApi {
        async fn request(
            &self,
            _method: Method,
            _path: &str,
            params: &[(&str, &str)],
        ) -> Result<ApiResponse, ApiError> {
            let index = params
                .iter()
                .find(|(k, _)| *k == "after")
                .map(|(_, v)| v.parse::<usize>().unwrap())
                .unwrap_or(0);
            Ok(ApiResponse {
                status: 200,
                body: self.pages[index].clone(),
            })
        }
    }

    fn api() -> PagedApi {
        PagedApi {
            pages: vec![
                json!({"data": [1, 2], "pagination": {"cursor": "1"}, "total": 5}),
                json!({"data": [3, 4], "pagination": {"cursor": "2"}}),
                json!({"data": [5], "pagination": {}}),
            ],
        }
    }

    #[tokio::test]
    async fn follows_cursors_to_the_end() {
        let items = paginate::<_, DataPage<u32>>(&api(), "things", &[], None)
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn stops_at_limit() {
        let items = paginate::<_, DataPage<u32>>(&api(), "things", &[("first", "2")], Some(3))
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3]);
    }
}
