//! HTTP client for the remote bucket service

use std::time::Duration;

use futures::{FutureExt, future::BoxFuture};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::domain::{
    Bucket, BucketSeries, DomainError, DomainResult, value_objects::format_time,
    ports::{RemoteBucketClientGat, SeriesRequest},
};

/// Header carrying the caller credential
pub const SESSION_TOKEN_HEADER: &str = "x-tidepool-session-token";
/// Header carrying the trace id
pub const TRACE_SESSION_HEADER: &str = "x-tidepool-trace-session";

/// `GET {base}/v1/{series}/{userId}?startDate&endDate`
#[derive(Debug, Clone)]
pub struct HttpBucketClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpBucketClient {
    /// Client with a per-call timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::remote(format!("cannot build HTTP client: {e}")))?;

        Self::with_client(base_url, client)
    }

    /// Client reusing an existing connection pool
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> DomainResult<Self> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .map_err(|e| DomainError::remote(format!("invalid base URL '{raw}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(DomainError::remote(format!("base URL '{raw}' cannot carry a path")));
        }

        Ok(Self { base_url, client })
    }

    /// Endpoint for one series.
    ///
    /// The user id is a single escaped path segment; it can never change the
    /// path, query or fragment of the request.
    pub fn series_url(&self, series: BucketSeries, user_id: &str) -> DomainResult<Url> {
        if matches!(user_id, "" | "." | "..") {
            return Err(DomainError::InvalidInput(format!(
                "'{user_id}' is not a valid user id"
            )));
        }

        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|()| DomainError::remote("base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["v1", series.type_tag(), user_id]);
        Ok(url)
    }

    async fn get(&self, series: BucketSeries, request: SeriesRequest) -> DomainResult<Vec<Bucket>> {
        let mut url = self.series_url(series, &request.user_id)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(start) = request.start {
                query.append_pair("startDate", &format_time(start));
            }
            if let Some(end) = request.end {
                query.append_pair("endDate", &format_time(end));
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let mut builder = self
            .client
            .get(url)
            .header(TRACE_SESSION_HEADER, request.trace_id.to_string());
        if let Some(token) = &request.session_token {
            builder = builder.header(SESSION_TOKEN_HEADER, token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DomainError::remote(format!("{series} request failed: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                let buckets: Vec<Bucket> = response
                    .json()
                    .await
                    .map_err(|e| DomainError::remote(format!("{series} response invalid: {e}")))?;
                debug!(trace_id = %request.trace_id, %series, buckets = buckets.len(), "buckets fetched");
                Ok(buckets)
            }
            StatusCode::NOT_FOUND => Err(DomainError::not_found(format!(
                "no {series} buckets for user {}",
                request.user_id
            ))),
            status => Err(DomainError::remote(format!("{series} request returned {status}"))),
        }
    }
}

impl RemoteBucketClientGat for HttpBucketClient {
    type FetchBucketsFuture<'a>
        = BoxFuture<'a, DomainResult<Vec<Bucket>>>
    where
        Self: 'a;

    fn fetch_buckets(
        &self,
        series: BucketSeries,
        request: SeriesRequest,
    ) -> Self::FetchBucketsFuture<'_> {
        self.get(series, request).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> HttpBucketClient {
        HttpBucketClient::with_client("http://buckets:9107/", reqwest::Client::new()).unwrap()
    }

    #[test]
    fn test_series_url() {
        let client = client();
        assert_eq!(
            client.series_url(BucketSeries::Cbg, "u1").unwrap().as_str(),
            "http://buckets:9107/v1/cbg/u1"
        );
        assert_eq!(
            client.series_url(BucketSeries::Basal, "u1").unwrap().as_str(),
            "http://buckets:9107/v1/basal/u1"
        );
    }

    #[test]
    fn test_base_path_prefix_is_kept() {
        let client =
            HttpBucketClient::with_client("https://api.internal/buckets/", reqwest::Client::new())
                .unwrap();
        assert_eq!(
            client.series_url(BucketSeries::Cbg, "u1").unwrap().path(),
            "/buckets/v1/cbg/u1"
        );
    }

    #[test]
    fn test_user_id_is_one_escaped_segment() {
        let url = client()
            .series_url(BucketSeries::Cbg, "../../admin/users?all=1#")
            .unwrap();

        assert_eq!(url.host_str(), Some("buckets"));
        assert!(url.path().starts_with("/v1/cbg/"));
        assert_eq!(url.path_segments().map(Iterator::count), Some(3));
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
        assert!(!url.path().contains("admin/users"));
    }

    #[test]
    fn test_dot_segments_rejected() {
        for user_id in ["", ".", ".."] {
            assert!(matches!(
                client().series_url(BucketSeries::Basal, user_id),
                Err(DomainError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(HttpBucketClient::with_client("not a url", reqwest::Client::new()).is_err());
        assert!(HttpBucketClient::with_client("mailto:ops@example.com", reqwest::Client::new()).is_err());
    }
}
