//! Bucket service held in memory

use futures::{FutureExt, future::BoxFuture};

use super::generic_store::InMemoryStore;
use crate::domain::{
    Bucket, BucketSeries, DomainResult,
    ports::{RemoteBucketClientGat, SeriesRequest},
};

/// Buckets keyed by series and user.
///
/// A bucket is returned when its day overlaps the requested window.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketClient {
    buckets: InMemoryStore<(BucketSeries, String), Vec<Bucket>>,
}

impl MemoryBucketClient {
    /// No buckets
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bucket to `series`
    pub fn add(&self, series: BucketSeries, bucket: Bucket) {
        self.buckets
            .update((series, bucket.user_id.clone()), Vec::new, |buckets| {
                buckets.push(bucket)
            });
    }

    fn find(&self, series: BucketSeries, request: &SeriesRequest) -> Vec<Bucket> {
        let start_day = request.start.map(|t| t.date_naive());
        let end_day = request.end.map(|t| t.date_naive());

        self.buckets
            .with(&(series, request.user_id.clone()), |buckets| {
                buckets
                    .iter()
                    .filter(|b| start_day.is_none_or(|d| b.day >= d))
                    .filter(|b| end_day.is_none_or(|d| b.day <= d))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl RemoteBucketClientGat for MemoryBucketClient {
    type FetchBucketsFuture<'a>
        = BoxFuture<'a, DomainResult<Vec<Bucket>>>
    where
        Self: 'a;

    fn fetch_buckets(
        &self,
        series: BucketSeries,
        request: SeriesRequest,
    ) -> Self::FetchBucketsFuture<'_> {
        async move { Ok(self.find(series, &request)) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TraceId;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn bucket(id: &str, day: u32) -> Bucket {
        Bucket {
            id: id.to_string(),
            user_id: "u1".to_string(),
            day: NaiveDate::from_ymd_opt(2020, 1, day).unwrap(),
            creation_timestamp: Utc.with_ymd_and_hms(2020, 1, day, 23, 0, 0).unwrap(),
            samples: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_window_by_day() {
        let client = MemoryBucketClient::new();
        client.add(BucketSeries::Cbg, bucket("d1", 1));
        client.add(BucketSeries::Cbg, bucket("d2", 2));
        client.add(BucketSeries::Cbg, bucket("d3", 3));
        client.add(BucketSeries::Basal, bucket("b2", 2));

        let request = SeriesRequest {
            user_id: "u1".to_string(),
            session_token: None,
            start: Some(Utc.with_ymd_and_hms(2020, 1, 2, 8, 0, 0).unwrap()),
            end: Some(Utc.with_ymd_and_hms(2020, 1, 3, 1, 0, 0).unwrap()),
            trace_id: TraceId::new(),
        };

        let found = client.fetch_buckets(BucketSeries::Cbg, request.clone()).await.unwrap();
        let ids: Vec<_> = found.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d3"]);

        let basal = client.fetch_buckets(BucketSeries::Basal, request).await.unwrap();
        assert_eq!(basal.len(), 1);
    }
}
