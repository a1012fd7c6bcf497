//! Read-through cache in front of store range queries.
//!
//! Keys are canonical date-range buckets. The cache is an optional
//! accelerator: when disabled (capacity 0) or on any miss, queries fall
//! through to the store, which stays the sole source of truth. Nothing here
//! is persisted; losing the cache only costs latency.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::sync::Cache;
use serde::Deserialize;

use crate::db::{DbError, RemediationEvent, StatusSample, Store};

/// Canonicalized query ranges the dashboard offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RangeBucket {
    #[serde(rename = "last_12_hours")]
    Last12Hours,
    #[serde(rename = "last_24_hours")]
    Last24Hours,
    #[serde(rename = "last_48_hours")]
    Last48Hours,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "all_time")]
    AllTime,
}

impl RangeBucket {
    /// Inclusive start of the range relative to `now`, or the epoch floor
    /// for the unbounded bucket.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            RangeBucket::Last12Hours => now - ChronoDuration::hours(12),
            RangeBucket::Last24Hours => now - ChronoDuration::hours(24),
            RangeBucket::Last48Hours => now - ChronoDuration::hours(48),
            RangeBucket::Last7Days => now - ChronoDuration::days(7),
            RangeBucket::AllTime => DateTime::<Utc>::MIN_UTC,
        }
    }

    fn key(&self, kind: &str) -> String {
        let bucket = match self {
            RangeBucket::Last12Hours => "last_12_hours",
            RangeBucket::Last24Hours => "last_24_hours",
            RangeBucket::Last48Hours => "last_48_hours",
            RangeBucket::Last7Days => "last_7_days",
            RangeBucket::AllTime => "all_time",
        };
        format!("{}:{}", kind, bucket)
    }
}

/// Read-through cache over the store's dashboard queries.
///
/// `None` caches mean the layer is disabled and acts as a plain pass-through.
pub struct CacheLayer {
    store: Store,
    samples: Option<Cache<String, Arc<Vec<StatusSample>>>>,
    events: Option<Cache<String, Arc<Vec<RemediationEvent>>>>,
}

impl CacheLayer {
    /// `capacity` of 0 disables caching entirely; every read goes straight to
    /// the store.
    pub fn new(store: Store, capacity: u64, ttl: Duration) -> Self {
        if capacity == 0 {
            return Self {
                store,
                samples: None,
                events: None,
            };
        }

        let samples = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();
        let events = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .build();

        Self {
            store,
            samples: Some(samples),
            events: Some(events),
        }
    }

    /// Status samples for the bucket, cached for the configured TTL.
    pub fn samples(&self, bucket: RangeBucket) -> Result<Arc<Vec<StatusSample>>, DbError> {
        let cache = match &self.samples {
            Some(c) => c,
            None => {
                return Ok(Arc::new(self.store.samples_since(bucket.start(Utc::now()))?));
            }
        };

        let key = bucket.key("samples");
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let fresh = Arc::new(self.store.samples_since(bucket.start(Utc::now()))?);
        cache.insert(key, fresh.clone());
        Ok(fresh)
    }

    /// Remediation events for the bucket, cached for the configured TTL.
    pub fn events(&self, bucket: RangeBucket) -> Result<Arc<Vec<RemediationEvent>>, DbError> {
        let cache = match &self.events {
            Some(c) => c,
            None => {
                return Ok(Arc::new(self.store.events_since(bucket.start(Utc::now()))?));
            }
        };

        let key = bucket.key("events");
        if let Some(hit) = cache.get(&key) {
            return Ok(hit);
        }

        let fresh = Arc::new(self.store.events_since(bucket.start(Utc::now()))?);
        cache.insert(key, fresh.clone());
        Ok(fresh)
    }
}
