// src/geocode/mod.rs
//
// Resolves free-text location queries to coordinates through a persistent
// cache and a single process-wide rate limiter, so the upstream service sees
// at most one request per interval no matter how many passes are resolving.

pub mod store;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

pub use store::CacheStore;

const SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
const USER_AGENT: &str = concat!("triplog/", env!("CARGO_PKG_VERSION"));

/// Minimum spacing between the starts of two outbound lookups, per the
/// upstream service's absolute-maximum policy of one request per second,
/// with some slack.
pub const MIN_CALL_INTERVAL: Duration = Duration::from_millis(1100);

/// A resolved location. Also the value persisted in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

/// One candidate in the search response. The service returns coordinates as
/// strings.
#[derive(Debug, Deserialize)]
struct Candidate {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

/// Shared last-call clock. A single value for the whole process: concurrent
/// resolution passes serialize their outbound calls through it.
struct Limiter {
    last_call: Option<Instant>,
}

pub struct Geocoder {
    client: Client,
    search_url: String,
    min_interval: Duration,
    store: CacheStore,
    cache: Mutex<HashMap<String, GeoPoint>>,
    limiter: AsyncMutex<Limiter>,
}

impl Geocoder {
    /// Build a geocoder against the default search endpoint, hydrating the
    /// in-memory cache from `cache_path`. An unreadable or corrupt cache
    /// file degrades to an empty cache.
    pub fn new(cache_path: impl Into<std::path::PathBuf>) -> Self {
        Self::with_config(SEARCH_URL, cache_path, MIN_CALL_INTERVAL)
    }

    /// Endpoint- and interval-injectable constructor. `new` and the tests
    /// both funnel through here so the waiting code path is the same.
    pub fn with_config(
        search_url: impl Into<String>,
        cache_path: impl Into<std::path::PathBuf>,
        min_interval: Duration,
    ) -> Self {
        let store = CacheStore::new(cache_path);
        let cache = match store.load() {
            Ok(map) => {
                debug!(entries = map.len(), "geocode cache hydrated");
                map
            }
            Err(e) => {
                warn!("geocode cache unreadable, starting empty: {e:#}");
                HashMap::new()
            }
        };

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            search_url: search_url.into(),
            min_interval,
            store,
            cache: Mutex::new(cache),
            limiter: AsyncMutex::new(Limiter { last_call: None }),
        }
    }

    /// Resolve a free-text query to coordinates.
    ///
    /// Empty queries and cache hits return immediately with no network
    /// access and no wait. A miss reserves the next send slot against the
    /// shared last-call clock (at least `min_interval` after the previous
    /// call's start), sleeps until that slot, then issues one lookup.
    /// Failures and empty results return `None` and are not cached, so the
    /// same query retries on its next call. Successful results are cached
    /// and persisted before returning; a persistence failure is logged and
    /// swallowed.
    pub async fn resolve(&self, query: &str) -> Option<GeoPoint> {
        let key = query.trim();
        if key.is_empty() {
            return None;
        }

        if let Some(hit) = self.lookup_cached(key) {
            debug!(query = key, "geocode cache hit");
            return Some(hit);
        }

        // Reserve the send slot. The shared timestamp records the call's
        // start time, not its response time, and is advanced while the lock
        // is held so concurrent callers space out correctly.
        let slot = {
            let mut limiter = self.limiter.lock().await;
            let now = Instant::now();
            let slot = match limiter.last_call {
                Some(prev) => now.max(prev + self.min_interval),
                None => now,
            };
            limiter.last_call = Some(slot);
            slot
        };
        sleep_until(slot).await;

        let point = self.search(key).await?;

        {
            let mut cache = self.cache.lock().expect("geocode cache lock");
            cache.insert(key.to_string(), point.clone());
            if let Err(e) = self.store.save(&cache) {
                // The caller still gets the resolved point.
                warn!(query = key, "persisting geocode cache failed: {e:#}");
            }
        }
        Some(point)
    }

    /// Drop every cache entry, in memory and on disk. The next resolve of
    /// any previously cached query goes outbound again.
    pub fn clear(&self) {
        self.cache.lock().expect("geocode cache lock").clear();
        if let Err(e) = self.store.clear() {
            warn!("clearing geocode cache failed: {e:#}");
        }
    }

    pub fn cached_len(&self) -> usize {
        self.cache.lock().expect("geocode cache lock").len()
    }

    fn lookup_cached(&self, key: &str) -> Option<GeoPoint> {
        self.cache.lock().expect("geocode cache lock").get(key).cloned()
    }

    /// One outbound search: GET with format=json, the query, and limit=1.
    /// Any transport error, non-success status, empty candidate list or
    /// non-finite coordinate is a "no match".
    async fn search(&self, query: &str) -> Option<GeoPoint> {
        let resp = self
            .client
            .get(&self.search_url)
            .query(&[("format", "json"), ("q", query), ("limit", "1")])
            .send()
            .await;

        let resp = match resp.and_then(|r| r.error_for_status()) {
            Ok(r) => r,
            Err(e) => {
                warn!(query, "geocode request failed: {e}");
                return None;
            }
        };

        let candidates: Vec<Candidate> = match resp.json().await {
            Ok(c) => c,
            Err(e) => {
                warn!(query, "geocode response unreadable: {e}");
                return None;
            }
        };

        let first = candidates.into_iter().next()?;
        let lat: f64 = first.lat.parse().ok()?;
        let lon: f64 = first.lon.parse().ok()?;
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        Some(GeoPoint {
            lat,
            lon,
            label: first.display_name,
        })
    }
}
