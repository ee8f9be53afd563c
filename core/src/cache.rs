//! In-memory query cache shared by the hooks.
//!
//! # Overview
//! Entries are keyed by a `QueryKey` (scope plus optional parameter) and hold
//! the last successful response as JSON. An entry is *fresh* for
//! `stale_time` after it was written unless it has been invalidated; it is
//! *evicted* once nothing has read or written it for `gc_time`.
//!
//! # Design
//! - The cache is an explicit object; callers share it through `Arc`.
//! - `fetch` deduplicates concurrent reads of one key with a per-key gate:
//!   the first caller runs the fetcher while the others wait on the gate and
//!   then see the fresh entry.
//! - An invalidation that matches a key while its fetch is running marks the
//!   fetched result stale when it is stored.
//! - Time comes from a `Clock` so tests can move it by hand.
//! - Lock poisoning is recovered from; a panicking fetcher never holds the
//!   entry map, only its own gate.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(10 * 60);

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryClientOptions {
    pub stale_time: Duration,
    pub gc_time: Duration,
}

impl Default for QueryClientOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            gc_time: DEFAULT_GC_TIME,
        }
    }
}

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryScope {
    AllTodos,
    TodoById,
    TodoStats,
    TodoAttachments,
    AllCategories,
    CategoryById,
    CommentsByTodoId,
}

impl QueryScope {
    pub fn name(self) -> &'static str {
        match self {
            QueryScope::AllTodos => "allTodos",
            QueryScope::TodoById => "getTodoById",
            QueryScope::TodoStats => "todoStats",
            QueryScope::TodoAttachments => "todoAttachments",
            QueryScope::AllCategories => "allCategories",
            QueryScope::CategoryById => "getCategoryById",
            QueryScope::CommentsByTodoId => "getCommentsByTodoId",
        }
    }
}

/// Cache key: the read operation plus its effective parameters.
///
/// The parameter is an id for by-id scopes and the encoded query string for
/// list scopes (`None` when the query is empty).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub scope: QueryScope,
    pub param: Option<String>,
}

impl QueryKey {
    pub fn new(scope: QueryScope) -> Self {
        Self { scope, param: None }
    }

    pub fn with_param(scope: QueryScope, param: impl Into<String>) -> Self {
        Self {
            scope,
            param: Some(param.into()),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "[{}, {}]", self.scope.name(), param),
            None => write!(f, "[{}]", self.scope.name()),
        }
    }
}

/// Selects keys for invalidation. Without a parameter it matches the whole
/// scope; with one it matches that key only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    pub scope: QueryScope,
    pub param: Option<String>,
}

impl KeyFilter {
    pub fn scope(scope: QueryScope) -> Self {
        Self { scope, param: None }
    }

    pub fn exact(scope: QueryScope, param: impl Into<String>) -> Self {
        Self {
            scope,
            param: Some(param.into()),
        }
    }

    pub fn matches(&self, key: &QueryKey) -> bool {
        self.scope == key.scope
            && match &self.param {
                None => true,
                Some(param) => key.param.as_deref() == Some(param.as_str()),
            }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Entry {
    data: Value,
    updated_at: Instant,
    last_access: Instant,
    invalidated: bool,
}

pub struct QueryCache {
    options: QueryClientOptions,
    clock: Box<dyn Clock>,
    entries: Mutex<HashMap<QueryKey, Entry>>,
    gates: Mutex<HashMap<QueryKey, Arc<Mutex<()>>>>,
    /// Keys with a fetch running, flagged when an invalidation matched them
    /// mid-fetch. Always locked after `entries`.
    in_flight: Mutex<HashMap<QueryKey, bool>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("options", &self.options)
            .field("entries", &self.len())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryClientOptions::default())
    }
}

impl QueryCache {
    pub fn new(options: QueryClientOptions) -> Self {
        Self::with_clock(options, SystemClock)
    }

    pub fn with_clock(options: QueryClientOptions, clock: impl Clock + 'static) -> Self {
        Self {
            options,
            clock: Box::new(clock),
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> QueryClientOptions {
        self.options
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<QueryKey, bool>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached data for `key`, fresh or not. Counts as a use.
    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries();
        entries.get_mut(key).map(|entry| {
            entry.last_access = now;
            entry.data.clone()
        })
    }

    /// Cached data for `key` only if it is still fresh.
    pub fn get_fresh(&self, key: &QueryKey) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries();
        match entries.get_mut(key) {
            Some(entry) if !self.entry_is_stale(entry, now) => {
                entry.last_access = now;
                Some(entry.data.clone())
            }
            _ => None,
        }
    }

    pub fn set(&self, key: QueryKey, data: Value) {
        let now = self.clock.now();
        self.entries().insert(
            key,
            Entry {
                data,
                updated_at: now,
                last_access: now,
                invalidated: false,
            },
        );
    }

    /// Missing entries count as stale.
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        let now = self.clock.now();
        self.entries()
            .get(key)
            .map_or(true, |entry| self.entry_is_stale(entry, now))
    }

    fn entry_is_stale(&self, entry: &Entry, now: Instant) -> bool {
        entry.invalidated || now.duration_since(entry.updated_at) >= self.options.stale_time
    }

    /// Mark every matching entry stale. Returns how many matched.
    ///
    /// Fetches in flight for a matching key are flagged too, so their result
    /// lands already stale.
    pub fn invalidate(&self, filter: &KeyFilter) -> usize {
        let mut entries = self.entries();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if filter.matches(key) {
                entry.invalidated = true;
                count += 1;
            }
        }
        for (key, raced) in self.in_flight().iter_mut() {
            if filter.matches(key) {
                *raced = true;
            }
        }
        debug!(scope = filter.scope.name(), param = ?filter.param, count, "invalidated");
        count
    }

    /// Every live entry of `scope`, in no particular order.
    pub fn find_all(&self, scope: QueryScope) -> Vec<(QueryKey, Value)> {
        self.entries()
            .iter()
            .filter(|(key, _)| key.scope == scope)
            .map(|(key, entry)| (key.clone(), entry.data.clone()))
            .collect()
    }

    /// Drop entries unused for `gc_time`. Returns how many were dropped.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now();
        let gc_time = self.options.gc_time;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, entry| now.duration_since(entry.last_access) < gc_time);
        let evicted = before - entries.len();
        drop(entries);

        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);

        if evicted > 0 {
            debug!(evicted, "evicted cache entries");
        }
        evicted
    }

    fn gate(&self, key: &QueryKey) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(gates.entry(key.clone()).or_default())
    }

    /// Return fresh cached data for `key`, or run `fetcher` and cache its
    /// result. Concurrent callers with the same key share one fetch. A failed
    /// fetch leaves any previous entry in place.
    pub fn fetch<T, F>(&self, key: &QueryKey, fetcher: F) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, ApiError>,
    {
        self.evict_expired();

        if let Some(data) = self.get_fresh(key) {
            debug!(%key, "cache hit");
            return decode(data);
        }

        let gate = self.gate(key);
        let _guard = gate.lock().unwrap_or_else(PoisonError::into_inner);

        // Another caller may have filled the entry while we waited.
        if let Some(data) = self.get_fresh(key) {
            debug!(%key, "cache hit after wait");
            return decode(data);
        }

        debug!(%key, "cache miss");
        self.in_flight().insert(key.clone(), false);
        let fetched = fetcher().and_then(|value| {
            serde_json::to_value(&value)
                .map(|data| (value, data))
                .map_err(|e| ApiError::Serialization(e.to_string()))
        });
        match fetched {
            Ok((value, data)) => {
                self.store_fetched(key, data);
                Ok(value)
            }
            Err(err) => {
                self.in_flight().remove(key);
                Err(err)
            }
        }
    }

    /// Store a fetch result, stale if an invalidation raced with the fetch.
    fn store_fetched(&self, key: &QueryKey, data: Value) {
        let now = self.clock.now();
        let mut entries = self.entries();
        let raced = self.in_flight().remove(key).unwrap_or(false);
        if raced {
            debug!(%key, "invalidated during fetch");
        }
        entries.insert(
            key.clone(),
            Entry {
                data,
                updated_at: now,
                last_access: now,
                invalidated: raced,
            },
        );
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::Deserialization(e.to_string()))
}
