//! Bounded, TTL-aware result cache.
//!
//! Keys are canonical query strings ([`crate::Query::cache_key`]), values
//! are normalized record sets tagged with the provider that produced them.
//! TTLs come from a per-kind table; eviction is least-recently-used once
//! the entry budget is exceeded. A single `RwLock` guards the store, so a
//! read racing a write observes either the old or new entry, never a torn
//! one, and prefix invalidation is atomic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::data_source::RecordSet;
use crate::{ProviderId, QueryKind};

/// Per-kind freshness budget.
///
/// Defaults follow the cadence of the data: intraday-ish prices go stale
/// in minutes, company profiles survive a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTable {
    pub prices: Duration,
    pub financial_metrics: Duration,
    pub company_facts: Duration,
    pub news: Duration,
    pub insider_trades: Duration,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self {
            prices: Duration::from_secs(300),
            financial_metrics: Duration::from_secs(3_600),
            company_facts: Duration::from_secs(86_400),
            news: Duration::from_secs(1_800),
            insider_trades: Duration::from_secs(7_200),
        }
    }
}

impl TtlTable {
    pub const fn ttl_for(&self, kind: QueryKind) -> Duration {
        match kind {
            QueryKind::Prices => self.prices,
            QueryKind::FinancialMetrics => self.financial_metrics,
            QueryKind::CompanyFacts => self.company_facts,
            QueryKind::News => self.news,
            QueryKind::InsiderTrades => self.insider_trades,
        }
    }
}

/// Cache tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum live entries before LRU eviction kicks in.
    pub max_entries: usize,
    pub ttl: TtlTable,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 4_096,
            ttl: TtlTable::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: RecordSet,
    source: ProviderId,
    stored_at: Instant,
    ttl: Duration,
    last_used: u64,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) <= self.ttl
    }
}

/// Counters exposed by the health surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub hit_rate: f64,
}

#[derive(Debug)]
struct CacheInner {
    map: HashMap<String, CacheEntry>,
    /// Monotonic use counter backing LRU ordering.
    tick: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl CacheInner {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
            tick: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_to(&mut self, capacity: usize) {
        while self.map.len() > capacity {
            let Some(oldest) = self
                .map
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            self.map.remove(&oldest);
            self.evictions += 1;
            tracing::debug!(key = %oldest, "evicted least-recently-used cache entry");
        }
    }
}

/// Thread-safe query result cache.
#[derive(Clone)]
pub struct QueryCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    inner: Arc<tokio::sync::RwLock<CacheInner>>,
}

impl QueryCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Arc::new(tokio::sync::RwLock::new(CacheInner::new())),
        }
    }

    pub const fn ttl_for(&self, kind: QueryKind) -> Duration {
        self.config.ttl.ttl_for(kind)
    }

    /// Fresh lookup. Expired entries are reaped and reported as misses.
    pub async fn get(&self, key: &str) -> Option<(RecordSet, ProviderId)> {
        let now = self.clock.now();
        let mut store = self.inner.write().await;

        let freshness = store.map.get(key).map(|entry| entry.is_fresh(now));
        match freshness {
            Some(true) => {
                store.hits += 1;
                let tick = store.next_tick();
                let entry = store.map.get_mut(key).expect("entry present under lock");
                entry.last_used = tick;
                Some((entry.value.clone(), entry.source))
            }
            Some(false) => {
                store.map.remove(key);
                store.misses += 1;
                None
            }
            None => {
                store.misses += 1;
                None
            }
        }
    }

    /// Freshness probe that does not touch hit/miss counters or recency.
    pub async fn is_fresh(&self, key: &str) -> bool {
        let now = self.clock.now();
        let store = self.inner.read().await;
        store.map.get(key).is_some_and(|entry| entry.is_fresh(now))
    }

    pub async fn put(&self, key: String, value: RecordSet, source: ProviderId, ttl: Duration) {
        if self.config.max_entries == 0 || ttl.is_zero() {
            return;
        }

        let now = self.clock.now();
        let mut store = self.inner.write().await;
        let tick = store.next_tick();
        store.map.insert(
            key,
            CacheEntry {
                value,
                source,
                stored_at: now,
                ttl,
                last_used: tick,
            },
        );
        store.evict_to(self.config.max_entries);
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Runs under a single write lock: all matching entries go, or (if the
    /// task is cancelled before the lock is held) none do.
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut store = self.inner.write().await;
        let before = store.map.len();
        store.map.retain(|key, _| !key.starts_with(prefix));
        before - store.map.len()
    }

    pub async fn clear(&self) -> usize {
        let mut store = self.inner.write().await;
        let removed = store.map.len();
        store.map.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let store = self.inner.read().await;
        let lookups = store.hits + store.misses;
        CacheStats {
            entries: store.map.len(),
            hits: store.hits,
            misses: store.misses,
            evictions: store.evictions,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                store.hits as f64 / lookups as f64
            },
        }
    }
}
