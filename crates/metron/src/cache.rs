//! The concurrent expression cache with sliding expiration.
//!
//! Resolved units are memoised under the expression text (ASCII spaces
//! removed, case preserved). Lookups are lock-free; insertion is
//! add-if-absent, so two concurrent misses on one key may both resolve but
//! only one entry survives. Expiration is driven externally: the host calls
//! [`ExpressionCache::expiration_tick`] from its periodic memory-pressure
//! collaborator, and an entry survives as long as it is touched between two
//! consecutive ticks.

use std::{
    borrow::Cow,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::{
    error::UnitResult,
    units::{Unit, UnitInfo},
};

pub(crate) struct ExpressionCache {
    entries: DashMap<Box<str>, CacheEntry, ahash::RandomState>,
    sliding_expiration: Duration,
    pressure_threshold: u8,
    clear_percentage: u8,
    /// Millisecond timestamps are measured from here.
    epoch: Instant,
}

#[derive(Clone)]
struct CacheEntry(Arc<EntryInner>);

struct EntryInner {
    unit: Unit,
    /// Set on every hit, cleared by the tick; an entry untouched across a
    /// full tick starts aging.
    touched: AtomicBool,
    last_seen_millis: AtomicU64,
}

impl ExpressionCache {
    pub(crate) fn new(sliding_expiration: Duration, pressure_threshold: u8, clear_percentage: u8) -> Self {
        Self {
            entries: DashMap::with_hasher(ahash::RandomState::new()),
            sliding_expiration,
            pressure_threshold,
            clear_percentage,
            epoch: Instant::now(),
        }
    }

    /// Returns the cached unit for `text`, resolving and inserting on miss.
    pub(crate) fn lookup_or_resolve(
        &self,
        text: &str,
        resolve: impl FnOnce(&str) -> UnitResult<UnitInfo>,
    ) -> UnitResult<Unit> {
        let key = cache_key(text);
        if let Some(entry) = self.entries.get(key.as_ref()) {
            let inner = entry.value();
            inner.0.touched.store(true, Ordering::Release);
            return Ok(inner.0.unit.clone());
        }
        let info = resolve(text)?;
        let unit = Unit::new(info, key.as_ref());
        let inner = CacheEntry(Arc::new(EntryInner {
            unit,
            touched: AtomicBool::new(true),
            last_seen_millis: AtomicU64::new(self.now_millis()),
        }));
        // add-if-absent: a racing insert wins and our resolution is dropped.
        let entry = self.entries.entry(key.into_owned().into_boxed_str()).or_insert(inner);
        Ok(entry.value().0.unit.clone())
    }

    /// One pass of the sliding-expiration protocol, optionally followed by
    /// pressure-driven eviction. Never fails; outcomes are logged.
    pub(crate) fn expiration_tick(&self, memory_pressure_percent: u8) {
        let now = self.now_millis();
        let horizon = u64::try_from(self.sliding_expiration.as_millis()).unwrap_or(u64::MAX);
        let mut expired = 0usize;
        self.entries.retain(|_, entry| {
            if entry.0.touched.swap(false, Ordering::AcqRel) {
                entry.0.last_seen_millis.store(now, Ordering::Release);
                return true;
            }
            let last_seen = entry.0.last_seen_millis.load(Ordering::Acquire);
            let keep = now.saturating_sub(last_seen) <= horizon;
            if !keep {
                expired += 1;
            }
            keep
        });
        if expired > 0 {
            log::debug!("expired {expired} cached unit expressions");
        }
        if memory_pressure_percent >= self.pressure_threshold {
            self.evict_under_pressure();
        }
    }

    /// Evicts the least-recently-seen fraction of surviving entries.
    fn evict_under_pressure(&self) {
        let mut survivors: Vec<(Box<str>, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().0.last_seen_millis.load(Ordering::Acquire)))
            .collect();
        let evict = survivors.len() * usize::from(self.clear_percentage) / 100;
        if evict == 0 {
            return;
        }
        survivors.sort_by(|a, b| a.1.cmp(&b.1));
        for (key, _) in survivors.into_iter().take(evict) {
            self.entries.remove(&key);
        }
        log::warn!("high memory pressure: evicted {evict} least recently seen unit expressions");
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// The cache key: the expression with ASCII spaces removed. Case is
/// significant; `M` (mega) and `m` (milli) spell different units.
fn cache_key(text: &str) -> Cow<'_, str> {
    if text.contains(' ') {
        Cow::Owned(text.chars().filter(|&c| c != ' ').collect())
    } else {
        Cow::Borrowed(text)
    }
}
