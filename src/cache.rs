//! Memoization of recent query results.
//!
//! Keys are *fingerprints*: each state component divided by the configured
//! quantization step and rounded. States that differ only by jitter below
//! the step share a fingerprint and therefore a single slot, so a noisy
//! stream of near-identical queries occupies one entry instead of thousands.
//!
//! A slot answers only for the exact state bits it was filled with. A query
//! with the same fingerprint but different bits recomputes and takes the
//! slot over. Cached answers are therefore always bit-identical to what the
//! evaluator returns, and disabling the cache changes latency only.
//!
//! The table is split into shards, each an LRU under its own mutex, so
//! unrelated queries rarely contend. No lock is held while computing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::evaluator::QueryResult;

/// Quantized state used as the cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(Box<[i64]>);

impl Fingerprint {
    pub fn of(state: &[f64], step: f64) -> Self {
        // `as` saturates (and maps NaN to 0); collisions are resolved by the
        // exact-bits check, never by returning a neighbour's answer.
        Self(state.iter().map(|x| (x / step).round() as i64).collect())
    }

    pub fn cells(&self) -> &[i64] {
        &self.0
    }
}

struct CacheEntry {
    state: Box<[u64]>,
    result: QueryResult,
}

impl CacheEntry {
    fn matches(&self, state: &[f64]) -> bool {
        self.state.len() == state.len()
            && self.state.iter().zip(state).all(|(a, b)| *a == b.to_bits())
    }
}

/// Counters since construction (or the last [`QueryCache::clear`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for a different fingerprint.
    pub evictions: u64,
    /// Slots taken over by a same-fingerprint, different-bits state.
    pub replaced: u64,
    pub len: usize,
    pub capacity: usize,
}

pub struct QueryCache {
    shards: Vec<Mutex<LruCache<Fingerprint, CacheEntry>>>,
    step: f64,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    replaced: AtomicU64,
}

impl QueryCache {
    /// `None` when `capacity == 0`: caching disabled.
    ///
    /// Capacity is spread over at most `shards` shards (never more shards
    /// than entries); the per-shard capacities sum to exactly `capacity`.
    pub fn new(capacity: usize, quantization_step: f64, shards: usize) -> Option<Self> {
        if capacity == 0 {
            return None;
        }
        let n = shards.clamp(1, capacity);
        let base = capacity / n;
        let extra = capacity % n;
        let shards = (0..n)
            .map(|i| {
                let cap = base + usize::from(i < extra);
                // cap >= 1 because n <= capacity
                Mutex::new(LruCache::new(NonZeroUsize::new(cap).unwrap_or(NonZeroUsize::MIN)))
            })
            .collect();
        let step = if quantization_step.is_finite() && quantization_step > 0.0 {
            quantization_step
        } else {
            f64::EPSILON
        };
        Some(Self {
            shards,
            step,
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        })
    }

    /// Cached answer for exactly `state`, or `compute()` stored and returned.
    /// Errors from `compute` pass through and are not cached.
    pub fn get_or_compute<E>(
        &self,
        state: &[f64],
        compute: impl FnOnce() -> Result<QueryResult, E>,
    ) -> Result<QueryResult, E> {
        let key = Fingerprint::of(state, self.step);
        let shard = &self.shards[self.shard_index(&key)];

        if let Some(entry) = shard.lock().get(&key) {
            if entry.matches(state) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.result.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let result = compute()?;

        let entry = CacheEntry {
            state: state.iter().map(|x| x.to_bits()).collect(),
            result: result.clone(),
        };
        let displaced = shard.lock().push(key.clone(), entry);
        match displaced {
            Some((old_key, _)) if old_key == key => {
                self.replaced.fetch_add(1, Ordering::Relaxed);
            }
            Some(_) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            None => {}
        }
        Ok(result)
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.replaced.store(0, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn quantization_step(&self) -> f64 {
        self.step
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            len: self.len(),
            capacity: self.capacity,
        }
    }

    fn shard_index(&self, key: &Fingerprint) -> usize {
        if self.shards.len() == 1 {
            return 0;
        }
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        (h.finish() % self.shards.len() as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ModelId;
    use std::cell::Cell;

    fn result(v: f64) -> QueryResult {
        QueryResult {
            value: v,
            gradient: vec![v, -v],
            within_domain: true,
            model: ModelId([0; 32]),
        }
    }

    fn ok(v: f64) -> Result<QueryResult, ()> {
        Ok(result(v))
    }

    #[test]
    fn zero_capacity_disables() {
        assert!(QueryCache::new(0, 1e-6, 4).is_none());
    }

    #[test]
    fn capacity_is_split_exactly() {
        let c = QueryCache::new(10, 1e-6, 4).unwrap();
        assert_eq!(c.shard_count(), 4);
        assert_eq!(c.capacity(), 10);
        let tiny = QueryCache::new(2, 1e-6, 16).unwrap();
        assert_eq!(tiny.shard_count(), 2);
    }

    #[test]
    fn second_identical_query_hits() {
        let c = QueryCache::new(8, 1e-6, 1).unwrap();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            ok(1.5)
        };
        assert_eq!(c.get_or_compute(&[0.1, 0.2], compute).unwrap().value, 1.5);
        let again = c
            .get_or_compute(&[0.1, 0.2], || {
                calls.set(calls.get() + 1);
                ok(99.0)
            })
            .unwrap();
        assert_eq!(again.value, 1.5);
        assert_eq!(calls.get(), 1);
        let s = c.stats();
        assert_eq!((s.hits, s.misses, s.len), (1, 1, 1));
    }

    #[test]
    fn jitter_shares_a_slot_but_never_an_answer() {
        let c = QueryCache::new(8, 1e-3, 1).unwrap();
        let a = [0.5, 0.5];
        let b = [0.5 + 1e-9, 0.5];
        assert_eq!(Fingerprint::of(&a, 1e-3), Fingerprint::of(&b, 1e-3));

        c.get_or_compute(&a, || ok(1.0)).unwrap();
        let rb = c.get_or_compute(&b, || ok(2.0)).unwrap();
        assert_eq!(rb.value, 2.0);
        assert_eq!(c.len(), 1);
        assert_eq!(c.stats().replaced, 1);

        // b now owns the slot
        assert_eq!(c.get_or_compute(&b, || ok(3.0)).unwrap().value, 2.0);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let c = QueryCache::new(2, 1e-6, 1).unwrap();
        c.get_or_compute(&[1.0], || ok(1.0)).unwrap();
        c.get_or_compute(&[2.0], || ok(2.0)).unwrap();
        // touch 1.0 so 2.0 becomes the oldest
        c.get_or_compute(&[1.0], || ok(-1.0)).unwrap();
        c.get_or_compute(&[3.0], || ok(3.0)).unwrap();

        assert_eq!(c.stats().evictions, 1);
        assert_eq!(c.get_or_compute(&[1.0], || ok(-1.0)).unwrap().value, 1.0);
        assert_eq!(c.get_or_compute(&[2.0], || ok(20.0)).unwrap().value, 20.0);
    }

    #[test]
    fn errors_pass_through_uncached() {
        let c = QueryCache::new(4, 1e-6, 1).unwrap();
        let err: Result<QueryResult, &str> = c.get_or_compute(&[0.0], || Err("boom"));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(c.is_empty());
        let r: Result<QueryResult, &str> = c.get_or_compute(&[0.0], || Ok(result(4.0)));
        assert_eq!(r.unwrap().value, 4.0);
    }

    #[test]
    fn clear_empties_and_resets() {
        let c = QueryCache::new(4, 1e-6, 2).unwrap();
        c.get_or_compute(&[0.0], || ok(1.0)).unwrap();
        c.get_or_compute(&[0.0], || ok(1.0)).unwrap();
        c.clear();
        assert_eq!(c.stats(), CacheStats {
            capacity: 4,
            ..Default::default()
        });
    }

    #[test]
    fn signed_zero_is_a_different_state() {
        let c = QueryCache::new(4, 1e-6, 1).unwrap();
        c.get_or_compute(&[0.0], || ok(1.0)).unwrap();
        let r = c.get_or_compute(&[-0.0], || ok(2.0)).unwrap();
        assert_eq!(r.value, 2.0);
    }

    #[test]
    fn invalid_step_falls_back() {
        let c = QueryCache::new(4, 0.0, 1).unwrap();
        assert!(c.quantization_step() > 0.0);
    }

    #[test]
    fn concurrent_use_is_consistent() {
        let c = QueryCache::new(64, 1e-6, 8).unwrap();
        std::thread::scope(|s| {
            for t in 0..4 {
                let c = &c;
                s.spawn(move || {
                    for i in 0..200 {
                        let x = (i % 50) as f64;
                        let r = c.get_or_compute(&[x], || ok(x * 2.0)).unwrap();
                        assert_eq!(r.value, x * 2.0, "thread {}", t);
                    }
                });
            }
        });
        let s = c.stats();
        assert_eq!(s.hits + s.misses, 800);
        assert!(s.len <= 64);
    }
}
