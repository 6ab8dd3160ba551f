//! Process-wide memoization with expiry.
//!
//! Key -> (value, deadline) behind an explicit type instead of a global map,
//! with the clock injected so tests can drive time.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (V, Instant)>,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, entries: HashMap::new(), clock }
    }

    /// Returns the live value for `key`, evicting it first if expired.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let now = self.clock.now();
        if let Some((_, deadline)) = self.entries.get(key) {
            if *deadline <= now {
                self.entries.remove(key);
            }
        }
        self.entries.get(key).map(|(value, _)| value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        let deadline = self.clock.now() + self.ttl;
        self.entries.insert(key, (value, deadline));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self { base: Instant::now(), offset: Mutex::new(Duration::ZERO) }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    #[test]
    fn test_hit_before_expiry() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = TtlCache::with_clock(Duration::from_secs(60), clock.clone());
        cache.insert("jakarta", 31);
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get(&"jakarta"), Some(&31));
    }

    #[test]
    fn test_expires_and_evicts() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = TtlCache::with_clock(Duration::from_secs(60), clock.clone());
        cache.insert("jakarta", 31);
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get(&"jakarta"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_resets_deadline() {
        let clock = Arc::new(ManualClock::new());
        let mut cache = TtlCache::with_clock(Duration::from_secs(60), clock.clone());
        cache.insert("bandung", 1);
        clock.advance(Duration::from_secs(45));
        cache.insert("bandung", 2);
        clock.advance(Duration::from_secs(45));
        assert_eq!(cache.get(&"bandung"), Some(&2));
    }
}
