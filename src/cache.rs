use std::{collections::HashMap, sync::RwLock};

use bytes::Bytes;
use tracing::error;

/// Item content plus the content type the store reported for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachedEntry {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl From<Bytes> for CachedEntry {
    fn from(bytes: Bytes) -> Self {
        Self {
            bytes,
            content_type: None,
        }
    }
}

/// Item content keyed by `container/item`.
///
/// A single map behind one reader/writer lock: lookups run in parallel, every
/// write serializes against all other access. Entries live until the process
/// exits.
#[derive(Debug, Default)]
pub struct ObjectCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl ObjectCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, entry: impl Into<CachedEntry>) {
        let mut entries = match self.entries.write() {
            Err(err) => {
                error!(error_message=%err, error_group="acquire_guard", key=key);
                return;
            }
            Ok(guard) => guard,
        };

        entries.insert(key.to_string(), entry.into());
    }

    /// Returns a cheap clone of the stored entry.
    pub fn get(&self, key: &str) -> Option<CachedEntry> {
        let entries = match self.entries.read() {
            Err(err) => {
                error!(error_message=%err, error_group="acquire_guard", key=key);
                return None;
            }
            Ok(guard) => guard,
        };

        entries.get(key).cloned()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Err(err) => {
                error!(error_message=%err, error_group="acquire_guard");
                0
            }
            Ok(guard) => guard.len(),
        }
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    #[test]
    fn test_set_get() {
        let cache = ObjectCache::new();

        let cases = vec![
            ("alpha/report.csv", "x,y\n1,2\n"),
            ("alpha/report.csv", "x,y\n3,4\n"),
            ("beta/a/b/c", ""),
        ];

        for (key, value) in cases {
            cache.set(key, Bytes::from(value));
            assert_eq!(
                cache.get(key).map(|entry| entry.bytes),
                Some(Bytes::from(value)),
                "failed get for case: {}",
                key
            );
            assert!(cache.exists(key));
        }

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_missing() {
        let cache = ObjectCache::new();
        cache.set("alpha/one", Bytes::from_static(b"1"));

        assert_eq!(cache.get("alpha/two"), None);
        assert!(!cache.exists("alpha/two"));
        assert!(!cache.exists("alpha/"));
    }

    #[test]
    fn test_set_keeps_content_type() {
        let cache = ObjectCache::new();
        let entry = CachedEntry {
            bytes: Bytes::from_static(b"x,y\n"),
            content_type: Some("text/csv".to_string()),
        };

        cache.set("alpha/report.csv", entry.clone());
        assert_eq!(cache.get("alpha/report.csv"), Some(entry));

        cache.set("alpha/report.csv", Bytes::from_static(b"x,y\n"));
        assert_eq!(cache.get("alpha/report.csv").and_then(|entry| entry.content_type), None);
    }

    #[test]
    fn test_concurrent_set_distinct_keys() {
        let cache = Arc::new(ObjectCache::new());
        let writers = 8;
        let rounds = 50;

        let handles: Vec<_> = (0..writers)
            .map(|w| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for r in 0..rounds {
                        let key = format!("bucket-{}/item-{}", w, r % 10);
                        cache.set(&key, Bytes::from(format!("{}:{}", w, r)));
                        let _ = cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), writers * 10);
        for w in 0..writers {
            for slot in 0..10 {
                let last_round = rounds - 10 + slot;
                let key = format!("bucket-{}/item-{}", w, slot);
                assert_eq!(
                    cache.get(&key).map(|entry| entry.bytes),
                    Some(Bytes::from(format!("{}:{}", w, last_round))),
                    "failed last write for key: {}",
                    key
                );
            }
        }
    }
}
