use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedOutput {
    output: String,
    stored_at: Instant,
}

/// Remembers each tool's last successful output for a fixed time.
#[derive(Clone)]
pub struct ToolCache {
    ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CachedOutput>>>,
}

impl ToolCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn get(&self, tool_name: &str) -> Option<String> {
        let cache = self.cache.read().ok()?;
        let entry = cache.get(tool_name)?;
        if entry.stored_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.output.clone())
    }

    pub fn insert(&self, tool_name: &str, output: String) {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(
                tool_name.to_string(),
                CachedOutput {
                    output,
                    stored_at: Instant::now(),
                },
            );
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_basic_operations() {
        let cache = ToolCache::default();
        assert!(cache.is_empty());

        cache.insert("current_time", "12:00".to_string());
        assert_eq!(cache.get("current_time").as_deref(), Some("12:00"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("news").is_none());

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_ignored() {
        let cache = ToolCache::new(Duration::ZERO);
        cache.insert("news", "headlines".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("news").is_none());
    }
}
