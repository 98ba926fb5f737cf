use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use tokio::time::Instant;

// 过期时间溢出时的上限，约 30 年
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 带绝对过期时间的结果缓存
///
/// 过期条目在读取时惰性清除；`set` 会整体替换同一键下的旧值。
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // 已过期，升级为写锁后移除；期间可能已被重新写入
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .map(|entry| entry.value)
    }

    /// 清除所有过期条目，返回清除数量
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// 条目数量，包含尚未清除的过期条目
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn hit_within_ttl() {
        let cache = ResultCache::new(Duration::from_secs(300));
        cache.set("jack", vec![1, 2, 3]);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get("jack"), Some(vec![1, 2, 3]));
    }

    #[tokio::test(start_paused = true)]
    async fn miss_after_ttl_and_entry_is_evicted() {
        let cache = ResultCache::new(Duration::from_secs(300));
        cache.set("jack", "profile".to_string());

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(cache.get("jack"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_replaces_value_and_expiry() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.set("jack", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("jack", 2);

        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("jack"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn absent_key_is_a_miss() {
        let cache: ResultCache<u32> = ResultCache::new(Duration::from_secs(10));
        assert_eq!(cache.get("nobody"), None);
        assert_eq!(cache.remove("nobody"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_ttl_and_purge() {
        let cache = ResultCache::new(Duration::from_secs(3600));
        cache.set_with_ttl("short", 1, Duration::from_secs(5));
        cache.set("long", 2);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_ttl_does_not_overflow() {
        let cache = ResultCache::new(Duration::MAX);
        cache.set("jack", 7);

        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(cache.get("jack"), Some(7));
        assert_eq!(cache.purge_expired(), 0);
    }
}
