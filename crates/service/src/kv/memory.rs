use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::ServiceError;
use super::KvStore;

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Str(String),
    List(Vec<String>),
}

/// In-process store with the same string/list semantics as Redis.
///
/// Cloning shares the underlying map, so a test can keep a handle for raw inspection
/// while the mirror owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    inner: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// All stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let map = self.inner.read().await;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Tail-push a batch of raw items. Lets callers (including a RESP front end) reuse
    /// `RPUSH` semantics and get the resulting length back.
    pub async fn push_back(&self, key: &str, items: &[String]) -> Result<usize, ServiceError> {
        let mut map = self.inner.write().await;
        match map.entry(key.to_string()).or_insert_with(|| Entry::List(Vec::new())) {
            Entry::List(list) => {
                list.extend(items.iter().cloned());
                Ok(list.len())
            }
            Entry::Str(_) => Err(ServiceError::WrongType(key.to_string())),
        }
    }
}

/// Resolve `LRANGE`-style inclusive indices against a list of `len` items.
pub(crate) fn range_bounds(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let end = if end < 0 { len + end } else { end.min(len - 1) };
    if len == 0 || start > end || start >= len {
        return None;
    }
    Some((start as usize, end as usize))
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set_string(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        debug!(key, "memory SET");
        let mut map = self.inner.write().await;
        map.insert(key.to_string(), Entry::Str(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, ServiceError> {
        debug!(key, "memory GET");
        let map = self.inner.read().await;
        match map.get(key) {
            None => Ok(None),
            Some(Entry::Str(s)) => Ok(Some(s.clone())),
            Some(Entry::List(_)) => Err(ServiceError::WrongType(key.to_string())),
        }
    }

    async fn append_list(&self, key: &str, items: &[String]) -> Result<(), ServiceError> {
        debug!(key, count = items.len(), "memory RPUSH");
        if items.is_empty() {
            return Ok(());
        }
        self.push_back(key, items).await.map(|_| ())
    }

    async fn get_list_range(&self, key: &str, start: i64, end: i64) -> Result<Option<Vec<String>>, ServiceError> {
        debug!(key, start, end, "memory LRANGE");
        let map = self.inner.read().await;
        match map.get(key) {
            None => Ok(None),
            Some(Entry::Str(_)) => Err(ServiceError::WrongType(key.to_string())),
            Some(Entry::List(list)) => {
                Ok(range_bounds(list.len(), start, end).map(|(lo, hi)| list[lo..=hi].to_vec()))
            }
        }
    }

    async fn flush_all(&self) -> Result<(), ServiceError> {
        debug!("memory FLUSHDB");
        self.inner.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn strings_overwrite() -> Result<(), ServiceError> {
        let kv = MemoryKv::new();
        assert_eq!(kv.get_string("domain").await?, None);
        kv.set_string("domain", "a.com").await?;
        kv.set_string("domain", "b.com").await?;
        assert_eq!(kv.get_string("domain").await?.as_deref(), Some("b.com"));
        kv.set_string("domain", "").await?;
        assert_eq!(kv.get_string("domain").await?.as_deref(), Some(""));
        Ok(())
    }

    #[tokio::test]
    async fn lists_append_in_order() -> Result<(), ServiceError> {
        let kv = MemoryKv::new();
        kv.append_list("l", &items(&["a", "b"])).await?;
        kv.append_list("l", &items(&["c"])).await?;
        assert_eq!(kv.get_list_range("l", 0, -1).await?, Some(items(&["a", "b", "c"])));
        assert_eq!(kv.get_list_range("l", 1, 1).await?, Some(items(&["b"])));
        assert_eq!(kv.get_list_range("l", -2, -1).await?, Some(items(&["b", "c"])));
        assert_eq!(kv.get_list_range("l", 5, 10).await?, None);
        assert_eq!(kv.get_list_range("l", 2, 1).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn empty_append_creates_nothing() -> Result<(), ServiceError> {
        let kv = MemoryKv::new();
        kv.append_list("l", &[]).await?;
        assert!(kv.is_empty().await);
        assert_eq!(kv.get_list_range("l", 0, -1).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn type_mismatch_is_an_error() -> Result<(), ServiceError> {
        let kv = MemoryKv::new();
        kv.set_string("s", "v").await?;
        kv.append_list("l", &items(&["x"])).await?;
        assert!(matches!(kv.get_list_range("s", 0, -1).await, Err(ServiceError::WrongType(_))));
        assert!(matches!(kv.get_string("l").await, Err(ServiceError::WrongType(_))));
        assert!(matches!(kv.append_list("s", &items(&["y"])).await, Err(ServiceError::WrongType(_))));
        Ok(())
    }

    #[tokio::test]
    async fn flush_clears_everything_for_all_clones() -> Result<(), ServiceError> {
        let kv = MemoryKv::new();
        let view = kv.clone();
        kv.set_string("a", "1").await?;
        kv.append_list("b", &items(&["2"])).await?;
        assert_eq!(view.keys().await, vec!["a".to_string(), "b".to_string()]);
        kv.flush_all().await?;
        assert_eq!(view.len().await, 0);
        Ok(())
    }

    #[test]
    fn range_bounds_follow_lrange() {
        assert_eq!(range_bounds(3, 0, -1), Some((0, 2)));
        assert_eq!(range_bounds(3, -100, 100), Some((0, 2)));
        assert_eq!(range_bounds(3, 2, 1), None);
        assert_eq!(range_bounds(3, 3, 5), None);
        assert_eq!(range_bounds(0, 0, -1), None);
        assert_eq!(range_bounds(3, 0, -4), None);
    }
}
