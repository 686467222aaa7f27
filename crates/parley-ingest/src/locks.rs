// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-key async locks with automatic entry cleanup.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of lazily created async mutexes keyed by string.
///
/// Entries are removed when the last holder or waiter releases them, so the
/// map only ever holds keys that are currently contended.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub struct KeyedGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let entry = self
            .inner
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = entry.lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            guard: Some(guard),
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.inner
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.lock("a").await;
        let contended =
            tokio::time::timeout(Duration::from_millis(20), locks.lock("a")).await;
        assert!(contended.is_err());
        let other = tokio::time::timeout(Duration::from_millis(20), locks.lock("b")).await;
        assert!(other.is_ok());
        drop(other);
        drop(guard);
        assert!(locks.lock("a").await.key == "a");
    }

    #[tokio::test]
    async fn entries_are_removed_after_release() {
        let locks = KeyedLocks::new();
        {
            let _a = locks.lock("a").await;
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }
}
