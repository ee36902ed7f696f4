//! 进程内按 key 加锁
//!
//! 同一个 key 的临界区串行执行，不同 key 互不影响。
//! 锁守卫超出作用域自动释放，无人持有的条目在释放时回收

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::OwnedMutexGuard;

type LockMap = Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>;

/// 按会话 ID 加锁
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: LockMap,
}

/// 锁守卫（自动释放）
pub struct SessionLockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockMap,
    key: String,
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        // 先释放互斥锁，再判断是否还有其他等待者
        self.guard.take();
        let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(entry) = map.get(&self.key) {
            if Arc::strong_count(entry) == 1 {
                map.remove(&self.key);
            }
        }
    }
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取锁（等待直到之前的持有者释放）
    pub async fn acquire(&self, key: &str) -> SessionLockGuard {
        let entry = {
            let mut map = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let guard = entry.lock_owned().await;
        tracing::trace!(session_id = %key, "Acquired session lock");

        SessionLockGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            key: key.to_string(),
        }
    }

    /// 当前存活的锁条目数
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = SessionLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("session-1").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
