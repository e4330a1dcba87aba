//! # Object Pool
//!
//! A generic pool for re-using long-lived objects — typically
//! [`crate::client::Client`] connections, so a process making many calls
//! doesn't open a fresh connection per call. Mirrors `zrpc.object_pool.ObjectPool`:
//! a semaphore bounds how many objects may be checked out at once; a free-list
//! holds the idle ones. Checking an object out beyond `maxsize` blocks (or, via
//! [`ObjectPool::try_get`], fails immediately) until one is returned.

use crate::error::PoolError;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A pool of reusable `T`s, built around a user-supplied factory.
pub struct ObjectPool<T> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    semaphore: Arc<Semaphore>,
    objects: Arc<Mutex<VecDeque<T>>>,
}

impl<T: Send + 'static> ObjectPool<T> {
    /// An unbounded pool: `get` never blocks on pool size, only ever reuses or creates.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_capacity(factory, Semaphore::MAX_PERMITS)
    }

    /// A pool bounded to at most `maxsize` checked-out objects at a time.
    pub fn with_maxsize(factory: impl Fn() -> T + Send + Sync + 'static, maxsize: usize) -> Self {
        Self::with_capacity(factory, maxsize)
    }

    fn with_capacity(factory: impl Fn() -> T + Send + Sync + 'static, capacity: usize) -> Self {
        Self {
            factory: Box::new(factory),
            semaphore: Arc::new(Semaphore::new(capacity)),
            objects: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Check an object out, blocking until the pool has room if it's at `maxsize`.
    /// The returned [`PoolGuard`] returns the object to the pool when dropped.
    pub async fn get(&self) -> PoolGuard<T> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .expect("pool semaphore is never closed");
        self.make_guard(permit)
    }

    /// Like [`ObjectPool::get`], but fails with [`PoolError::WouldBlock`] instead
    /// of waiting when the pool is at `maxsize`.
    pub fn try_get(&self) -> Result<PoolGuard<T>, PoolError> {
        let permit = Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .map_err(|_| PoolError::WouldBlock)?;
        Ok(self.make_guard(permit))
    }

    fn make_guard(&self, permit: OwnedSemaphorePermit) -> PoolGuard<T> {
        let object = {
            let mut objects = self.objects.lock().expect("pool mutex poisoned");
            objects.pop_front()
        };
        let object = object.unwrap_or_else(|| (self.factory)());
        PoolGuard {
            object: Some(object),
            objects: Arc::clone(&self.objects),
            _permit: permit,
        }
    }

    /// Number of idle objects currently held in the free-list.
    pub fn idle_count(&self) -> usize {
        self.objects.lock().expect("pool mutex poisoned").len()
    }
}

/// A checked-out object. Dereferences to `T`; returns the object to its pool
/// when dropped, the way the reference implementation's `with pool.get()` block
/// re-adds the object on exit.
pub struct PoolGuard<T> {
    object: Option<T>,
    objects: Arc<Mutex<VecDeque<T>>>,
    _permit: OwnedSemaphorePermit,
}

impl<T> Deref for PoolGuard<T> {
    type Target = T;
    fn deref(&self) -> &T {
        self.object.as_ref().expect("object taken before drop")
    }
}

impl<T> DerefMut for PoolGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.object.as_mut().expect("object taken before drop")
    }
}

impl<T> Drop for PoolGuard<T> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.objects
                .lock()
                .expect("pool mutex poisoned")
                .push_back(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn reuses_a_returned_object_instead_of_building_a_new_one() {
        let built = Arc::new(AtomicUsize::new(0));
        let built_clone = Arc::clone(&built);
        let pool = ObjectPool::new(move || {
            built_clone.fetch_add(1, Ordering::SeqCst);
            "connection".to_string()
        });

        {
            let _first = pool.get().await;
        }
        let _second = pool.get().await;

        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bounded_pool_blocks_until_an_object_is_returned() {
        let pool = Arc::new(ObjectPool::with_maxsize(|| 0u32, 1));
        let first = pool.get().await;

        let waiter_pool = Arc::clone(&pool);
        let waiter = tokio::spawn(async move { waiter_pool.get().await });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        let _second = waiter.await.unwrap();
    }

    #[test]
    fn try_get_fails_fast_when_the_pool_is_exhausted() {
        let pool = ObjectPool::with_maxsize(|| 0u32, 1);
        let _first = pool.try_get().unwrap();
        let err = pool.try_get().unwrap_err();
        assert!(matches!(err, PoolError::WouldBlock));
    }

    #[tokio::test]
    async fn idle_count_reflects_returned_objects() {
        let pool = ObjectPool::new(|| 0u32);
        assert_eq!(pool.idle_count(), 0);
        {
            let _obj = pool.get().await;
            assert_eq!(pool.idle_count(), 0);
        }
        assert_eq!(pool.idle_count(), 1);
    }
}
