/// Keyed object pools
///
/// Sample blocks, shape builders and mesh buffers are expensive to allocate and get
/// recycled constantly as chunks pan in and out. Each pool is a map from a size key
/// to a free list, guarded by a `parking_lot::Mutex` that is held only for pop/push.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Objects that can live in an `ObjectPool`
pub trait Poolable: Send {
    /// Size class the object belongs to
    type Key: Copy + Eq + Hash + Send + std::fmt::Debug;

    fn pool_key(&self) -> Self::Key;

    /// Clear contents so the next user starts fresh
    fn reset(&mut self);
}

/// Pool counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub reused: usize,
    pub pooled: usize,
}

pub struct ObjectPool<T: Poolable> {
    name: &'static str,
    free: Mutex<FxHashMap<T::Key, Vec<T>>>,
    max_pooled: usize,
    created: AtomicUsize,
    reused: AtomicUsize,
}

impl<T: Poolable> ObjectPool<T> {
    /// Pool keeping at most `max_pooled` idle objects across all keys
    pub fn new(name: &'static str, max_pooled: usize) -> Self {
        Self {
            name,
            free: Mutex::new(FxHashMap::default()),
            max_pooled,
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    /// Take an idle object of size `key`, or build one with `create`
    pub fn obtain(&self, key: T::Key, create: impl FnOnce(T::Key) -> T) -> T {
        let recycled = {
            let mut free = self.free.lock();
            free.get_mut(&key).and_then(|list| list.pop())
        };

        match recycled {
            Some(mut object) => {
                object.reset();
                self.reused.fetch_add(1, Ordering::Relaxed);
                object
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                create(key)
            }
        }
    }

    /// Like `obtain`, but the object goes back to the pool when the guard drops,
    /// including during unwinding
    pub fn obtain_guarded(
        &self,
        key: T::Key,
        create: impl FnOnce(T::Key) -> T,
    ) -> Pooled<'_, T> {
        Pooled {
            object: Some(self.obtain(key, create)),
            pool: self,
        }
    }

    /// Return an object; dropped instead when the pool is full
    pub fn release(&self, object: T) {
        let key = object.pool_key();
        let mut free = self.free.lock();
        let pooled: usize = free.values().map(Vec::len).sum();
        if pooled >= self.max_pooled {
            log::trace!("{} pool full ({}), dropping {:?}", self.name, pooled, key);
            return;
        }
        free.entry(key).or_default().push(object);
    }

    /// Dispose every idle object whose key fails `keep`
    pub fn retain_keys(&self, mut keep: impl FnMut(&T::Key) -> bool) -> usize {
        let mut free = self.free.lock();
        let mut disposed = 0;
        free.retain(|key, list| {
            if keep(key) {
                true
            } else {
                disposed += list.len();
                false
            }
        });
        if disposed > 0 {
            log::debug!("{} pool disposed {} idle objects", self.name, disposed);
        }
        disposed
    }

    /// Dispose everything
    pub fn clear(&self) -> usize {
        self.retain_keys(|_| false)
    }

    pub fn pooled(&self) -> usize {
        self.free.lock().values().map(Vec::len).sum()
    }

    pub fn max_pooled(&self) -> usize {
        self.max_pooled
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            pooled: self.pooled(),
        }
    }
}

impl<T: Poolable> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("name", &self.name)
            .field("max_pooled", &self.max_pooled)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Pooled object that returns itself to its pool on drop
pub struct Pooled<'a, T: Poolable> {
    object: Option<T>,
    pool: &'a ObjectPool<T>,
}

impl<T: Poolable> Pooled<'_, T> {
    /// Keep the object instead of returning it
    pub fn into_inner(mut self) -> Option<T> {
        self.object.take()
    }
}

impl<T: Poolable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.object {
            Some(object) => object,
            None => unreachable!("pooled object taken before drop"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.object {
            Some(object) => object,
            None => unreachable!("pooled object taken before drop"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.pool.release(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Scratch {
        size: usize,
        data: Vec<u8>,
    }

    impl Poolable for Scratch {
        type Key = usize;

        fn pool_key(&self) -> usize {
            self.size
        }

        fn reset(&mut self) {
            self.data.clear();
        }
    }

    fn scratch(size: usize) -> Scratch {
        Scratch {
            size,
            data: Vec::with_capacity(size),
        }
    }

    #[test]
    fn test_obtain_resets_recycled_objects() {
        let pool = ObjectPool::new("scratch", 4);
        let mut s = pool.obtain(8, scratch);
        s.data.extend_from_slice(&[1, 2, 3]);
        pool.release(s);

        let s = pool.obtain(8, scratch);
        assert!(s.data.is_empty());
        assert!(s.data.capacity() >= 8);
        assert_eq!(pool.stats(), PoolStats { created: 1, reused: 1, pooled: 0 });
    }

    #[test]
    fn test_pool_size_is_bounded() {
        let pool = ObjectPool::new("scratch", 3);
        let objects: Vec<_> = (0..5).map(|_| pool.obtain(4, scratch)).collect();
        for o in objects {
            pool.release(o);
        }
        assert_eq!(pool.pooled(), 3);
    }

    #[test]
    fn test_keys_do_not_mix_and_old_keys_drain() {
        let pool = ObjectPool::new("scratch", 8);
        pool.release(scratch(4));
        pool.release(scratch(4));
        pool.release(scratch(16));

        assert_eq!(pool.obtain(16, scratch).size, 16);
        assert_eq!(pool.stats().reused, 1);

        assert_eq!(pool.retain_keys(|k| *k == 16), 2);
        assert_eq!(pool.pooled(), 0);
        let fresh = pool.obtain(4, scratch);
        assert_eq!(fresh.size, 4);
        assert_eq!(pool.stats().created, 1);
    }

    #[test]
    fn test_guard_returns_object_on_unwind() {
        let pool = ObjectPool::new("scratch", 4);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut s = pool.obtain_guarded(8, scratch);
            s.data.push(1);
            panic!("worker failed");
        }));
        assert!(result.is_err());
        assert_eq!(pool.pooled(), 1);

        let kept = pool.obtain_guarded(8, scratch).into_inner();
        assert!(kept.is_some());
        assert_eq!(pool.pooled(), 0);
        assert_eq!(pool.stats().reused, 1);
    }
}
