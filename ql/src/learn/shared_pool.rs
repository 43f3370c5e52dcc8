use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Experience pool shared between concurrently learning workers.
///
/// Workers fold their local experience in with [Self::extend] and one of them adopts the whole pool for a joint
/// training step with [Self::drain_if_larger].
/// Taking the content out happens under the same lock as appending, so a concurrently appended element ends up
/// either in the drained batch or in the pool - it is never lost or handed out twice.
pub struct SharedExperiencePool<T> {
    capacity: usize,
    inner: Arc<Mutex<VecDeque<T>>>,
}

impl<T> Clone for SharedExperiencePool<T> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedExperiencePool<T> {
    /// `capacity` bounds the pool; beyond it the oldest elements are evicted
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);
        Self {
            capacity,
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.lock().len() }

    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    pub fn extend<I: IntoIterator<Item = T>>(
        &self,
        elements: I,
    ) {
        let mut pool = self.lock();
        for e in elements {
            if pool.len() == self.capacity {
                pool.pop_front();
            }
            pool.push_back(e);
        }
    }

    /// Moves all pooled elements out, oldest first
    pub fn drain_all(&self) -> Vec<T> {
        let mut pool = self.lock();
        Vec::from(std::mem::take(&mut *pool))
    }

    /// Moves all pooled elements out, but only if there are more than `threshold` of them.
    /// Check and drain are one atomic operation, so only one of several competing workers gets the batch.
    pub fn drain_if_larger(
        &self,
        threshold: usize,
    ) -> Option<Vec<T>> {
        let mut pool = self.lock();
        if pool.len() > threshold {
            Some(Vec::from(std::mem::take(&mut *pool)))
        } else {
            None
        }
    }

    // a panicking worker can not leave the queue itself in an inconsistent state
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> { self.inner.lock().unwrap_or_else(PoisonError::into_inner) }
}
