//! Poison-tolerant lock around cache state.
//!
//! A panic while the store is locked leaves the map in a usable state (every
//! mutation is a single `LruCache` call), so the cache keeps serving instead
//! of propagating the poison to every later request.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use metrics::counter;
use tracing::warn;

use super::METRIC_LOCK_RECOVERED_TOTAL;

pub(crate) struct CacheLock<T> {
    inner: RwLock<T>,
    owner: &'static str,
}

impl<T> CacheLock<T> {
    pub(crate) fn new(owner: &'static str, value: T) -> Self {
        Self {
            inner: RwLock::new(value),
            owner,
        }
    }

    pub(crate) fn read(&self, op: &'static str) -> RwLockReadGuard<'_, T> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.recovered(op, "read");
                let guard = poisoned.into_inner();
                self.inner.clear_poison();
                guard
            }
        }
    }

    pub(crate) fn write(&self, op: &'static str) -> RwLockWriteGuard<'_, T> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                self.recovered(op, "write");
                let guard = poisoned.into_inner();
                self.inner.clear_poison();
                guard
            }
        }
    }

    fn recovered(&self, op: &'static str, mode: &'static str) {
        counter!(METRIC_LOCK_RECOVERED_TOTAL, "owner" => self.owner).increment(1);
        warn!(
            op,
            owner = self.owner,
            mode,
            "recovered cache lock poisoned by a panicking request"
        );
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.write();
            panic!("poison cache lock");
        }));
    }

    #[cfg(test)]
    pub(crate) fn is_poisoned(&self) -> bool {
        self.inner.is_poisoned()
    }
}

#[cfg(test)]
mod tests {
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    use super::*;

    #[test]
    fn poisoned_lock_is_recovered_once_and_counted() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            let lock = CacheLock::new("test", vec![1_u8]);
            lock.poison();
            assert!(lock.is_poisoned());

            lock.write("push").push(2);
            assert!(!lock.is_poisoned());
            assert_eq!(*lock.read("len"), vec![1, 2]);
        });

        let recovered: u64 = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count)
                    if key.key().name() == METRIC_LOCK_RECOVERED_TOTAL =>
                {
                    Some(count)
                }
                _ => None,
            })
            .sum();
        assert_eq!(recovered, 1);
    }
}
