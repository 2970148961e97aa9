//! C1: the per-filter wrapper (spec.md §3, §4.1). Grounded on
//! `original_source/src/bloomd/filter_manager.c`'s `bloom_filter_wrapper`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use filter_engine::{EngineConfig, FilterEngine};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::Result;

/// Owns one named filter plus the flags and lock governing its lifecycle.
/// `rwlock` guards nothing directly (the underlying `FilterEngine` is
/// internally synchronized, per spec.md §5's note that engine `flush` and
/// `is_proxied` bypass it) — it exists to serialize `check_keys`/`set_keys`
/// against each other and against `unmap_filter`'s `close`, exactly as the
/// original `pthread_rwlock_t` did.
pub struct FilterWrapper {
    is_active: AtomicBool,
    is_hot: AtomicBool,
    should_delete: AtomicBool,
    rwlock: RwLock<()>,
    filter: Box<dyn FilterEngine>,
    custom: Option<EngineConfig>,
}

impl FilterWrapper {
    pub fn new(
        filter: Box<dyn FilterEngine>,
        is_hot: bool,
        should_delete: bool,
        custom: Option<EngineConfig>,
    ) -> Arc<FilterWrapper> {
        Arc::new(FilterWrapper {
            is_active: AtomicBool::new(true),
            is_hot: AtomicBool::new(is_hot),
            should_delete: AtomicBool::new(should_delete),
            rwlock: RwLock::new(()),
            filter,
            custom,
        })
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::SeqCst)
    }

    /// Cleared before a wrapper is evicted from the live version. Once
    /// false it never becomes true again (spec.md §3 invariant).
    pub fn deactivate(&self) {
        self.is_active.store(false, Ordering::SeqCst);
    }

    pub fn mark_hot(&self) {
        self.is_hot.store(true, Ordering::SeqCst);
    }

    /// Lowers `is_hot` and returns whether it was set beforehand, the
    /// read-and-clear step `list_cold_filters` and the vacuum's per-filter
    /// cold detection both use.
    pub fn take_hot(&self) -> bool {
        self.is_hot.swap(false, Ordering::SeqCst)
    }

    pub fn should_delete(&self) -> bool {
        self.should_delete.load(Ordering::SeqCst)
    }

    pub fn set_should_delete(&self, value: bool) {
        self.should_delete.store(value, Ordering::SeqCst);
    }

    pub fn filter(&self) -> &dyn FilterEngine {
        self.filter.as_ref()
    }

    pub fn custom_config(&self) -> Option<&EngineConfig> {
        self.custom.as_ref()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.rwlock.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.rwlock.write()
    }
}

/// Final teardown (spec.md §4.1 `delete_filter`). Precondition: no thread
/// holds `rwlock` — guaranteed by the vacuum's cooldown protocol or by
/// single-threaded teardown in `Manager::destroy`. `destroy(handle)` from
/// the engine contract has no Rust counterpart beyond this `Arc`'s drop.
pub fn delete_filter(wrapper: Arc<FilterWrapper>) -> Result<()> {
    if wrapper.should_delete() {
        wrapper.filter().delete()?;
    } else {
        wrapper.filter().close()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filter_engine::BloomFilterEngine;
    use tempfile::tempdir;

    fn test_wrapper(dir: &std::path::Path, name: &str) -> Arc<FilterWrapper> {
        let cfg = filter_engine::EngineConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        };
        let engine = BloomFilterEngine::init(cfg, name, true).unwrap();
        FilterWrapper::new(Box::new(engine), true, false, None)
    }

    #[test]
    fn deactivate_is_one_way() {
        let dir = tempdir().unwrap();
        let w = test_wrapper(dir.path(), "a");
        assert!(w.is_active());
        w.deactivate();
        assert!(!w.is_active());
    }

    #[test]
    fn take_hot_clears_flag() {
        let dir = tempdir().unwrap();
        let w = test_wrapper(dir.path(), "a");
        assert!(w.take_hot());
        assert!(!w.take_hot());
        w.mark_hot();
        assert!(w.take_hot());
    }

    #[test]
    fn delete_filter_closes_when_not_marked_for_deletion() {
        let dir = tempdir().unwrap();
        let w = test_wrapper(dir.path(), "a");
        let filter_dir = dir.path().join("bloomd.a");
        assert!(filter_dir.exists());
        delete_filter(w).unwrap();
        assert!(filter_dir.exists(), "close keeps on-disk state");
    }

    #[test]
    fn delete_filter_removes_disk_state_when_marked() {
        let dir = tempdir().unwrap();
        let w = test_wrapper(dir.path(), "a");
        w.set_should_delete(true);
        let filter_dir = dir.path().join("bloomd.a");
        delete_filter(w).unwrap();
        assert!(!filter_dir.exists());
    }
}
