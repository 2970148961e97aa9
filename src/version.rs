//! C2: MVCC version snapshots of the name->filter index (spec.md §3, §4.2).
//! Grounded on `original_source/src/bloomd/filter_manager.c`'s
//! `filtmgr_vsn`, `create_new_version`, `destroy_version`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::wrapper::FilterWrapper;

/// An immutable snapshot of the name->wrapper index, published as `latest`
/// by a single atomic pointer swap (`ArcSwap` in `Manager`). `index` itself
/// never changes after construction. `deleted` and `prev` are each written
/// exactly once after publication (by the destructive op that supersedes
/// this version, and by the vacuum thread once the chain below is
/// retired, respectively) — the one exception spec.md §3 carves out to
/// "a published version is never mutated".
pub struct Version {
    pub vsn: u64,
    pub index: HashMap<String, Arc<FilterWrapper>>,
    is_hot: AtomicBool,
    deleted: Mutex<Option<Arc<FilterWrapper>>>,
    prev: Mutex<Option<Arc<Version>>>,
}

impl Version {
    /// Version 0: the empty version `Manager::init` starts from, populated
    /// by directory discovery (C3) before anything is published.
    pub fn initial(index: HashMap<String, Arc<FilterWrapper>>) -> Version {
        Version {
            vsn: 0,
            index,
            is_hot: AtomicBool::new(true),
            deleted: Mutex::new(None),
            prev: Mutex::new(None),
        }
    }

    /// §4.2 `create_new_version`: a fresh version one higher than `prev`,
    /// whose index starts as a full copy of `prev`'s (wrappers are shared
    /// via `Arc`, not cloned). Caller must hold the global write mutex.
    pub fn create_new(prev: &Arc<Version>) -> Version {
        Version {
            vsn: prev.vsn + 1,
            index: prev.index.clone(),
            is_hot: AtomicBool::new(true),
            deleted: Mutex::new(None),
            prev: Mutex::new(Some(Arc::clone(prev))),
        }
    }

    pub fn mark_hot(&self) {
        self.is_hot.store(true, Ordering::SeqCst);
    }

    pub fn is_hot(&self) -> bool {
        self.is_hot.load(Ordering::SeqCst)
    }

    pub fn lower_hot(&self) {
        self.is_hot.store(false, Ordering::SeqCst);
    }

    /// §4.1 `take`: marks this version hot, then returns the wrapper for
    /// `name` iff present and active.
    pub fn take(&self, name: &str) -> Option<Arc<FilterWrapper>> {
        self.mark_hot();
        self.index
            .get(name)
            .filter(|w| w.is_active())
            .map(Arc::clone)
    }

    /// Records the wrapper evicted from `index` when this version was
    /// superseded. Assigned exactly once.
    pub fn set_deleted(&self, wrapper: Arc<FilterWrapper>) {
        *self.deleted.lock() = Some(wrapper);
    }

    /// Takes the parked wrapper, if any. Read exactly once, by the vacuum.
    pub fn take_deleted(&self) -> Option<Arc<FilterWrapper>> {
        self.deleted.lock().take()
    }

    pub fn prev(&self) -> Option<Arc<Version>> {
        self.prev.lock().clone()
    }

    /// Breaks the back-link once the chain below has been retired
    /// (§4.5's `current.prev = null`).
    pub fn clear_prev(&self) {
        *self.prev.lock() = None;
    }
}

/// §4.2 `destroy_version`: releases the index and the version struct.
/// Does not touch wrappers. In Rust this is just drop, kept as a named
/// function for parity with the spec's explicit operation.
pub fn destroy_version(_version: Version) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wrapper::FilterWrapper;
    use filter_engine::BloomFilterEngine;
    use tempfile::tempdir;

    fn wrapper(dir: &std::path::Path, name: &str) -> Arc<FilterWrapper> {
        let cfg = filter_engine::EngineConfig {
            data_dir: dir.to_path_buf(),
            ..Default::default()
        };
        let engine = BloomFilterEngine::init(cfg, name, true).unwrap();
        FilterWrapper::new(Box::new(engine), true, false, None)
    }

    #[test]
    fn create_new_copies_index_and_bumps_vsn() {
        let dir = tempdir().unwrap();
        let mut index = HashMap::new();
        index.insert("a".to_owned(), wrapper(dir.path(), "a"));
        let v0 = Arc::new(Version::initial(index));
        let v1 = Version::create_new(&v0);
        assert_eq!(v1.vsn, 1);
        assert!(v1.index.contains_key("a"));
        assert!(Arc::ptr_eq(
            v1.index.get("a").unwrap(),
            v0.index.get("a").unwrap()
        ));
        assert!(Arc::ptr_eq(&v1.prev().unwrap(), &v0));
    }

    #[test]
    fn take_marks_version_hot_and_filters_inactive() {
        let dir = tempdir().unwrap();
        let mut index = HashMap::new();
        let w = wrapper(dir.path(), "a");
        index.insert("a".to_owned(), Arc::clone(&w));
        let v = Version::initial(index);
        v.lower_hot();
        assert!(v.take("a").is_some());
        assert!(v.is_hot());
        assert!(v.take("missing").is_none());
        w.deactivate();
        assert!(v.take("a").is_none());
    }

    #[test]
    fn deleted_slot_round_trips_once() {
        let dir = tempdir().unwrap();
        let v = Version::initial(HashMap::new());
        let w = wrapper(dir.path(), "a");
        v.set_deleted(Arc::clone(&w));
        let taken = v.take_deleted();
        assert!(taken.is_some());
        assert!(v.take_deleted().is_none());
    }

    #[test]
    fn clear_prev_breaks_link() {
        let v0 = Arc::new(Version::initial(HashMap::new()));
        let v1 = Version::create_new(&v0);
        assert!(v1.prev().is_some());
        v1.clear_prev();
        assert!(v1.prev().is_none());
    }
}
