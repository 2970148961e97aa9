//! C4 (public API) and C6 (lifecycle): the `Manager`, grounded on
//! `original_source/src/bloomd/filter_manager.c`'s `filtmgr_*` functions as
//! a whole. Owns the default config, the atomically-published `latest`
//! version pointer, and the global write mutex serializing destructive ops
//! against each other (spec.md §3 "Manager (C6)", §5).

use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use arc_swap::ArcSwap;
use filter_engine::{BloomFilterEngine, EngineConfig, FilterEngine};
use parking_lot::Mutex;

use crate::config::Config;
use crate::discovery;
use crate::error::{Error, Result};
use crate::metrics;
use crate::vacuum::{self, VacuumTiming};
use crate::version::Version;
use crate::wrapper::{self, FilterWrapper};

/// Per-process filter manager. Never a singleton (spec.md §9 "Global
/// state"): every API call takes `&self` explicitly, and nothing here is
/// reachable except through the `Arc<Manager>` the caller holds.
pub struct Manager {
    config: Config,
    latest: ArcSwap<Version>,
    write_lock: Mutex<()>,
}

impl Manager {
    /// §4.6 `init`: allocates the manager, creates version 0, and runs
    /// directory discovery (C3). The vacuum worker is not started here;
    /// call [`Manager::start_worker`] separately.
    pub fn init(config: Config) -> Result<Arc<Manager>> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        let index = discovery::discover(&config);
        metrics::ACTIVE_FILTERS.set(index.len() as i64);
        let version = Version::initial(index);
        slog_global::info!("filter manager initialized"; "data_dir" => %config.data_dir.display());
        Ok(Arc::new(Manager {
            config,
            latest: ArcSwap::from_pointee(version),
            write_lock: Mutex::new(()),
        }))
    }

    /// §4.6 `start_worker`: spawns the vacuum thread on the production
    /// schedule (spec.md §4.5's nominal 1s tick / 15s cooldown). `stop` is
    /// shared with the caller; clearing it causes the worker to exit at
    /// its next wake.
    pub fn start_worker(manager: &Arc<Manager>, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
        Manager::start_worker_with_timing(manager, stop, VacuumTiming::default())
    }

    /// As [`Manager::start_worker`], but with an explicit [`VacuumTiming`]
    /// schedule. Exposed so embedders — and this crate's own integration
    /// tests — can run the vacuum on a faster cadence without a feature
    /// flag or `cfg(test)`, neither of which reach a crate used only as a
    /// library dependency.
    pub fn start_worker_with_timing(
        manager: &Arc<Manager>,
        stop: Arc<AtomicBool>,
        timing: VacuumTiming,
    ) -> thread::JoinHandle<()> {
        let manager = Arc::clone(manager);
        thread::Builder::new()
            .name("filtmgr-vacuum".to_owned())
            .spawn(move || vacuum::run(manager, stop, timing))
            .expect("failed to spawn vacuum worker thread")
    }

    /// §4.6 `destroy`: precondition is that the vacuum worker has already
    /// been joined. Final-destroys every active wrapper (closing, not
    /// deleting — we are shutting down, not dropping data) and then walks
    /// the version chain final-destroying whatever is parked in each
    /// version's `deleted` slot.
    pub fn destroy(&self) -> Result<()> {
        let latest = self.latest_version();
        for wrapper in latest.index.values() {
            wrapper::delete_filter(Arc::clone(wrapper))?;
        }
        let mut current = Some(latest);
        while let Some(version) = current {
            if let Some(deleted) = version.take_deleted() {
                wrapper::delete_filter(deleted)?;
            }
            current = version.prev();
        }
        slog_global::info!("filter manager destroyed");
        Ok(())
    }

    pub fn latest_version(&self) -> Arc<Version> {
        self.latest.load_full()
    }

    fn publish(&self, version: Version) {
        metrics::VERSIONS_CREATED.inc();
        self.latest.store(Arc::new(version));
    }

    /// §4.3 `check_keys`. `original_source/src/bloomd/filter_manager.c`'s
    /// `filtmgr_check_keys` sets `is_hot` unconditionally after the loop,
    /// whether or not it broke early on an engine error — mirrored here by
    /// marking hot before propagating the error, not after a successful
    /// return, so a filter that errors on every access is never wrongly
    /// reported cold.
    pub fn check_keys(&self, name: &str, keys: &[Vec<u8>], result: &mut [u8]) -> Result<()> {
        let version = self.latest_version();
        let wrapper = version.take(name).ok_or(Error::NotFound)?;
        let _guard = wrapper.read();
        let outcome = (|| -> Result<()> {
            for (i, key) in keys.iter().enumerate() {
                result[i] = wrapper.filter().contains(key)? as u8;
            }
            Ok(())
        })();
        wrapper.mark_hot();
        outcome
    }

    /// §4.3 `set_keys`. Mutates filter contents, not the manager's set of
    /// filters — no write mutex involved. Marks hot before propagating an
    /// engine error, same as `check_keys` above.
    pub fn set_keys(&self, name: &str, keys: &[Vec<u8>], result: &mut [u8]) -> Result<()> {
        let version = self.latest_version();
        let wrapper = version.take(name).ok_or(Error::NotFound)?;
        let _guard = wrapper.write();
        let outcome = (|| -> Result<()> {
            for (i, key) in keys.iter().enumerate() {
                result[i] = wrapper.filter().add(key)? as u8;
            }
            Ok(())
        })();
        wrapper.mark_hot();
        outcome
    }

    /// §4.3 `flush`.
    pub fn flush(&self, name: &str) -> Result<()> {
        let version = self.latest_version();
        let wrapper = version.take(name).ok_or(Error::NotFound)?;
        wrapper.filter().flush()?;
        Ok(())
    }

    /// §4.3 `create_filter`.
    pub fn create_filter(&self, name: &str, custom: Option<EngineConfig>) -> Result<()> {
        let _guard = self.write_lock.lock();
        let latest = self.latest_version();
        if latest.index.contains_key(name) {
            return Err(Error::AlreadyExists);
        }

        let default_cfg = self.config.default_engine_config();
        // The data directory is a manager-wide concern, not a per-filter
        // override; force it regardless of what the caller supplied before
        // deciding whether the override is distinct from the default.
        let normalized_custom = custom.map(|c| EngineConfig {
            data_dir: self.config.data_dir.clone(),
            ..c
        });
        let engine_cfg = normalized_custom
            .clone()
            .unwrap_or_else(|| default_cfg.clone());
        let wrapper_custom = normalized_custom.filter(|c| *c != default_cfg);

        let mut new_version = Version::create_new(&latest);
        let engine = BloomFilterEngine::init(engine_cfg, name, true)?;
        let wrapper = FilterWrapper::new(Box::new(engine), true, false, wrapper_custom);
        new_version.index.insert(name.to_owned(), wrapper);
        self.publish(new_version);
        metrics::ACTIVE_FILTERS.inc();
        slog_global::info!("created filter"; "name" => name);
        Ok(())
    }

    /// §4.3 `drop_filter`.
    pub fn drop_filter(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let latest = self.latest_version();
        let wrapper = latest.index.get(name).cloned().ok_or(Error::NotFound)?;

        wrapper.deactivate();
        wrapper.set_should_delete(true);

        let mut new_version = Version::create_new(&latest);
        new_version.index.remove(name);
        // `latest` is still the version whose index contained the wrapper;
        // it parks the wrapper for the vacuum to finalize once it cools.
        latest.set_deleted(wrapper);
        self.publish(new_version);
        metrics::ACTIVE_FILTERS.dec();
        slog_global::info!("dropped filter"; "name" => name);
        Ok(())
    }

    /// §4.3 `clear_filter`: identical to `drop_filter` except it requires
    /// the filter to already be proxied, and preserves on-disk state.
    pub fn clear_filter(&self, name: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let latest = self.latest_version();
        let wrapper = latest.index.get(name).cloned().ok_or(Error::NotFound)?;
        if !wrapper.filter().is_proxied() {
            return Err(Error::NotProxied);
        }

        wrapper.deactivate();
        wrapper.set_should_delete(false);

        let mut new_version = Version::create_new(&latest);
        new_version.index.remove(name);
        latest.set_deleted(wrapper);
        self.publish(new_version);
        metrics::ACTIVE_FILTERS.dec();
        slog_global::info!("cleared filter"; "name" => name);
        Ok(())
    }

    /// §4.3 `unmap_filter`. Not serialized by the write mutex; relies on
    /// `FilterEngine::close` being idempotent (spec.md §9's resolution of
    /// the concurrent-unmap open question).
    pub fn unmap_filter(&self, name: &str) -> Result<()> {
        let version = self.latest_version();
        let wrapper = version.take(name).ok_or(Error::NotFound)?;
        if !wrapper.filter().config().in_memory {
            let _guard = wrapper.write();
            wrapper.filter().close()?;
        }
        Ok(())
    }

    /// §4.3 `list_filters`.
    pub fn list_filters(&self) -> Vec<String> {
        let version = self.latest_version();
        version.mark_hot();
        version
            .index
            .iter()
            .filter(|(_, w)| w.is_active())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// §4.3 `list_cold_filters`: the same iteration as `list_filters`, but
    /// lowers each wrapper's `is_hot` on the way past (harvest-on-next-pass)
    /// and only reports wrappers that were already cold and not proxied.
    pub fn list_cold_filters(&self) -> Vec<String> {
        let version = self.latest_version();
        version.mark_hot();
        version
            .index
            .iter()
            .filter(|(_, w)| w.is_active())
            .filter_map(|(name, w)| {
                if w.take_hot() {
                    None
                } else if !w.filter().is_proxied() {
                    Some(name.clone())
                } else {
                    None
                }
            })
            .collect()
    }

    /// §4.3 `filter_cb`: weak inspection. No `rwlock` is acquired; callers
    /// must restrict `cb` to metadata queries (size, counters) and never
    /// read or write filter contents through it — the manager does not
    /// enforce that contract.
    pub fn filter_cb<F, R>(&self, name: &str, cb: F) -> Result<R>
    where
        F: FnOnce(&str, &dyn FilterEngine) -> R,
    {
        let version = self.latest_version();
        let wrapper = version.take(name).ok_or(Error::NotFound)?;
        Ok(cb(name, wrapper.filter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;
    use tempfile::tempdir;

    fn manager(dir: &std::path::Path) -> Arc<Manager> {
        let mut config = Config::default();
        config.data_dir = dir.to_path_buf();
        config.engine.data_dir = dir.to_path_buf();
        Manager::init(config).unwrap()
    }

    #[test]
    fn scenario_fresh_manager_create_and_list() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        assert!(mgr.list_filters().is_empty());
        mgr.create_filter("a", None).unwrap();
        assert_eq!(mgr.list_filters(), vec!["a".to_owned()]);
        assert_eq!(mgr.latest_version().vsn, 1);
    }

    #[test]
    fn scenario_set_then_check_round_trip() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();

        let keys = vec![b"x".to_vec(), b"y".to_vec(), b"x".to_vec()];
        let mut result = vec![0u8; 3];
        mgr.set_keys("a", &keys, &mut result).unwrap();
        assert_eq!(result, vec![1, 1, 0]);

        let keys = vec![b"x".to_vec(), b"y".to_vec(), b"z".to_vec()];
        let mut result = vec![0u8; 3];
        mgr.check_keys("a", &keys, &mut result).unwrap();
        assert_eq!(result, vec![1, 1, 0]);
    }

    #[test]
    fn scenario_duplicate_create_and_missing_check() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();
        assert!(matches!(
            mgr.create_filter("a", None),
            Err(Error::AlreadyExists)
        ));
        let mut result = vec![0u8; 1];
        assert!(matches!(
            mgr.check_keys("missing", &[b"x".to_vec()], &mut result),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn drop_then_create_reuses_name_synchronously() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();
        mgr.drop_filter("a").unwrap();
        assert!(mgr.list_filters().is_empty());
        assert!(matches!(mgr.drop_filter("a"), Err(Error::NotFound)));
        mgr.create_filter("a", None).unwrap();
        assert_eq!(mgr.list_filters(), vec!["a".to_owned()]);
    }

    #[test]
    fn clear_requires_proxied_filter() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();
        // freshly created filter is resident, not proxied
        assert!(matches!(mgr.clear_filter("a"), Err(Error::NotProxied)));
        mgr.unmap_filter("a").unwrap();
        mgr.clear_filter("a").unwrap();
        assert!(mgr.list_filters().is_empty());
        let filter_dir = dir.path().join("bloomd.a");
        assert!(filter_dir.exists(), "clear preserves on-disk state");
    }

    #[test]
    fn concurrent_set_keys_are_all_observed() {
        use rand::Rng;

        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();

        let threads = 8;
        let per_thread = 64;
        let barrier = Arc::new(Barrier::new(threads));
        // Each thread inserts its own randomly generated keys, so the
        // stress run exercises real contention on the wrapper's rwlock
        // instead of a predictable access pattern.
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let mgr = Arc::clone(&mgr);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    let keys: Vec<Vec<u8>> = (0..per_thread)
                        .map(|_| {
                            let mut key = format!("t{}-", t).into_bytes();
                            key.extend(rng.gen::<[u8; 8]>());
                            key
                        })
                        .collect();
                    barrier.wait();
                    for key in &keys {
                        let mut result = vec![0u8];
                        mgr.set_keys("a", &[key.clone()], &mut result).unwrap();
                    }
                    keys
                })
            })
            .collect();

        let mut all_keys = Vec::new();
        for h in handles {
            all_keys.extend(h.join().unwrap());
        }

        for key in all_keys {
            let mut result = vec![0u8];
            mgr.check_keys("a", &[key], &mut result).unwrap();
            assert_eq!(result[0], 1);
        }
    }

    #[test]
    fn vacuum_reclaims_chain_after_drop() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();
        mgr.drop_filter("a").unwrap();
        assert!(mgr.latest_version().prev().is_some());

        let stop = Arc::new(AtomicBool::new(false));
        let handle =
            Manager::start_worker_with_timing(&mgr, Arc::clone(&stop), VacuumTiming::fast());
        // `VacuumTiming::fast()` keeps two cooldowns well under a second.
        std::thread::sleep(std::time::Duration::from_millis(500));
        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();

        assert!(mgr.latest_version().prev().is_none());
        let filter_dir = dir.path().join("bloomd.a");
        assert!(!filter_dir.exists(), "dropped filter's disk state is gone");
    }

    #[test]
    fn filter_cb_exposes_engine_without_locking() {
        let dir = tempdir().unwrap();
        let mgr = manager(dir.path());
        mgr.create_filter("a", None).unwrap();
        let proxied = mgr.filter_cb("a", |_name, engine| engine.is_proxied()).unwrap();
        assert!(!proxied);
    }
}
