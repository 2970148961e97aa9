//! C5: the background vacuum worker (spec.md §4.5, §9). Grounded on
//! `original_source/src/bloomd/filter_manager.c`'s `filtmgr_thread_main`
//! and `clean_old_versions`.
//!
//! Retires the chain of superseded versions hanging off `latest.prev`
//! using a heuristic cooldown: lower a version's `is_hot` flag, sleep, and
//! if nothing raised it again by the time the sleep ends, conclude no
//! reader holds a reference and reclaim it (and whatever wrapper is
//! parked in its `deleted` slot). spec.md §9 flags the original's
//! recursive `clean_chain` as a stack-overflow risk on long chains; this
//! walks the chain with an explicit stack instead of recursing.
//!
//! The tick interval and cooldown are runtime parameters ([`VacuumTiming`])
//! rather than compile-time constants, so integration tests can run the
//! worker on a millisecond-scale schedule without a non-default feature
//! flag or `cfg(test)` — neither of which reach a crate used only as a
//! library dependency by `tests/`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::manager::Manager;
use crate::metrics;
use crate::version::{destroy_version, Version};
use crate::wrapper::delete_filter;

/// Timing knobs for the vacuum worker. `Default` matches spec.md §4.5's
/// nominal production values (1s tick, 15s cooldown); [`VacuumTiming::fast`]
/// gives a millisecond-scale schedule suitable for tests.
#[derive(Clone, Copy, Debug)]
pub struct VacuumTiming {
    pub tick_interval: Duration,
    pub version_cooldown: Duration,
}

impl Default for VacuumTiming {
    fn default() -> VacuumTiming {
        VacuumTiming {
            tick_interval: Duration::from_secs(1),
            version_cooldown: Duration::from_secs(15),
        }
    }
}

impl VacuumTiming {
    /// Millisecond-scale schedule for tests: two cooldowns complete in well
    /// under a second, so integration tests can exercise full reclamation
    /// without waiting on production timings or depending on a feature flag.
    pub fn fast() -> VacuumTiming {
        VacuumTiming {
            tick_interval: Duration::from_millis(20),
            version_cooldown: Duration::from_millis(80),
        }
    }
}

/// §4.5's main loop. Runs until `stop` is observed set, checked once per
/// `timing.tick_interval` and again between each version's cooldown sleeps.
pub fn run(manager: Arc<Manager>, stop: Arc<AtomicBool>, timing: VacuumTiming) {
    let mut last_seen_vsn: Option<u64> = None;
    loop {
        thread::sleep(timing.tick_interval);
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let current = manager.latest_version();
        if last_seen_vsn == Some(current.vsn) {
            continue;
        }
        last_seen_vsn = Some(current.vsn);
        if let Some(prev) = current.prev() {
            if !clean_chain(prev, &stop, &timing) {
                break;
            }
        }
        current.clear_prev();
    }
    slog_global::info!("vacuum worker stopped");
}

/// Retires `start` and every version below it, oldest first. Returns
/// `false` if a stop request cut the walk short.
fn clean_chain(start: Arc<Version>, stop: &AtomicBool, timing: &VacuumTiming) -> bool {
    let mut chain = vec![start];
    while let Some(next) = chain.last().expect("non-empty").prev() {
        chain.push(next);
    }

    for version in chain.into_iter().rev() {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        if !cooldown(&version, stop, timing) {
            return false;
        }
        finalize(version);
    }
    true
}

/// §4.5's `repeat ... until stop requested or v.is_hot still false on
/// wake`. Returns `false` if cut short by a stop request, `true` once the
/// version has gone a full cooldown without anything raising `is_hot`.
fn cooldown(version: &Arc<Version>, stop: &AtomicBool, timing: &VacuumTiming) -> bool {
    loop {
        version.lower_hot();
        thread::sleep(timing.version_cooldown);
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        if !version.is_hot() {
            return true;
        }
    }
}

/// Finalizes whatever is parked in `version`'s `deleted` slot, then
/// reclaims the version itself. A vacuum error here is logged and does
/// not stop the worker (spec.md §7).
fn finalize(version: Arc<Version>) {
    if let Some(wrapper) = version.take_deleted() {
        if let Err(e) = delete_filter(wrapper) {
            slog_global::error!("vacuum failed to finalize deferred filter deletion"; "error" => %e);
            metrics::VACUUM_ERRORS.inc();
        }
    }
    match Arc::try_unwrap(version) {
        Ok(owned) => destroy_version(owned),
        Err(_) => {
            // Another strong reference is still outstanding; ordinary Arc
            // drop reclaims the version once it goes away.
            slog_global::warn!("version still referenced at vacuum time");
        }
    }
    metrics::VERSIONS_RECLAIMED.inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::tempdir;

    #[test]
    fn cooldown_returns_false_on_stop_request() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.engine.data_dir = dir.path().to_path_buf();
        let mgr = Manager::init(config).unwrap();
        mgr.create_filter("a", None).unwrap();
        mgr.drop_filter("a").unwrap();

        let stop = Arc::new(AtomicBool::new(true));
        let prev = mgr.latest_version().prev().unwrap();
        assert!(!cooldown(&prev, &stop, &VacuumTiming::fast()));
    }

    #[test]
    fn clean_chain_retires_every_superseded_version() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = dir.path().to_path_buf();
        config.engine.data_dir = dir.path().to_path_buf();
        let mgr = Manager::init(config).unwrap();
        mgr.create_filter("a", None).unwrap();
        mgr.create_filter("b", None).unwrap();
        mgr.drop_filter("a").unwrap();
        mgr.drop_filter("b").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let prev = mgr.latest_version().prev().unwrap();
        assert!(clean_chain(prev, &stop, &VacuumTiming::fast()));
        mgr.latest_version().clear_prev();
        assert!(mgr.latest_version().prev().is_none());
    }
}
