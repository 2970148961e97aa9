//! `bloomfiltd`: the concurrency and lifecycle core of a Bloom-filter
//! server. Owns a named collection of Bloom filters (fronted by the
//! [`filter_engine`] crate) and mediates concurrent reads and writes
//! against them through an MVCC'd name->filter index, while a background
//! vacuum thread reclaims superseded versions.
//!
//! Entry point is [`manager::Manager`]: [`manager::Manager::init`] to
//! build one from a [`config::Config`], [`manager::Manager::start_worker`]
//! to start the vacuum thread, and the `check_keys`/`set_keys`/
//! `create_filter`/`drop_filter`/`clear_filter`/`unmap_filter`/`flush`/
//! `list_filters`/`list_cold_filters`/`filter_cb` operations in between.
//!
//! Out of scope, per spec: the Bloom filter engine's internal bit-array
//! and hashing (see [`filter_engine`]), the wire protocol, CLI, and
//! config-file loading that would sit on top of this crate in a full
//! server.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate quick_error;

pub mod config;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod vacuum;
pub mod version;
pub mod wrapper;

pub use config::Config;
pub use error::{result_to_code, Error, Result};
pub use manager::Manager;
pub use vacuum::VacuumTiming;

/// Sets up the process-wide `slog_global` logger that discovery, the
/// manager, and the vacuum worker all log through. Call once, before
/// [`Manager::init`]; an embedder that already configured a `slog_global`
/// logger of its own can skip this.
pub fn init_logging() {
    filtmgr_util::init_log(slog::Level::Info);
}
