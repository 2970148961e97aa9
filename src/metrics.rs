//! A handful of counters/gauges observing MVCC churn and vacuum activity,
//! in the shape of the teacher's `lazy_static! { static ref X: Histogram
//! = ... }` pattern (see `src/server/gc_worker/compaction_filter.rs`'s
//! `MVCC_VERSIONS_HISTOGRAM`/`GC_DELETE_VERSIONS_HISTOGRAM`).

use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

lazy_static! {
    pub static ref VERSIONS_CREATED: IntCounter = register_int_counter!(
        "bloomfiltd_versions_created_total",
        "Number of MVCC versions published by destructive operations."
    )
    .unwrap();
    pub static ref VERSIONS_RECLAIMED: IntCounter = register_int_counter!(
        "bloomfiltd_versions_reclaimed_total",
        "Number of MVCC versions retired by the vacuum worker."
    )
    .unwrap();
    pub static ref ACTIVE_FILTERS: IntGauge = register_int_gauge!(
        "bloomfiltd_active_filters",
        "Number of filters currently active in the latest version."
    )
    .unwrap();
    pub static ref VACUUM_ERRORS: IntCounter = register_int_counter!(
        "bloomfiltd_vacuum_errors_total",
        "Number of errors the vacuum worker logged and continued past."
    )
    .unwrap();
}
