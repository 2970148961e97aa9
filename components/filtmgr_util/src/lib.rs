//! Small ambient-stack helper shared by the filter manager: `slog` logger
//! setup. Trimmed analogue of `tikv_util` scoped to what a single-process
//! filter server needs — no gRPC, no sysinfo, no procfs, and (since
//! nothing here has a human-readable-size or elapsed-time config field to
//! back) no `ReadableSize`/`Monotonic` helpers either.

pub mod logging;

pub use logging::init_log;
