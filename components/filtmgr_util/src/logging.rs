use slog::{Drain, Logger};

/// Sets up the process-wide `slog_global` logger with a term drain wrapped
/// in an async drain, matching the combination the rest of the ambient
/// stack expects (`info!`/`debug!`/`warn!`/`error!` resolve through
/// `slog_global`'s thread-local logger once this has run).
///
/// Safe to call more than once; later calls replace the previous logger.
pub fn init_log(level: slog::Level) {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, slog::o!());
    slog_global::set_global(logger);
}

/// Builds a standalone logger without touching the process-wide global,
/// for tests that want to assert against captured output instead of stdout.
pub fn build_test_logger() -> Logger {
    let decorator = slog_term::PlainDecorator::new(std::io::stdout());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, slog::o!())
}
