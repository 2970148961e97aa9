//! Typed errors backing every manager operation, plus the stable `i32`
//! return-code surface spec.md §6/§7 specifies for wire-protocol callers.

use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Named filter absent, or present but no longer active.
        NotFound {
            display("no such filter")
        }
        /// `create_filter` collided with an existing name.
        AlreadyExists {
            display("filter already exists")
        }
        /// `clear_filter` on a filter that is not proxied.
        NotProxied {
            display("filter is not proxied")
        }
        /// The underlying engine failed mid-operation. Any output slice
        /// passed to `check_keys`/`set_keys` holds undefined contents past
        /// the key that failed (spec.md §7, §9).
        Engine(err: filter_engine::Error) {
            display("engine error: {}", err)
            cause(err)
            from()
        }
        Io(err: io::Error) {
            display("io error: {}", err)
            cause(err)
            from()
        }
        /// A new version or wrapper could not be built; published state is
        /// unchanged.
        Allocation(msg: String) {
            display("allocation error: {}", msg)
        }
        InvalidConfig(msg: String) {
            display("invalid manager config: {}", msg)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Maps onto the stable return-code surface spec.md §6 documents:
    /// `0` success (never constructed here), `-1` not-found/already-exists,
    /// `-2` everything else. Wire-protocol adapters that need `i32` instead
    /// of `Result` call this; embedders that want the typed error use the
    /// `Result`-returning methods directly.
    pub fn code(&self) -> i32 {
        match self {
            Error::NotFound | Error::AlreadyExists => -1,
            Error::NotProxied
            | Error::Engine(_)
            | Error::Io(_)
            | Error::Allocation(_)
            | Error::InvalidConfig(_) => -2,
        }
    }
}

/// Convenience for wire-protocol adapters: `Ok(())` maps to `0`, any error
/// maps to its stable code.
pub fn result_to_code<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => e.code(),
    }
}
