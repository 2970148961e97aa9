//! A concrete, reasonably-scoped implementation of the Bloom filter engine
//! `spec.md` §6 treats as opaque: scalable bit-array filters with disk
//! persistence. Grounded on the trait/impl split between `engine_traits`
//! and `engine_rocks` in the teacher crate, scoped down to one concrete
//! backend since there is only ever one kind of filter here.

#[macro_use]
extern crate quick_error;

pub mod bitset;
pub mod config;
pub mod engine;
pub mod error;
pub mod hash;

pub use config::EngineConfig;
pub use engine::{BloomFilterEngine, FilterEngine};
pub use error::{Error, Result};
