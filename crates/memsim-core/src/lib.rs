//! # memsim-core
//!
//! Simulation core for a byte-addressable memory space under competing
//! allocation disciplines, plus a two-level cache model. The crate exposes
//! a [`Session`] that speaks the single-line text protocol an external
//! presentation client drives: `init memory <n>`, `init buddy <n>`,
//! `set allocator <name>`, `malloc <n>`, `free <id>`, `dump`, `stats`,
//! `cache`, `exit`.
//!
//! Everything is an in-memory model: no real addresses are dereferenced,
//! blocks are bookkeeping records over logical offsets.

#![forbid(unsafe_code)]

pub mod alloc;
pub mod block;
pub mod cache;
pub mod error;
pub mod session;

pub use block::{Block, BlockId, BlockState, BlockTable};
pub use cache::{CacheHierarchy, CacheStats};
pub use error::SimError;
pub use session::{Command, Reply, Session};
