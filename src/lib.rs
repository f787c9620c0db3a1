//! diskmemo - content-addressable disk cache
//!
//! Memoizes the result of an expensive, deterministic computation keyed by
//! an input string plus a version salt. Results land at
//! `<root>/<salt>/<sha256-hex>.memo`, written atomically so concurrent
//! readers and writers sharing the root never observe a partial entry.
//! Entries that go unread longer than a TTL (one week by default) are
//! reclaimed by a throttled collection sweep.
//!
//! The payload is opaque bytes; what they encode is the caller's business.
//!
//! ```no_run
//! use diskmemo::{DiskCache, MemoError, MemoResult};
//!
//! fn compile(source: &str) -> MemoResult<Vec<u8>> {
//!     let cache = DiskCache::new("~/.cache/mycompiler", "vyper-0.4.1");
//!     cache.lookup_or_compute(source, || {
//!         run_compiler(source).map_err(MemoError::producer)
//!     })
//! }
//! # fn run_compiler(_: &str) -> std::io::Result<Vec<u8>> { Ok(Vec::new()) }
//! ```

pub mod cache;
pub mod error;
mod fingerprint;

pub use cache::{DiskCache, DEFAULT_COLLECT_INTERVAL, DEFAULT_TTL};
pub use error::{MemoError, MemoResult};
