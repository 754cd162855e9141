//! cache — hash-validated persistent memoization of responses and N0.
//!
//! Purpose
//! -------
//! Store response and noise sequences on disk so that repeated runs (and
//! cooperating processes) compute each `(estimator, source)` result once.
//!
//! Key behaviors
//! -------------
//! - [`HashRecord`] digests every governing input; a cache directory accepts
//!   only the inputs that created it ([`hash_check`]).
//! - [`ResultStore`] is the storage seam; [`SqliteStore`] keeps entries in
//!   `npdb.db`, [`MemoryStore`] in process memory.
//! - [`ProcessGroup`] provides the construction-time rendezvous
//!   ([`SingleProcess`], [`ThreadGroup`]).
//! - [`ResponseLibrary`] and [`NoiseLibrary`] tie the pieces together.
//!
//! Invariants & assumptions
//! ------------------------
//! - After the rendezvous, ranks work independently; concurrent first-time
//!   computation of the same key may be duplicated but stores identical
//!   values.
//!
//! Testing notes
//! -------------
//! - Unit tests use `tempfile` directories and a kernel whose backend
//!   refuses to transform, so a served value proves a cache hit.

pub mod errors;
pub mod hashing;
pub mod library;
pub mod process;
pub mod store;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::errors::{CacheError, CacheResult};
pub use self::hashing::{HashRecord, cl_hash, hash_check};
pub use self::library::{NoiseLibrary, ResponseLibrary};
pub use self::process::{ProcessGroup, SingleProcess, ThreadGroup};
pub use self::store::{MemoryStore, ResultStore, SqliteStore};
