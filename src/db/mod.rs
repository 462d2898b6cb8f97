//! Run checkpoint storage.
//!
//! - [`MemoryCheckpointStore`] keeps snapshots in-process (tests, `:memory:`)
//! - [`TursoCheckpointStore`] persists them in a local libSQL database

/// Process-local store.
pub mod memory;
/// Trait and backend selection.
pub mod traits;
/// libSQL store.
pub mod turso;

pub use memory::MemoryCheckpointStore;
pub use traits::{CheckpointProvider, CheckpointStore};
pub use turso::TursoCheckpointStore;
