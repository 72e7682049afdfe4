//! Run state: status transitions, snapshots and checkpoint stores.

pub mod snapshot;
pub mod store;
pub mod transitions;
pub mod types;

pub use snapshot::{restore, snapshot, Snapshot, SNAPSHOT_VERSION};
pub use store::{CheckpointStore, FileCheckpointStore, MemoryCheckpointStore};
pub use transitions::{StateTransition, TransitionError};
pub use types::{ObservedTodo, TodoStatus};
