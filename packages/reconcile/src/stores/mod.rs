//! Checkpoint storage backends.
//!
//! Available backends:
//! - `MemoryCheckpointStore` - in-memory, lost on exit
//! - `JsonFileCheckpointStore` - one JSON file, written atomically

pub mod file;
pub mod memory;

pub use file::JsonFileCheckpointStore;
pub use memory::MemoryCheckpointStore;
