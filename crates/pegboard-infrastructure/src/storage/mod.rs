//! Low-level file storage.

pub mod atomic_json;
pub mod debounced_writer;

pub use atomic_json::{AtomicJsonError, AtomicJsonFile};
pub use debounced_writer::{BlockingStore, DebouncedWriter};
