//! File-backed implementations of the Pegboard core traits.

pub mod config_service;
pub mod pane_cache_store;
pub mod paths;
pub mod snapshot_repository;
pub mod storage;
pub mod widget_state_store;

pub use config_service::ConfigService;
pub use pane_cache_store::DirPaneCache;
pub use paths::{PathError, PegboardPaths};
pub use snapshot_repository::JsonSnapshotRepository;
pub use storage::{AtomicJsonFile, BlockingStore, DebouncedWriter};
pub use widget_state_store::WidgetStateStore;
