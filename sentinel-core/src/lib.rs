pub mod api;
pub mod config;
pub mod engine;
pub mod monitor;
pub mod types;

pub use self::config::{ConfigError, EngineConfig, FailurePolicy};
pub use self::engine::{CycleError, SnapshotEngine};
pub use self::monitor::{Monitor, RefreshTrigger};
