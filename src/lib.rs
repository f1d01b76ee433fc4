pub mod config;
pub mod engine;
pub mod error;
pub mod query;
pub mod store;

pub use config::{AppConfig, EngineConfig, StoreLimits};
pub use engine::{MemoryEngine, VerifiedEngine};
pub use error::LogStoreError;
pub use store::models::{AddLogRequest, AddLogsRequest, LogEntry, LogRecord};
pub use store::LogStore;
