pub mod cache;
pub mod recency;
pub mod trace;

pub use cache::{Cache, CacheConfig, CacheStats, ConfigError, Line, Outcome};
pub use trace::{AccessKind, TraceAccess, TraceFile};
