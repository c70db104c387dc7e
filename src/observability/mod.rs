//! Structured audit logging for pipeline requests.

pub mod execution_log;

pub use execution_log::{ExecutionLogger, QueryLogEntry};
