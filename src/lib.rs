pub mod candidate_search;
pub mod config;
pub mod error;
pub mod executor;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod prompt;
pub mod schema;
pub mod validator;

pub use config::AppConfig;
pub use error::{NlqError, Result};
pub use pipeline::{QueryPipeline, QueryRequest, QueryResponse};
