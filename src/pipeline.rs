//! Request pipeline
//!
//! Strictly sequential per request: reject empty input, build the prompt,
//! generate SQL, validate, execute. State flows through explicit
//! request/response values; nothing is shared between requests. The
//! candidate-search template enters the same validate/execute path.

use crate::candidate_search::{CandidateSearch, SearchParams};
use crate::error::{NlqError, Result};
use crate::executor::{ExecutionContext, QueryResult, WarehouseEngine};
use crate::llm::SqlGenerator;
use crate::observability::{ExecutionLogger, QueryLogEntry};
use crate::prompt::PromptBuilder;
use crate::schema::SchemaCatalog;
use crate::validator::SqlValidator;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub question: String,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
        }
    }
}

/// Outcome of a full pipeline run.
#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub query_id: String,
    pub question: String,
    pub sql: String,
    pub result: QueryResult,
}

/// Outcome of a dry run: validated SQL that was never executed.
#[derive(Debug, Clone)]
pub struct GeneratedQuery {
    pub query_id: String,
    pub question: String,
    pub sql: String,
}

pub struct QueryPipeline {
    prompt_builder: PromptBuilder,
    generator: Box<dyn SqlGenerator>,
    validator: SqlValidator,
    engine: Box<dyn WarehouseEngine>,
    logger: ExecutionLogger,
    context: ExecutionContext,
}

impl QueryPipeline {
    pub fn new(
        catalog: SchemaCatalog,
        generator: Box<dyn SqlGenerator>,
        engine: Box<dyn WarehouseEngine>,
    ) -> Self {
        Self {
            prompt_builder: PromptBuilder::new(catalog),
            generator,
            validator: SqlValidator::new(),
            engine,
            logger: ExecutionLogger::default(),
            context: ExecutionContext::default(),
        }
    }

    pub fn with_validator(mut self, validator: SqlValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_logger(mut self, logger: ExecutionLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    pub fn logger(&self) -> &ExecutionLogger {
        &self.logger
    }

    /// Full pipeline: question in, rows out.
    pub async fn run(&self, request: QueryRequest) -> Result<QueryResponse> {
        let query_id = Uuid::new_v4().to_string();
        let question = request.question.trim().to_string();
        let mut entry = QueryLogEntry::started(query_id.clone(), question.clone());

        let outcome = self.run_stages(&query_id, &question, &mut entry).await;
        self.record(entry, &outcome);
        outcome
    }

    async fn run_stages(
        &self,
        query_id: &str,
        question: &str,
        entry: &mut QueryLogEntry,
    ) -> Result<QueryResponse> {
        if question.is_empty() {
            return Err(NlqError::InvalidRequest("empty query".to_string()));
        }

        let prompt = self.prompt_builder.build(question);
        let sql = self.generator.generate_sql(&prompt).await?;
        // Recorded before validation so rejected statements stay auditable.
        entry.sql_generated = Some(sql.clone());
        self.validator.check(&sql)?;

        let result = self.engine.execute(&sql, &self.context).await?;
        entry.rows_returned = Some(result.row_count as u64);
        entry.execution_time_ms = Some(result.execution_time_ms);

        info!(
            "Request {} returned {} rows via {}",
            query_id, result.row_count, result.engine
        );

        Ok(QueryResponse {
            query_id: query_id.to_string(),
            question: question.to_string(),
            sql,
            result,
        })
    }

    /// Dry run: generate and validate without touching the warehouse.
    pub async fn generate(&self, request: QueryRequest) -> Result<GeneratedQuery> {
        let question = request.question.trim().to_string();
        if question.is_empty() {
            return Err(NlqError::InvalidRequest("empty query".to_string()));
        }

        let prompt = self.prompt_builder.build(&question);
        let sql = self.generator.generate_sql(&prompt).await?;
        self.validator.check(&sql)?;

        Ok(GeneratedQuery {
            query_id: Uuid::new_v4().to_string(),
            question,
            sql,
        })
    }

    /// Degenerate path: a pre-built SQL template goes through the same
    /// validator and executor as generated SQL.
    pub async fn run_template(&self, label: &str, sql: String) -> Result<QueryResponse> {
        let query_id = Uuid::new_v4().to_string();
        let mut entry = QueryLogEntry::started(query_id.clone(), label.to_string());
        entry.sql_generated = Some(sql.clone());

        let outcome = async {
            self.validator.check(&sql)?;
            let result = self.engine.execute(&sql, &self.context).await?;
            Ok(QueryResponse {
                query_id: query_id.clone(),
                question: label.to_string(),
                sql: sql.clone(),
                result,
            })
        }
        .await;

        if let Ok(ref response) = outcome {
            entry.rows_returned = Some(response.result.row_count as u64);
            entry.execution_time_ms = Some(response.result.execution_time_ms);
        }
        self.record(entry, &outcome);
        outcome
    }

    /// Candidate search: template substitution for LLM generation.
    pub async fn search_candidates(
        &self,
        search: &CandidateSearch,
        params: &SearchParams,
    ) -> Result<QueryResponse> {
        let sql = search.build_query(params)?;
        self.run_template("nurse practitioner search", sql).await
    }

    fn record(&self, mut entry: QueryLogEntry, outcome: &Result<QueryResponse>) {
        match outcome {
            Ok(_) => entry.success = true,
            Err(e) => {
                entry.success = false;
                entry.error_message = Some(e.to_string());
            }
        }
        if let Err(e) = self.logger.log(entry) {
            warn!("Failed to write audit log entry: {}", e);
        }
    }
}
