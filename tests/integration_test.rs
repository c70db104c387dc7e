//! End-to-end pipeline scenarios against a mock warehouse engine and the
//! offline LLM mode.

use async_trait::async_trait;
use nlq_engine::candidate_search::{CandidateSearch, SearchParams};
use nlq_engine::config::LlmConfig;
use nlq_engine::error::{NlqError, Result};
use nlq_engine::executor::{ExecutionContext, QueryResult, WarehouseEngine};
use nlq_engine::llm::{LlmClient, SqlGenerator};
use nlq_engine::pipeline::{QueryPipeline, QueryRequest};
use nlq_engine::prompt::Prompt;
use nlq_engine::schema::SchemaCatalog;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Warehouse stand-in that records every statement it is asked to run.
struct MockEngine {
    executed: Arc<Mutex<Vec<String>>>,
}

impl MockEngine {
    fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let executed = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                executed: executed.clone(),
            },
            executed,
        )
    }
}

#[async_trait]
impl WarehouseEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn execute(&self, sql: &str, _ctx: &ExecutionContext) -> Result<QueryResult> {
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(QueryResult::new(
            vec![
                "FIRST_NAME".to_string(),
                "LAST_NAME".to_string(),
                "JOB_TITLE".to_string(),
                "JOB_LOCATION_STATE_CODE".to_string(),
            ],
            vec![
                vec![
                    json!("Ada"),
                    json!("Nguyen"),
                    json!("Family Nurse Practitioner"),
                    json!("CA"),
                ],
                vec![
                    json!("Grace"),
                    json!("Okafor"),
                    json!("Psychiatric Nurse Practitioner"),
                    json!("CA"),
                ],
            ],
            "mock".to_string(),
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Generator stand-in returning a fixed statement, counting invocations.
struct ScriptedGenerator {
    sql: String,
    calls: Arc<AtomicUsize>,
}

impl ScriptedGenerator {
    fn new(sql: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                sql: sql.to_string(),
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn generate_sql(&self, prompt: &Prompt) -> Result<String> {
        assert!(!prompt.user.is_empty(), "generator invoked with empty prompt");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sql.clone())
    }
}

fn offline_llm() -> LlmClient {
    let config = LlmConfig {
        api_key: "dummy-api-key".to_string(),
        model: "gpt-4".to_string(),
        base_url: "https://api.openai.com/v1".to_string(),
        timeout_secs: 5,
    };
    LlmClient::new(&config).unwrap()
}

#[tokio::test]
async fn california_question_flows_to_rows() {
    let (engine, executed) = MockEngine::new();
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(offline_llm()),
        Box::new(engine),
    );

    let response = pipeline
        .run(QueryRequest::new(
            "Find nurse practitioners licensed in California",
        ))
        .await
        .unwrap();

    assert!(response.sql.starts_with("SELECT"));
    assert!(response.sql.contains("contact_search_dz"));
    assert!(response.sql.contains("'CA'"));
    assert_eq!(response.result.row_count, 2);
    assert_eq!(
        response.result.value(0, "FIRST_NAME"),
        Some(&json!("Ada"))
    );

    let statements = executed.lock().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0], response.sql);
}

#[tokio::test]
async fn destructive_generation_is_stopped_before_execution() {
    let (engine, executed) = MockEngine::new();
    let (generator, _calls) = ScriptedGenerator::new("DROP TABLE contact_search_dz");
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(generator),
        Box::new(engine),
    );

    let err = pipeline
        .run(QueryRequest::new(
            "Find nurse practitioners licensed in California",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, NlqError::Validation(_)));
    assert!(executed.lock().unwrap().is_empty(), "executor must not run");
}

#[tokio::test]
async fn deny_listed_keyword_inside_a_select_is_rejected() {
    let (engine, executed) = MockEngine::new();
    let (generator, _calls) =
        ScriptedGenerator::new("SELECT * FROM t WHERE 1 = 1 UNION SELECT 1 FROM pg_catalog; DROP TABLE t");
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(generator),
        Box::new(engine),
    );

    let err = pipeline
        .run(QueryRequest::new("show everything"))
        .await
        .unwrap_err();

    assert!(matches!(err, NlqError::Validation(_)));
    assert!(executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn empty_question_never_reaches_the_generator() {
    let (engine, executed) = MockEngine::new();
    let (generator, calls) = ScriptedGenerator::new("SELECT 1");
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(generator),
        Box::new(engine),
    );

    let err = pipeline.run(QueryRequest::new("   ")).await.unwrap_err();

    assert!(matches!(err, NlqError::InvalidRequest(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_validates_without_executing() {
    let (engine, executed) = MockEngine::new();
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(offline_llm()),
        Box::new(engine),
    );

    let generated = pipeline
        .generate(QueryRequest::new(
            "Find nurse practitioners licensed in Texas",
        ))
        .await
        .unwrap();

    assert!(generated.sql.starts_with("SELECT"));
    assert!(generated.sql.contains("'TX'"));
    assert!(executed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn candidate_search_goes_through_the_same_gate() {
    let (engine, executed) = MockEngine::new();
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(offline_llm()),
        Box::new(engine),
    );

    let search = CandidateSearch::new();
    let mut params = SearchParams::new(vec!["california".to_string(), "TX".to_string()]);
    params.min_states = 2;

    let response = pipeline.search_candidates(&search, &params).await.unwrap();

    assert!(response.sql.starts_with("SELECT"));
    assert!(response.sql.contains("IN ('CA', 'TX')"));
    assert!(response.sql.contains("states_licensed_in >= 2"));
    assert_eq!(executed.lock().unwrap().len(), 1);
    assert_eq!(response.result.row_count, 2);
}

#[tokio::test]
async fn audit_log_records_success_and_failure() {
    let (engine, _executed) = MockEngine::new();
    let pipeline = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(offline_llm()),
        Box::new(engine),
    );

    pipeline
        .run(QueryRequest::new(
            "Find nurse practitioners licensed in California",
        ))
        .await
        .unwrap();

    let (failing_engine, _) = MockEngine::new();
    let (generator, _calls) = ScriptedGenerator::new("TRUNCATE contact_search_dz");
    let failing = QueryPipeline::new(
        SchemaCatalog::default(),
        Box::new(generator),
        Box::new(failing_engine),
    );
    let _ = failing.run(QueryRequest::new("wipe it")).await;

    let ok_entries = pipeline.logger().recent(10);
    assert_eq!(ok_entries.len(), 1);
    assert!(ok_entries[0].success);
    assert_eq!(ok_entries[0].rows_returned, Some(2));
    assert!(ok_entries[0].sql_generated.as_deref().unwrap().starts_with("SELECT"));

    let failed_entries = failing.logger().recent(10);
    assert_eq!(failed_entries.len(), 1);
    assert!(!failed_entries[0].success);
    assert!(failed_entries[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("Validation"));
}
