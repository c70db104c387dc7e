use nlq_engine::candidate_search::{CandidateSearch, SearchParams};
use nlq_engine::config::AppConfig;
use nlq_engine::executor::{ExecutionContext, PostgresEngine, QueryResult};
use nlq_engine::llm::LlmClient;
use nlq_engine::observability::ExecutionLogger;
use nlq_engine::pipeline::{QueryPipeline, QueryRequest};
use nlq_engine::schema::SchemaCatalog;
use nlq_engine::validator::SqlValidator;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "nlq")]
#[command(about = "Natural language to SQL warehouse query engine")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a natural-language question to SQL and run it
    Ask {
        /// The question in natural language
        question: String,

        /// Generate and validate the SQL without executing it
        #[arg(long)]
        no_execute: bool,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long)]
        api_key: Option<String>,

        /// Path to a JSON schema catalog (default: built-in catalog)
        #[arg(long)]
        schema_file: Option<PathBuf>,

        /// Cap on rows returned
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Search nurse practitioner candidates by state licensing
    Search {
        /// State names or two-letter codes (repeatable)
        #[arg(short, long = "state", required = true)]
        states: Vec<String>,

        /// Minimum number of states the candidate must be licensed in
        #[arg(long, default_value_t = 1)]
        min_states: usize,

        /// Do not require telehealth experience
        #[arg(long)]
        no_telehealth: bool,

        /// Custom nurse title to match (repeatable, replaces defaults)
        #[arg(long = "nurse-title")]
        nurse_titles: Vec<String>,

        /// Custom telehealth keyword to match (repeatable, replaces defaults)
        #[arg(long = "telehealth-keyword")]
        telehealth_keywords: Vec<String>,

        /// Print a summary report after the results
        #[arg(long)]
        summary: bool,

        /// Cap on rows returned
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Run the safety validator on a SQL statement and print the verdict
    Validate {
        /// The SQL statement to inspect
        sql: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt::init();

    let args = Args::parse();

    match args.command {
        Commands::Ask {
            question,
            no_execute,
            api_key,
            schema_file,
            limit,
        } => run_ask(question, no_execute, api_key, schema_file, limit).await,
        Commands::Search {
            states,
            min_states,
            no_telehealth,
            nurse_titles,
            telehealth_keywords,
            summary,
            limit,
        } => {
            run_search(
                states,
                min_states,
                no_telehealth,
                nurse_titles,
                telehealth_keywords,
                summary,
                limit,
            )
            .await
        }
        Commands::Validate { sql } => run_validate(sql),
    }
}

fn load_config(api_key: Option<&str>) -> Result<AppConfig> {
    // A key passed on the command line wins over the environment; search
    // mode never calls the LLM, so a placeholder key satisfies presence.
    let config = AppConfig::from_lookup(|key| {
        if key == "OPENAI_API_KEY" {
            if let Some(k) = api_key {
                return Some(k.to_string());
            }
        }
        std::env::var(key).ok()
    })?;
    Ok(config)
}

fn load_catalog(schema_file: Option<&PathBuf>) -> Result<SchemaCatalog> {
    match schema_file {
        Some(path) => Ok(SchemaCatalog::load(path)?),
        None => Ok(SchemaCatalog::default()),
    }
}

fn build_pipeline(config: &AppConfig, catalog: SchemaCatalog, limit: Option<usize>) -> Result<QueryPipeline> {
    let generator = LlmClient::new(&config.llm)?;
    let engine = PostgresEngine::new(&config.warehouse);
    let logger = ExecutionLogger::new(config.log_file.clone().map(PathBuf::from), 1000);
    let context = ExecutionContext {
        timeout: config.query_timeout(),
        row_limit: limit,
    };

    Ok(QueryPipeline::new(catalog, Box::new(generator), Box::new(engine))
        .with_logger(logger)
        .with_context(context))
}

async fn run_ask(
    question: String,
    no_execute: bool,
    api_key: Option<String>,
    schema_file: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    let config = load_config(api_key.as_deref())?;
    let catalog = load_catalog(schema_file.as_ref())?;
    let pipeline = build_pipeline(&config, catalog, limit)?;

    println!("\n{}", "=".repeat(80));
    println!(" Question: {}", question.trim());
    println!("{}", "=".repeat(80));

    if no_execute {
        let generated = pipeline.generate(QueryRequest::new(question)).await?;
        println!("\nGenerated SQL (validated, not executed):\n");
        println!("{}", generated.sql);
        return Ok(());
    }

    let response = pipeline.run(QueryRequest::new(question)).await?;
    info!("Request {} completed", response.query_id);

    println!("\nGenerated SQL:\n\n{}\n", response.sql);
    print_result(&response.result);
    Ok(())
}

async fn run_search(
    states: Vec<String>,
    min_states: usize,
    no_telehealth: bool,
    nurse_titles: Vec<String>,
    telehealth_keywords: Vec<String>,
    summary: bool,
    limit: Option<usize>,
) -> Result<()> {
    // The search path substitutes a template for LLM generation, so the
    // LLM credential is not required here.
    let config = AppConfig::from_lookup(|key| {
        std::env::var(key).ok().or_else(|| {
            (key == "OPENAI_API_KEY").then(|| "dummy-api-key".to_string())
        })
    })?;
    let pipeline = build_pipeline(&config, SchemaCatalog::default(), limit)?;

    let search = CandidateSearch::new()
        .with_nurse_titles(nurse_titles)
        .with_telehealth_keywords(telehealth_keywords);
    let mut params = SearchParams::new(states);
    params.min_states = min_states;
    params.require_telehealth = !no_telehealth;

    println!("\n{}", "=".repeat(80));
    println!(" Nurse Practitioner Search");
    println!("{}", "=".repeat(80));

    let response = pipeline.search_candidates(&search, &params).await?;
    print_result(&response.result);

    if summary {
        println!("\n{}", CandidateSearch::summary_report(&response.result));
    }
    Ok(())
}

fn run_validate(sql: String) -> Result<()> {
    let verdict = SqlValidator::new().validate(&sql);
    if verdict.passed {
        println!("PASS: query appears safe");
        Ok(())
    } else {
        let reason = verdict.reason.unwrap_or_else(|| "Rejected".to_string());
        println!("FAIL: {}", reason);
        std::process::exit(1);
    }
}

const MAX_CELL_WIDTH: usize = 40;

fn print_result(result: &QueryResult) {
    if result.columns.is_empty() {
        println!("(no rows)");
        return;
    }

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.len()).collect();
    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(render_cell).collect())
        .collect();
    for row in &rendered {
        for (idx, cell) in row.iter().enumerate() {
            if idx < widths.len() {
                widths[idx] = widths[idx].max(cell.chars().count()).min(MAX_CELL_WIDTH);
            }
        }
    }

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:width$}", c, width = *w))
        .collect();
    println!("{}", header.join(" | "));
    println!("{}", "-".repeat(header.join(" | ").len()));

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let text = if cell.chars().count() > MAX_CELL_WIDTH {
                    let mut truncated: String = cell.chars().take(MAX_CELL_WIDTH - 3).collect();
                    truncated.push_str("...");
                    truncated
                } else {
                    cell.clone()
                };
                format!("{:width$}", text, width = *w)
            })
            .collect();
        println!("{}", line.join(" | "));
    }

    for warning in &result.warnings {
        println!("note: {}", warning);
    }
    println!(
        "\n{} rows in {}ms",
        result.row_count, result.execution_time_ms
    );
}

fn render_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
