//! Execution audit log
//!
//! One structured entry per pipeline request: what was asked, what SQL was
//! produced, and how the request ended. Entries are kept in a bounded
//! in-memory buffer and optionally appended to a JSONL file. The log is an
//! audit artifact only; the pipeline never reads it back.

use crate::error::{NlqError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub query_id: String,
    /// Natural-language question, or a template label for the search path.
    pub question: String,
    pub sql_generated: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub rows_returned: Option<u64>,
    pub execution_time_ms: Option<u64>,
}

impl QueryLogEntry {
    pub fn started(query_id: String, question: String) -> Self {
        Self {
            timestamp: Utc::now(),
            query_id,
            question,
            sql_generated: None,
            success: false,
            error_message: None,
            rows_returned: None,
            execution_time_ms: None,
        }
    }
}

pub struct ExecutionLogger {
    log_file: Option<PathBuf>,
    entries: Arc<Mutex<Vec<QueryLogEntry>>>,
    max_in_memory: usize,
}

impl ExecutionLogger {
    pub fn new(log_file: Option<PathBuf>, max_in_memory: usize) -> Self {
        Self {
            log_file,
            entries: Arc::new(Mutex::new(Vec::new())),
            max_in_memory,
        }
    }

    pub fn log(&self, entry: QueryLogEntry) -> Result<()> {
        {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| NlqError::Execution("Audit log lock poisoned".to_string()))?;
            entries.push(entry.clone());
            if entries.len() > self.max_in_memory {
                entries.remove(0);
            }
        }

        if self.log_file.is_some() {
            self.append_to_file(&entry)?;
        }

        Ok(())
    }

    fn append_to_file(&self, entry: &QueryLogEntry) -> Result<()> {
        if let Some(ref log_file) = self.log_file {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            let json = serde_json::to_string(entry)?;
            writeln!(file, "{}", json)?;
        }
        Ok(())
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<QueryLogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for ExecutionLogger {
    fn default() -> Self {
        Self::new(None, 1000)
    }
}
