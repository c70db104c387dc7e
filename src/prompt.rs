//! Prompt builder
//!
//! Combines the schema catalog, the generation rules, and the user's
//! question into a single LLM request payload. Pure string assembly, no
//! side effects. Empty questions are rejected by the pipeline before this
//! runs.

use crate::schema::SchemaCatalog;

/// A built prompt: system instructions plus the user question.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub struct PromptBuilder {
    catalog: SchemaCatalog,
}

impl PromptBuilder {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn build(&self, question: &str) -> Prompt {
        let system = format!(
            r#"You are a SQL expert. Convert the user's natural language query into a single valid SQL SELECT statement.

Database Schema:
{}

CRITICAL RULES:
1. Generate exactly one read-only SELECT statement
2. ALWAYS use the table aliases given in the schema
3. ONLY reference columns that actually exist in the specified tables
4. For nurse practitioner searches, be flexible with job title matching:
   use LOWER(c.JOB_TITLE) LIKE ANY ('%nurse%', '%np%', '%nurse practitioner%', '%rn%', '%registered nurse%', '%advanced practice%', '%apn%', '%fnp%', '%anp%', '%pnp%', '%pmhnp%')
5. For telehealth experience, check multiple fields (JOB_DESCRIPTION, LINKEDIN_HEADLINE, SKILLS, EDUCATION)
   with keywords such as 'telehealth', 'telemedicine', 'remote', 'virtual', 'online', 'telepractice', 'digital health'
6. For state licensing, filter on c.JOB_LOCATION_STATE_CODE with two-letter codes
7. Use proper JOIN syntax and table aliases when combining tables
8. When using GROUP BY with COUNT(DISTINCT), only ORDER BY columns in the GROUP BY clause or aggregates
9. Use clean LIKE patterns like '%keyword%'
10. Return only the SQL query, no explanations"#,
            self.catalog.render()
        );

        Prompt {
            system,
            user: question.trim().to_string(),
        }
    }
}
