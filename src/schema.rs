//! Schema catalog
//!
//! Structured description of the warehouse tables available to query
//! generation. The catalog is used only to condition the LLM prompt; it is
//! loaded once and never mutated by the pipeline. A catalog can be
//! deserialized from JSON so tests can run against synthetic schemas.

use crate::error::{NlqError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnGroup {
    /// Section label shown in the prompt, e.g. "Contact information".
    pub label: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Fully qualified table name.
    pub name: String,
    /// Short alias the generated SQL should use.
    pub alias: String,
    pub column_groups: Vec<ColumnGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCatalog {
    pub tables: Vec<TableSchema>,
    /// Extra instructions appended after the table listing.
    pub notes: Vec<String>,
}

impl SchemaCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: SchemaCatalog = serde_json::from_str(&raw)?;
        if catalog.tables.is_empty() {
            return Err(NlqError::Config(format!(
                "Schema catalog {} defines no tables",
                path.display()
            )));
        }
        Ok(catalog)
    }

    /// Render the catalog into the textual form embedded in the prompt.
    pub fn render(&self) -> String {
        let mut out = String::from("Tables available:\n");
        for (idx, table) in self.tables.iter().enumerate() {
            out.push_str(&format!(
                "\n{}. {} (alias: {})\n",
                idx + 1,
                table.name,
                table.alias
            ));
            for group in &table.column_groups {
                out.push_str(&format!("   - {}: {}\n", group.label, group.columns.join(", ")));
            }
        }
        for note in &self.notes {
            out.push('\n');
            out.push_str(note);
            out.push('\n');
        }
        out
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self {
            tables: vec![
                TableSchema {
                    name: "userprofiles.public.contact_search_dz".to_string(),
                    alias: "c".to_string(),
                    column_groups: vec![
                        ColumnGroup {
                            label: "Contact information".to_string(),
                            columns: str_vec(&[
                                "FIRST_NAME",
                                "LAST_NAME",
                                "EMAIL_ADDRESS",
                                "EMAIL_STATUS",
                            ]),
                        },
                        ColumnGroup {
                            label: "Job details".to_string(),
                            columns: str_vec(&[
                                "JOB_TITLE",
                                "JOB_FUNCTION",
                                "JOB_DESCRIPTION",
                                "JOB_LEVEL",
                                "JOB_START_DATE",
                                "JOB_END_DATE",
                                "JOB_IS_CURRENT",
                            ]),
                        },
                        ColumnGroup {
                            label: "Location".to_string(),
                            columns: str_vec(&[
                                "JOB_LOCATION_CITY",
                                "JOB_LOCATION_STATE",
                                "JOB_LOCATION_STATE_CODE",
                                "JOB_LOCATION_COUNTRY",
                                "JOB_LOCATION_COUNTRY_CODE",
                            ]),
                        },
                        ColumnGroup {
                            label: "Company".to_string(),
                            columns: str_vec(&["COMPANY_NAME", "COMPANY_URL", "RBID_ORG", "RBID"]),
                        },
                        ColumnGroup {
                            label: "Skills & Education".to_string(),
                            columns: str_vec(&["SKILLS", "EDUCATION"]),
                        },
                        ColumnGroup {
                            label: "LinkedIn".to_string(),
                            columns: str_vec(&[
                                "LINKEDIN_URL",
                                "LINKEDIN_HEADLINE",
                                "LINKEDIN_CONNECTIONS_COUNT",
                                "LINKEDIN_INDUSTRY",
                            ]),
                        },
                    ],
                },
                TableSchema {
                    name: "userprofiles.public.org_latest_copy".to_string(),
                    alias: "o".to_string(),
                    column_groups: vec![
                        ColumnGroup {
                            label: "Company info".to_string(),
                            columns: str_vec(&[
                                "COMPANY_NAME",
                                "ABOUT_US",
                                "EMPLOYEE_COUNT_MIN",
                                "EMPLOYEE_COUNT_MAX",
                            ]),
                        },
                        ColumnGroup {
                            label: "Industry".to_string(),
                            columns: str_vec(&[
                                "INDUSTRY_LINKEDIN",
                                "INDUSTRY_SIC_CODE",
                                "INDUSTRY_NAICS_CODE",
                            ]),
                        },
                        ColumnGroup {
                            label: "Location".to_string(),
                            columns: str_vec(&[
                                "HEADQUARTERS_CITY",
                                "HEADQUARTERS_STATE_CODE",
                                "HEADQUARTERS_COUNTRY_CODE",
                            ]),
                        },
                        ColumnGroup {
                            label: "Contact".to_string(),
                            columns: str_vec(&["PHONE", "WEBSITE", "DOMAIN"]),
                        },
                    ],
                },
                TableSchema {
                    name: "userprofiles.public.per_latest_copy".to_string(),
                    alias: "p".to_string(),
                    column_groups: vec![
                        ColumnGroup {
                            label: "Profile".to_string(),
                            columns: str_vec(&["FIRST_NAME", "LAST_NAME", "FULL_NAME", "ABOUT_ME"]),
                        },
                        ColumnGroup {
                            label: "Contact".to_string(),
                            columns: str_vec(&["EMAIL_ADDRESS", "CELLPHONE", "DIRECT_PHONE"]),
                        },
                        ColumnGroup {
                            label: "Location".to_string(),
                            columns: str_vec(&["CITY", "STATE_CODE", "COUNTRY_CODE"]),
                        },
                        ColumnGroup {
                            label: "Job".to_string(),
                            columns: str_vec(&[
                                "JOB_TITLE",
                                "JOB_DESCRIPTION",
                                "JOB_LEVEL",
                                "JOB_FUNCTION",
                            ]),
                        },
                        ColumnGroup {
                            label: "Skills".to_string(),
                            columns: str_vec(&[
                                "SKILLS",
                                "CERTIFICATIONS",
                                "EDUCATION",
                                "LANGUAGES",
                                "INTERESTS",
                            ]),
                        },
                        ColumnGroup {
                            label: "LinkedIn".to_string(),
                            columns: str_vec(&[
                                "LINKEDIN_URL",
                                "LINKEDIN_HEADLINE",
                                "LINKEDIN_CONNECTIONS_COUNT",
                            ]),
                        },
                    ],
                },
            ],
            notes: vec![
                "IMPORTANT: Use the correct table aliases and column names. Do NOT \
                 reference columns that don't exist in the specified table."
                    .to_string(),
            ],
        }
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
