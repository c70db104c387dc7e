//! Nurse-practitioner candidate search
//!
//! The specialized search workflow substitutes a parameterized SQL template
//! for LLM generation: target states, a minimum-states-licensed threshold,
//! and a telehealth-experience toggle. The built statement goes through the
//! same safety validator and executor as generated SQL, so it is written in
//! derived-table form with a leading SELECT and no statement separator.

use crate::error::{NlqError, Result};
use crate::executor::QueryResult;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Job-title variants matched against JOB_TITLE / JOB_FUNCTION / JOB_DESCRIPTION.
pub const DEFAULT_NURSE_TITLES: [&str; 23] = [
    "nurse practitioner",
    "np",
    "nurse",
    "rn",
    "registered nurse",
    "advanced practice nurse",
    "apn",
    "family nurse practitioner",
    "fnp",
    "adult nurse practitioner",
    "anp",
    "pediatric nurse practitioner",
    "pnp",
    "psychiatric nurse practitioner",
    "pmhnp",
    "clinical nurse specialist",
    "cns",
    "nurse anesthetist",
    "crna",
    "nurse midwife",
    "cnm",
    "acute care nurse practitioner",
    "acnp",
];

/// Telehealth-experience keywords matched across description, headline,
/// skills, education, and function fields.
pub const DEFAULT_TELEHEALTH_KEYWORDS: [&str; 28] = [
    "telehealth",
    "telemedicine",
    "remote",
    "virtual",
    "online",
    "telepractice",
    "ehealth",
    "digital health",
    "remote care",
    "virtual care",
    "teleconsultation",
    "telemonitoring",
    "telemed",
    "telenursing",
    "telepsychiatry",
    "telecardiology",
    "remote patient monitoring",
    "virtual visits",
    "online consultations",
    "digital consultations",
    "remote healthcare",
    "virtual healthcare",
    "telehealth platform",
    "telemedicine platform",
    "remote clinical",
    "virtual clinical",
    "online clinical",
    "digital clinical",
];

lazy_static! {
    static ref STATE_CODES: HashMap<&'static str, &'static str> = HashMap::from([
        ("alabama", "AL"),
        ("alaska", "AK"),
        ("arizona", "AZ"),
        ("arkansas", "AR"),
        ("california", "CA"),
        ("colorado", "CO"),
        ("connecticut", "CT"),
        ("delaware", "DE"),
        ("florida", "FL"),
        ("georgia", "GA"),
        ("hawaii", "HI"),
        ("idaho", "ID"),
        ("illinois", "IL"),
        ("indiana", "IN"),
        ("iowa", "IA"),
        ("kansas", "KS"),
        ("kentucky", "KY"),
        ("louisiana", "LA"),
        ("maine", "ME"),
        ("maryland", "MD"),
        ("massachusetts", "MA"),
        ("michigan", "MI"),
        ("minnesota", "MN"),
        ("mississippi", "MS"),
        ("missouri", "MO"),
        ("montana", "MT"),
        ("nebraska", "NE"),
        ("nevada", "NV"),
        ("new hampshire", "NH"),
        ("new jersey", "NJ"),
        ("new mexico", "NM"),
        ("new york", "NY"),
        ("north carolina", "NC"),
        ("north dakota", "ND"),
        ("ohio", "OH"),
        ("oklahoma", "OK"),
        ("oregon", "OR"),
        ("pennsylvania", "PA"),
        ("rhode island", "RI"),
        ("south carolina", "SC"),
        ("south dakota", "SD"),
        ("tennessee", "TN"),
        ("texas", "TX"),
        ("utah", "UT"),
        ("vermont", "VT"),
        ("virginia", "VA"),
        ("washington", "WA"),
        ("west virginia", "WV"),
        ("wisconsin", "WI"),
        ("wyoming", "WY"),
    ]);
}

/// Search parameters. States accept full names or two-letter codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    pub states: Vec<String>,
    pub min_states: usize,
    pub require_telehealth: bool,
}

impl SearchParams {
    pub fn new(states: Vec<String>) -> Self {
        Self {
            states,
            min_states: 1,
            require_telehealth: true,
        }
    }
}

pub struct CandidateSearch {
    nurse_titles: Vec<String>,
    telehealth_keywords: Vec<String>,
}

impl CandidateSearch {
    pub fn new() -> Self {
        Self {
            nurse_titles: DEFAULT_NURSE_TITLES.iter().map(|s| s.to_string()).collect(),
            telehealth_keywords: DEFAULT_TELEHEALTH_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_nurse_titles(mut self, titles: Vec<String>) -> Self {
        if !titles.is_empty() {
            self.nurse_titles = titles;
        }
        self
    }

    pub fn with_telehealth_keywords(mut self, keywords: Vec<String>) -> Self {
        if !keywords.is_empty() {
            self.telehealth_keywords = keywords;
        }
        self
    }

    /// Resolve state names/abbreviations to two-letter codes. Unknown
    /// entries are skipped; an input with no recognizable state is rejected.
    pub fn resolve_states(states: &[String]) -> Result<Vec<String>> {
        let mut codes: Vec<String> = Vec::new();
        for state in states {
            let normalized = state.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            let code = if let Some(code) = STATE_CODES.get(normalized.as_str()) {
                Some(code.to_string())
            } else {
                let upper = normalized.to_uppercase();
                STATE_CODES
                    .values()
                    .find(|c| **c == upper)
                    .map(|c| c.to_string())
            };
            if let Some(code) = code {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }

        if codes.is_empty() {
            return Err(NlqError::InvalidRequest(
                "No valid states provided".to_string(),
            ));
        }
        Ok(codes)
    }

    /// Build the search statement for the given parameters.
    pub fn build_query(&self, params: &SearchParams) -> Result<String> {
        let state_codes = Self::resolve_states(&params.states)?;

        let nurse_patterns = like_patterns(&self.nurse_titles);
        let telehealth_patterns = like_patterns(&self.telehealth_keywords);

        let state_list = state_codes
            .iter()
            .map(|code| format!("'{}'", code))
            .collect::<Vec<_>>()
            .join(", ");

        let telehealth_case = format!(
            r#"CASE WHEN (
                {}
                OR {}
                OR {}
                OR {}
                OR {}
            ) THEN TRUE ELSE FALSE END AS has_telehealth_experience"#,
            like_any("c.JOB_DESCRIPTION", &telehealth_patterns),
            like_any("c.LINKEDIN_HEADLINE", &telehealth_patterns),
            like_any("c.SKILLS", &telehealth_patterns),
            like_any("c.EDUCATION", &telehealth_patterns),
            like_any("c.JOB_FUNCTION", &telehealth_patterns),
        );

        let nurse_case = format!(
            r#"CASE WHEN (
                {}
                OR {}
            ) THEN TRUE ELSE FALSE END AS is_nurse_practitioner"#,
            like_any("c.JOB_TITLE", &nurse_patterns),
            like_any("c.JOB_FUNCTION", &nurse_patterns),
        );

        let telehealth_filter = if params.require_telehealth {
            "\n    AND has_telehealth_experience = TRUE"
        } else {
            ""
        };

        let sql = format!(
            r#"SELECT
    FIRST_NAME,
    LAST_NAME,
    EMAIL_ADDRESS,
    JOB_TITLE,
    JOB_DESCRIPTION,
    LINKEDIN_HEADLINE,
    COMPANY_NAME,
    SKILLS,
    EDUCATION,
    LINKEDIN_URL,
    state_codes,
    states_licensed_in,
    has_telehealth_experience,
    is_nurse_practitioner,
    JOB_START_DATE,
    JOB_END_DATE,
    JOB_IS_CURRENT
FROM (
    SELECT
        c.FIRST_NAME,
        c.LAST_NAME,
        c.EMAIL_ADDRESS,
        c.JOB_TITLE,
        c.JOB_DESCRIPTION,
        c.LINKEDIN_HEADLINE,
        c.COMPANY_NAME,
        c.SKILLS,
        c.EDUCATION,
        c.LINKEDIN_URL,
        c.JOB_START_DATE,
        c.JOB_END_DATE,
        c.JOB_IS_CURRENT,
        STRING_AGG(DISTINCT c.JOB_LOCATION_STATE_CODE, ', ') AS state_codes,
        COUNT(DISTINCT c.JOB_LOCATION_STATE_CODE) AS states_licensed_in,
        {telehealth_case},
        {nurse_case}
    FROM userprofiles.public.contact_search_dz c
    WHERE (
            {title_filter}
            OR {function_filter}
            OR {description_filter}
        )
        AND c.JOB_LOCATION_STATE_CODE IN ({state_list})
        AND COALESCE(c.JOB_IS_CURRENT, FALSE) = TRUE
    GROUP BY
        c.FIRST_NAME, c.LAST_NAME, c.EMAIL_ADDRESS, c.JOB_TITLE,
        c.JOB_DESCRIPTION, c.LINKEDIN_HEADLINE, c.COMPANY_NAME,
        c.SKILLS, c.EDUCATION, c.LINKEDIN_URL,
        c.JOB_START_DATE, c.JOB_END_DATE, c.JOB_IS_CURRENT
) candidates
WHERE states_licensed_in >= {min_states}
    AND is_nurse_practitioner = TRUE{telehealth_filter}
ORDER BY
    states_licensed_in DESC,
    has_telehealth_experience DESC,
    JOB_START_DATE DESC"#,
            telehealth_case = telehealth_case,
            nurse_case = nurse_case,
            title_filter = like_any("c.JOB_TITLE", &nurse_patterns),
            function_filter = like_any("c.JOB_FUNCTION", &nurse_patterns),
            description_filter = like_any("c.JOB_DESCRIPTION", &nurse_patterns),
            state_list = state_list,
            min_states = params.min_states,
            telehealth_filter = telehealth_filter,
        );

        Ok(sql)
    }

    /// Plain-text summary of a search result set.
    pub fn summary_report(result: &QueryResult) -> String {
        let total = result.row_count;

        let avg_states = column_f64_values(result, "states_licensed_in")
            .map(|values| {
                if values.is_empty() {
                    0.0
                } else {
                    values.iter().sum::<f64>() / values.len() as f64
                }
            })
            .unwrap_or(0.0);

        let telehealth_count = result
            .column_index("has_telehealth_experience")
            .map(|idx| {
                result
                    .rows
                    .iter()
                    .filter(|row| row.get(idx).and_then(|v| v.as_bool()).unwrap_or(false))
                    .count()
            })
            .unwrap_or(0);

        let unique_companies = result
            .column_index("company_name")
            .map(|idx| {
                result
                    .rows
                    .iter()
                    .filter_map(|row| row.get(idx).and_then(|v| v.as_str()))
                    .collect::<std::collections::HashSet<_>>()
                    .len()
            })
            .unwrap_or(0);

        format!(
            "NURSE PRACTITIONER SEARCH SUMMARY\n\
             =================================\n\
             Total candidates found: {}\n\
             Average states licensed in: {:.1}\n\
             Candidates with telehealth experience: {}\n\
             Unique companies represented: {}\n",
            total, avg_states, telehealth_count, unique_companies
        )
    }
}

impl Default for CandidateSearch {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased, quote-escaped `%keyword%` patterns.
fn like_patterns(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|kw| format!("'%{}%'", kw.trim().to_lowercase().replace('\'', "''")))
        .collect()
}

fn like_any(column: &str, patterns: &[String]) -> String {
    format!(
        "LOWER(COALESCE({}, '')) LIKE ANY ({})",
        column,
        patterns.join(", ")
    )
}

fn column_f64_values(result: &QueryResult, column: &str) -> Option<Vec<f64>> {
    let idx = result.column_index(column)?;
    Some(
        result
            .rows
            .iter()
            .filter_map(|row| row.get(idx).and_then(|v| v.as_f64()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::SqlValidator;
    use serde_json::json;

    #[test]
    fn resolves_names_and_codes() {
        let states = vec![
            "California".to_string(),
            "tx".to_string(),
            "New York".to_string(),
            "Atlantis".to_string(),
            "california".to_string(),
        ];
        let codes = CandidateSearch::resolve_states(&states).unwrap();
        assert_eq!(codes, vec!["CA", "TX", "NY"]);
    }

    #[test]
    fn all_unknown_states_is_an_invalid_request() {
        let err =
            CandidateSearch::resolve_states(&["Atlantis".to_string(), "".to_string()]).unwrap_err();
        assert!(matches!(err, NlqError::InvalidRequest(_)));
    }

    #[test]
    fn built_query_passes_the_safety_validator() {
        let search = CandidateSearch::new();
        let params = SearchParams::new(vec!["california".to_string(), "texas".to_string()]);
        let sql = search.build_query(&params).unwrap();

        let verdict = SqlValidator::new().validate(&sql);
        assert!(verdict.passed, "verdict: {:?}", verdict.reason);
    }

    #[test]
    fn state_codes_appear_in_the_filter() {
        let search = CandidateSearch::new();
        let params = SearchParams::new(vec!["california".to_string(), "texas".to_string()]);
        let sql = search.build_query(&params).unwrap();
        assert!(sql.contains("c.JOB_LOCATION_STATE_CODE IN ('CA', 'TX')"));
    }

    #[test]
    fn min_states_threshold_is_templated() {
        let search = CandidateSearch::new();
        let mut params = SearchParams::new(vec!["california".to_string()]);
        params.min_states = 3;
        let sql = search.build_query(&params).unwrap();
        assert!(sql.contains("states_licensed_in >= 3"));
    }

    #[test]
    fn telehealth_toggle_controls_the_outer_filter() {
        let search = CandidateSearch::new();

        let with = search
            .build_query(&SearchParams::new(vec!["california".to_string()]))
            .unwrap();
        assert!(with.contains("AND has_telehealth_experience = TRUE"));

        let mut params = SearchParams::new(vec!["california".to_string()]);
        params.require_telehealth = false;
        let without = search.build_query(&params).unwrap();
        assert!(!without.contains("AND has_telehealth_experience = TRUE"));
        // Detection column is still computed either way.
        assert!(without.contains("AS has_telehealth_experience"));
    }

    #[test]
    fn keywords_are_escaped_and_lowercased() {
        let search = CandidateSearch::new()
            .with_telehealth_keywords(vec!["Nurse's Aide".to_string()]);
        let sql = search
            .build_query(&SearchParams::new(vec!["california".to_string()]))
            .unwrap();
        assert!(sql.contains("'%nurse''s aide%'"));
        assert!(SqlValidator::new().validate(&sql).passed);
    }

    #[test]
    fn default_lists_reach_the_template() {
        let search = CandidateSearch::new();
        let sql = search
            .build_query(&SearchParams::new(vec!["california".to_string()]))
            .unwrap();
        assert!(sql.contains("'%nurse practitioner%'"));
        assert!(sql.contains("'%telemedicine%'"));
        assert!(sql.contains("'%pmhnp%'"));
    }

    #[test]
    fn summary_report_aggregates_result_columns() {
        let result = QueryResult::new(
            vec![
                "FIRST_NAME".to_string(),
                "COMPANY_NAME".to_string(),
                "states_licensed_in".to_string(),
                "has_telehealth_experience".to_string(),
            ],
            vec![
                vec![json!("Ada"), json!("Acme Health"), json!(3), json!(true)],
                vec![json!("Grace"), json!("Acme Health"), json!(1), json!(false)],
                vec![json!("Mary"), json!("CareCo"), json!(2), json!(true)],
            ],
            "mock".to_string(),
        );

        let report = CandidateSearch::summary_report(&result);
        assert!(report.contains("Total candidates found: 3"));
        assert!(report.contains("Average states licensed in: 2.0"));
        assert!(report.contains("telehealth experience: 2"));
        assert!(report.contains("Unique companies represented: 2"));
    }
}
