// Core structs: Candidate, Specs, RowResult
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

/// A product listing scraped from one search results page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub price: Option<f64>,
    pub url: String,
    /// Lower-cased category name, empty when the page did not expose one.
    pub category: String,
    pub subcategory: Option<String>,
}

/// A candidate together with its similarity to the source query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

/// Structured hints extracted from a supplier description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Specs {
    pub ram: Option<String>,
    pub storage: Option<String>,
    pub processor: Option<String>,
    pub graphics: Option<String>,
    pub screen_size: Option<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Found,
    Possible,
    NotFound,
}

/// Outcome of resolving one spreadsheet row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowResult {
    pub query: String,
    pub best_id: Option<String>,
    pub best_title: Option<String>,
    pub best_price: Option<f64>,
    pub score: Option<f64>,
    pub url: Option<String>,
    pub status: MatchStatus,
}

impl RowResult {
    /// Result for a row that never produced a scored candidate.
    pub fn not_found(query: &str) -> Self {
        Self {
            query: query.to_string(),
            best_id: None,
            best_title: None,
            best_price: None,
            score: None,
            url: None,
            status: MatchStatus::NotFound,
        }
    }

    /// Человекочитаемый статус для колонки «статус поиска».
    pub fn status_label(&self) -> String {
        match (self.status, self.score) {
            (MatchStatus::Found, Some(score)) => format!("найден (score: {:.2})", score),
            (MatchStatus::Possible, Some(score)) => {
                format!("возможное совпадение (score: {:.2})", score)
            }
            _ => "не найден".to_string(),
        }
    }
}

/// A previously persisted match, read back from the history database.
#[derive(Debug, Clone)]
pub struct StoredMatch {
    pub query: String,
    pub best_id: Option<String>,
    pub score: Option<f64>,
    pub status: String,
    pub matched_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("request timed out")]
    Timeout,
    #[error("invalid response status {0}")]
    InvalidResponse(u16),
    #[error(transparent)]
    Parse(#[from] ParserError),
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::HttpError(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("html parse error: {0}")]
    HtmlParseError(String),
    #[error("embedded json is malformed: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("xlsx error: {0}")]
    Xlsx(String),
    #[error("sheet '{0}' not found in workbook")]
    MissingSheet(String),
    #[error("column '{column}' not found in input file. Columns: {available:?}")]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
}

impl From<zip::result::ZipError> for InputError {
    fn from(e: zip::result::ZipError) -> Self {
        InputError::Xlsx(e.to_string())
    }
}

impl From<quick_xml::Error> for InputError {
    fn from(e: quick_xml::Error) -> Self {
        InputError::Xlsx(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("xlsx error: {0}")]
    Xlsx(#[from] zip::result::ZipError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl fmt::Display for Specs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("ram", &self.ram),
            ("storage", &self.storage),
            ("processor", &self.processor),
            ("graphics", &self.graphics),
            ("screen_size", &self.screen_size),
            ("os", &self.os),
        ];
        let known: Vec<String> = fields
            .iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| format!("{}={}", name, v)))
            .collect();
        if known.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&known.join(", "))
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MatchStatus::Found => "found",
            MatchStatus::Possible => "possible",
            MatchStatus::NotFound => "not found",
        };
        f.write_str(s)
    }
}
