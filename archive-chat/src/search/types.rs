//! Search types and data structures

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ArchiveError;

/// One search hit, normalized from the engine's raw document.
///
/// Every field is a plain string and absent source fields become `""`, so
/// rendering and sorting never deal with missing values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub to: String,
    pub cc: String,
    pub date: String,
}

impl ResultRow {
    /// Text of the column a sort key refers to
    pub fn field(&self, key: SortKey) -> &str {
        match key {
            SortKey::Subject => &self.subject,
            SortKey::Body => &self.body,
            SortKey::Sender => &self.sender,
            SortKey::Date => &self.date,
        }
    }
}

/// How multiple search terms combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    #[default]
    Or,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::And => "and",
            Operator::Or => "or",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            other => Err(ArchiveError::InvalidInput(format!(
                "unknown operator '{}', expected 'and' or 'or'",
                other
            ))),
        }
    }
}

/// Parameters of one search request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Free text; blank means "match everything"
    pub search_text: String,
    /// Fields the text is matched against, in order
    pub search_fields: Vec<String>,
    pub operator: Operator,
    /// Inclusive lower date bound (ISO date)
    pub date_from: Option<String>,
    /// Inclusive upper date bound (ISO date)
    pub date_to: Option<String>,
}

impl SearchParams {
    /// Search `text` in subject and body with the `or` operator
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            search_text: text.into(),
            search_fields: vec!["subject".to_string(), "body".to_string()],
            operator: Operator::default(),
            date_from: None,
            date_to: None,
        }
    }

    /// Replace the searched fields; an empty list keeps the current ones
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields
            .into_iter()
            .map(Into::into)
            .filter(|f| !f.trim().is_empty())
            .collect();
        if !fields.is_empty() {
            self.search_fields = fields;
        }
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = operator;
        self
    }

    /// Set the lower bound; blank input clears it
    pub fn with_date_from(mut self, date: Option<String>) -> Self {
        self.date_from = non_blank(date);
        self
    }

    /// Set the upper bound; blank input clears it
    pub fn with_date_to(mut self, date: Option<String>) -> Self {
        self.date_to = non_blank(date);
        self
    }

    pub fn has_text(&self) -> bool {
        !self.search_text.trim().is_empty()
    }

    pub fn date_from(&self) -> Option<&str> {
        self.date_from.as_deref().filter(|d| !d.trim().is_empty())
    }

    pub fn date_to(&self) -> Option<&str> {
        self.date_to.as_deref().filter(|d| !d.trim().is_empty())
    }

    /// True when neither text nor a date bound narrows the search
    pub fn is_match_all(&self) -> bool {
        !self.has_text() && self.date_from().is_none() && self.date_to().is_none()
    }

    /// Title for the session opened after this search
    pub fn session_title(&self, fallback: &str) -> String {
        let text = self.search_text.trim();
        if text.is_empty() {
            fallback.to_string()
        } else {
            text.to_string()
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Pagination cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub page_size: u64,
    /// 1-based
    pub current_page: u64,
    pub total_hits: u64,
}

impl PageState {
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size: page_size.max(1),
            current_page: 1,
            total_hits: 0,
        }
    }

    /// `max(1, ceil(total_hits / page_size))`
    pub fn total_pages(&self) -> u64 {
        self.total_hits.div_ceil(self.page_size).max(1)
    }

    /// Pagination controls are only shown past a single page of hits
    pub fn has_multiple_pages(&self) -> bool {
        self.total_hits > self.page_size
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    /// Engine offset of the first row of `page`
    pub fn offset(&self, page: u64) -> u64 {
        (page.max(1) - 1) * self.page_size
    }
}

/// Columns the results can be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Subject,
    Body,
    Sender,
    Date,
}

impl SortKey {
    pub const ALL: [SortKey; 4] = [SortKey::Subject, SortKey::Body, SortKey::Sender, SortKey::Date];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Subject => "subject",
            SortKey::Body => "body",
            SortKey::Sender => "sender",
            SortKey::Date => "date",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                ArchiveError::InvalidInput(format!(
                    "unknown sort column '{}', expected subject, body, sender or date",
                    s
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn flip(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// View-only sort selection; `key == None` keeps the engine's order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortState {
    pub key: Option<SortKey>,
    pub dir: SortDir,
}

/// Parse the date formats found in archived mail.
///
/// Accepts RFC 3339, `YYYY-MM-DD[ T]HH:MM:SS[.fff]` (read as UTC),
/// `YYYY-MM-DD` (midnight UTC) and RFC 2822 header dates.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
