//! Row normalization: raw worksheet rows in, uniform records out.
//!
//! Every row runs through an ordered list of [`TransformRule`]s. A rule either
//! hands a (possibly modified) record to the next rule or drops it. Rules
//! only see the fields that survived the rules before them, so order matters:
//! a `Validate` on `title` placed before the `Rename` from `name` inspects
//! nothing.
//!
//! Failures come in two flavours. A required column missing from a worksheet
//! header is schema breaking and aborts before any row is touched. A value a
//! rule cannot process (a malformed date, a template placeholder with no
//! field) only costs that one record, which is logged and dropped.

use crate::core::{RawRow, Record, RecordSet, Worksheet};
use crate::utils::error::{Result, SyncError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt::Write;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum TransformRule {
    /// Drops the record when a present field fails `check`.
    Validate { field: String, check: FieldCheck },
    Rename { from: String, to: String },
    Drop { fields: Vec<String> },
    Derive { field: String, from: Derivation },
    /// Drops the record when `field` meets `when`. An absent field reads as empty.
    Reject {
        field: String,
        when: Condition,
        #[serde(default)]
        ignore_case: bool,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCheck {
    NonEmpty,
    Integer,
    Matches(Pattern),
    /// chrono format string, e.g. `%Y-%m-%d`.
    Date(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Empty,
    NotEmpty,
    Equals(String),
    StartsWith(String),
    Contains(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    Constant(String),
    /// `{field}` placeholders are replaced with field values.
    Template(String),
    /// Slug of another field, e.g. `Saturday, 10:00 (AM)` -> `saturday-10-00`.
    Slug(String),
    /// Last weekday named in another field, e.g. `Saturday Morning (10:00)` -> `Saturday`.
    Weekday(String),
    JoinPrefixed {
        prefix: String,
        #[serde(default = "default_separator")]
        separator: String,
        /// Keep only the text before the first comma of each value.
        #[serde(default)]
        first_segment: bool,
        #[serde(default)]
        remove_sources: bool,
        /// Also store the full non-empty values as a list under this field.
        #[serde(default)]
        array_field: Option<String>,
    },
    /// Removes list items containing any of `drop_keywords` as a word.
    FilterList {
        source: String,
        drop_keywords: Vec<String>,
        #[serde(default = "default_list_separator")]
        separator: String,
    },
    ReformatTime {
        source: String,
        input: String,
        output: String,
        #[serde(default)]
        segment: TimeSegment,
        #[serde(default)]
        on_error: OnError,
    },
}

/// Which part of the source cell holds the time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSegment {
    #[default]
    Whole,
    /// Last five characters of the last parenthesized group: `Day (10:00)` -> `10:00`.
    LastParens,
}

/// What a value that does not parse does to its record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnError {
    #[default]
    Drop,
    /// Keep the record with an empty value.
    Empty,
}

fn default_list_separator() -> String {
    ",".to_string()
}

fn default_separator() -> String {
    ", ".to_string()
}

/// Regular expression compiled when the configuration is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct Pattern(Regex);

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Regex::new(&value).map(Pattern)
    }
}

impl Pattern {
    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

/// Why a rule could not process a record's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError(pub String);

pub type RuleResult = std::result::Result<Option<Record>, RuleError>;

impl TransformRule {
    pub fn apply(&self, mut record: Record) -> RuleResult {
        match self {
            TransformRule::Validate { field, check } => match record.text(field) {
                Some(value) if !check.passes(&value) => {
                    tracing::debug!("Field '{}' failed {:?}: {:?}", field, check, value);
                    Ok(None)
                }
                _ => Ok(Some(record)),
            },
            TransformRule::Rename { from, to } => {
                if from != to && record.data.contains_key(from) {
                    record.data = rename_key(std::mem::take(&mut record.data), from, to);
                }
                Ok(Some(record))
            }
            TransformRule::Drop { fields } => {
                record.data.retain(|key, _| !fields.contains(key));
                Ok(Some(record))
            }
            TransformRule::Derive { field, from } => {
                from.derive(field, &mut record)?;
                Ok(Some(record))
            }
            TransformRule::Reject {
                field,
                when,
                ignore_case,
            } => {
                let value = record.text(field).unwrap_or_default();
                if when.matches(&value, *ignore_case) {
                    Ok(None)
                } else {
                    Ok(Some(record))
                }
            }
        }
    }
}

impl FieldCheck {
    pub fn passes(&self, value: &str) -> bool {
        let value = value.trim();
        match self {
            FieldCheck::NonEmpty => !value.is_empty(),
            FieldCheck::Integer => value.parse::<i64>().is_ok(),
            FieldCheck::Matches(pattern) => pattern.is_match(value),
            FieldCheck::Date(format) => NaiveDate::parse_from_str(value, format).is_ok()
                || NaiveDateTime::parse_from_str(value, format).is_ok(),
        }
    }
}

impl Condition {
    pub fn matches(&self, value: &str, ignore_case: bool) -> bool {
        let fold = |s: &str| {
            if ignore_case {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        let value = fold(value.trim());
        match self {
            Condition::Empty => value.is_empty(),
            Condition::NotEmpty => !value.is_empty(),
            Condition::Equals(expected) => value == fold(expected),
            Condition::StartsWith(prefix) => value.starts_with(&fold(prefix)),
            Condition::Contains(needle) => value.contains(&fold(needle)),
        }
    }
}

impl Derivation {
    /// Writes `field` (and any companion field). An absent source field
    /// leaves the record untouched.
    fn derive(&self, field: &str, record: &mut Record) -> std::result::Result<(), RuleError> {
        match self {
            Derivation::Constant(value) => record.insert(field, value.clone()),
            Derivation::Template(template) => {
                let rendered = render_template(template, record)?;
                record.insert(field, rendered);
            }
            Derivation::Slug(source) => {
                if let Some(text) = record.text(source) {
                    record.insert(field, slugify(&text));
                }
            }
            Derivation::Weekday(source) => {
                if let Some(day) = record.text(source).and_then(|text| weekday_in(&text)) {
                    record.insert(field, day);
                }
            }
            Derivation::JoinPrefixed {
                prefix,
                separator,
                first_segment,
                remove_sources,
                array_field,
            } => {
                let mut parts = Vec::new();
                let mut full = Vec::new();
                for (key, value) in &record.data {
                    if !key.starts_with(prefix.as_str()) {
                        continue;
                    }
                    let text = match value {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let part = if *first_segment {
                        text.split(',').next().unwrap_or_default().trim().to_string()
                    } else {
                        text.trim().to_string()
                    };
                    if !part.is_empty() {
                        parts.push(part);
                    }
                    if !text.trim().is_empty() {
                        full.push(Value::String(text));
                    }
                }
                if *remove_sources {
                    record.data.retain(|key, _| !key.starts_with(prefix.as_str()));
                }
                record.insert(field, parts.join(separator.as_str()));
                if let Some(array_field) = array_field {
                    record.insert(array_field.clone(), Value::Array(full));
                }
            }
            Derivation::FilterList {
                source,
                drop_keywords,
                separator,
            } => {
                if let Some(text) = record.text(source) {
                    let keywords: Vec<String> = drop_keywords.iter().map(|k| k.to_lowercase()).collect();
                    let kept: Vec<&str> = text
                        .split(separator.as_str())
                        .filter(|item| {
                            !item
                                .to_lowercase()
                                .split_whitespace()
                                .any(|word| keywords.iter().any(|k| k == word))
                        })
                        .collect();
                    record.insert(field, kept.join(separator.as_str()));
                }
            }
            Derivation::ReformatTime {
                source,
                input,
                output,
                segment,
                on_error,
            } => {
                let Some(raw) = record.text(source) else {
                    return Ok(());
                };
                let value = segment.extract(&raw);
                if value.is_empty() {
                    record.insert(field, String::new());
                    return Ok(());
                }
                match (reformat_time(&value, input, output), on_error) {
                    (Ok(formatted), _) => record.insert(field, formatted),
                    (Err(_), OnError::Empty) => record.insert(field, String::new()),
                    (Err(e), OnError::Drop) => return Err(e),
                }
            }
        }
        Ok(())
    }
}

impl TimeSegment {
    fn extract(&self, raw: &str) -> String {
        match self {
            TimeSegment::Whole => raw.trim().to_string(),
            TimeSegment::LastParens => {
                let segment = raw.rsplit('(').next().unwrap_or_default().trim().trim_matches(')').trim();
                let tail: Vec<char> = segment.chars().rev().take(5).collect();
                tail.into_iter().rev().collect::<String>().trim().to_string()
            }
        }
    }
}

const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Latest day of the week named in `text`.
fn weekday_in(text: &str) -> Option<&'static str> {
    WEEKDAYS.iter().rev().find(|day| text.contains(*day)).copied()
}

fn rename_key(data: Map<String, Value>, from: &str, to: &str) -> Map<String, Value> {
    let mut renamed = Map::with_capacity(data.len());
    let mut moved = None;
    for (key, value) in data {
        if key == from {
            moved = Some(value);
            renamed.insert(to.to_string(), Value::Null);
        } else if key != to {
            renamed.insert(key, value);
        }
    }
    if let Some(value) = moved {
        renamed.insert(to.to_string(), value);
    }
    renamed
}

pub fn slugify(value: &str) -> String {
    let head = value.split('(').next().unwrap_or_default().trim();
    head.to_lowercase()
        .replace(' ', "-")
        .replace(',', "")
        .replace(':', "-")
        .replace('*', "")
}

fn render_template(template: &str, record: &Record) -> std::result::Result<String, RuleError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after
            .find('}')
            .ok_or_else(|| RuleError(format!("unterminated placeholder in template '{}'", template)))?;
        let name = &after[..end];
        let value = record
            .text(name)
            .ok_or_else(|| RuleError(format!("template field '{}' is missing", name)))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn reformat_time(raw: &str, input: &str, output: &str) -> std::result::Result<String, RuleError> {
    let mut out = String::new();
    let written = if let Ok(dt) = NaiveDateTime::parse_from_str(raw, input) {
        write!(out, "{}", dt.format(output))
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, input) {
        write!(out, "{}", date.format(output))
    } else if let Ok(time) = NaiveTime::parse_from_str(raw, input) {
        write!(out, "{}", time.format(output))
    } else {
        return Err(RuleError(format!("'{}' does not match format '{}'", raw, input)));
    };
    written.map_err(|_| RuleError(format!("cannot format '{}' with '{}'", raw, output)))?;
    Ok(out)
}

/// Output of a normalization pass.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: RecordSet,
    pub input_rows: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    rules: Vec<TransformRule>,
    required_columns: Vec<String>,
    skip_blank_rows: bool,
}

impl RecordNormalizer {
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self {
            rules,
            required_columns: Vec::new(),
            skip_blank_rows: true,
        }
    }

    pub fn with_required_columns(mut self, columns: Vec<String>) -> Self {
        self.required_columns = columns;
        self
    }

    pub fn with_skip_blank_rows(mut self, skip: bool) -> Self {
        self.skip_blank_rows = skip;
        self
    }

    /// Fails with `ValidationError` when a worksheet header lacks a required column.
    pub fn check_schema(&self, worksheets: &[Worksheet]) -> Result<()> {
        for sheet in worksheets {
            let missing: Vec<&str> = self
                .required_columns
                .iter()
                .filter(|column| !sheet.has_column(column))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(SyncError::validation(format!(
                    "worksheet '{}' is missing required column(s): {}",
                    sheet.name,
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }

    pub fn normalize(&self, worksheets: &[Worksheet]) -> Result<Normalized> {
        self.check_schema(worksheets)?;

        let mut result = Normalized::default();
        for sheet in worksheets {
            for (index, row) in sheet.rows.iter().enumerate() {
                result.input_rows += 1;
                // Spreadsheet row number; row 1 is the header.
                let row_number = index + 2;
                match self.normalize_row(&sheet.name, row_number, row) {
                    Ok(Some(record)) => result.records.push(record),
                    Ok(None) => result.dropped += 1,
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!("⚠️ Dropping record: {}", e);
                        result.dropped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        tracing::info!(
            "🔄 Normalized {} row(s) into {} record(s), {} dropped",
            result.input_rows,
            result.records.len(),
            result.dropped
        );
        Ok(result)
    }

    pub fn normalize_row(&self, worksheet: &str, row: usize, raw: &RawRow) -> Result<Option<Record>> {
        if self.skip_blank_rows && raw.is_blank() {
            return Ok(None);
        }

        let mut record = Record::from_raw(raw);
        for rule in &self.rules {
            match rule.apply(record) {
                Ok(Some(next)) => record = next,
                Ok(None) => {
                    tracing::debug!("Row {} of '{}' dropped by {:?}", row, worksheet, rule);
                    return Ok(None);
                }
                Err(RuleError(message)) => {
                    return Err(SyncError::TransientRecordError {
                        worksheet: worksheet.to_string(),
                        row,
                        message,
                    })
                }
            }
        }
        Ok(Some(record))
    }
}
