//! Header and row validation against a transaction type's field schema.

use crate::parser::ParsedRow;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Columns that must parse as numbers when non-empty.
const NUMERIC_FIELDS: [&str; 3] = ["Bedrooms", "Bathrooms", "Unit Size"];

/// Column holding the listing availability date.
const DATE_FIELD: &str = "Available From";

static DATE_RE: OnceLock<Regex> = OnceLock::new();

/// Lexical YYYY-MM-DD check only, so `2024-13-99` passes. Calendar validity
/// is not checked.
fn date_re() -> &'static Regex {
    DATE_RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"))
}

/// Category of a per-row validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingFields,
    ExtraFields,
    InvalidFormat,
    /// Flattened from the listings API validate-only response.
    #[serde(rename = "validation_error")]
    Remote,
}

/// One error entry for one row. A row accumulates one entry per violated
/// rule category, except format errors which are emitted per offending field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub row_number: usize,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
}

/// Schema columns that do not appear verbatim in `headers`.
/// Matching is case-sensitive and exact; a non-empty result means the file
/// was not produced from the expected template.
pub fn validate_headers(headers: &[String], schema: &[&str]) -> Vec<String> {
    schema
        .iter()
        .filter(|field| !headers.iter().any(|h| h == *field))
        .map(|field| field.to_string())
        .collect()
}

/// Loose numeric predicate: whitespace-tolerant, accepts decimals, rejects
/// anything `f64` cannot parse to a finite value (so `inf`/`nan` fail too).
/// Empty values are the missing-field rule's business, not this one's.
fn is_numeric(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Validate a single row against the schema. Rules are evaluated
/// independently, in order: missing required fields, unknown extra fields,
/// numeric columns, the price column, then the availability date.
pub fn validate_row(row: &ParsedRow, schema: &[&str]) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let missing: Vec<String> = schema
        .iter()
        .filter(|field| row.get(field).map_or(true, |v| v.trim().is_empty()))
        .map(|field| field.to_string())
        .collect();
    if !missing.is_empty() {
        errors.push(ValidationError {
            row_number: row.row_number,
            kind: ErrorKind::MissingFields,
            message: format!("Missing required fields: {}", missing.join(", ")),
            fields: missing,
        });
    }

    let extra: Vec<String> = row
        .data
        .iter()
        .filter(|(name, _)| !schema.contains(&name.as_str()))
        .map(|(name, _)| name.clone())
        .collect();
    if !extra.is_empty() {
        errors.push(ValidationError {
            row_number: row.row_number,
            kind: ErrorKind::ExtraFields,
            message: format!("Unknown fields: {}", extra.join(", ")),
            fields: extra,
        });
    }

    for field in NUMERIC_FIELDS {
        if !schema.contains(&field) {
            continue;
        }
        if let Some(value) = row.get(field) {
            if !value.trim().is_empty() && !is_numeric(value) {
                errors.push(ValidationError {
                    row_number: row.row_number,
                    kind: ErrorKind::InvalidFormat,
                    message: format!("{} must be a number", field),
                    fields: vec![field.to_string()],
                });
            }
        }
    }

    // Exactly one column per schema carries "Price" in its name
    if let Some(price_field) = schema.iter().find(|field| field.contains("Price")) {
        if let Some(value) = row.get(price_field) {
            if !value.trim().is_empty() && !is_numeric(value) {
                errors.push(ValidationError {
                    row_number: row.row_number,
                    kind: ErrorKind::InvalidFormat,
                    message: format!("{} must be a number", price_field),
                    fields: vec![price_field.to_string()],
                });
            }
        }
    }

    if schema.contains(&DATE_FIELD) {
        if let Some(value) = row.get(DATE_FIELD) {
            let trimmed = value.trim();
            if !trimmed.is_empty() && !date_re().is_match(trimmed) {
                errors.push(ValidationError {
                    row_number: row.row_number,
                    kind: ErrorKind::InvalidFormat,
                    message: format!("{} must be in YYYY-MM-DD format", DATE_FIELD),
                    fields: vec![DATE_FIELD.to_string()],
                });
            }
        }
    }

    errors
}
