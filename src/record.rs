//! Cleaning of single metadata records: Ct normalization, zero suppression
//! and selection of the combined Ct.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::ct;
use crate::models::{AssayPanel, Record};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CleanError {
    /// An assay column of the panel is not part of the record
    #[error("record has no '{field}' field")]
    MissingField { field: String },
}

type Result<T> = std::result::Result<T, CleanError>;

/// Returns true for degenerate readings, `0` or `0.0`, `0.00`, ...
fn is_zero(value: &str) -> bool {
    lazy_static! {
        static ref RE_ZERO: Regex = Regex::new(r"^0(?:\.0+)?$").unwrap();
    }
    RE_ZERO.is_match(value)
}

fn field_mut<'a>(record: &'a mut Record, field: &str) -> Result<&'a mut String> {
    record.get_mut(field).ok_or_else(|| CleanError::MissingField {
        field: field.to_string(),
    })
}

/// Replaces every `0`/`0.0...` assay value with the empty string
pub fn remove_zero_cts(record: &mut Record, panel: &AssayPanel) -> Result<()> {
    for field in &panel.priority {
        let value = field_mut(record, field)?;
        if is_zero(value) {
            value.clear();
        }
    }
    Ok(())
}

/// Picks the first non-empty assay value in panel priority order
pub fn choose_ct(record: &Record, panel: &AssayPanel) -> String {
    panel
        .priority
        .iter()
        .filter_map(|f| record.get(f))
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Cleans a metadata record.
///
/// Drops the blank-named column, trims all values, normalizes the panel's
/// assay values, suppresses zero readings and sets the combined Ct column.
/// Fails if the record lacks one of the panel's assay columns.
pub fn clean(mut record: Record, panel: &AssayPanel) -> Result<Record> {
    record.remove("");

    for value in record.values_mut() {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
    }

    for field in &panel.priority {
        let value = field_mut(&mut record, field)?;
        let outcome = ct::classify(value.as_str());
        let cleaned = match outcome {
            ct::Outcome::Clean => continue,
            ct::Outcome::Unrecognized => {
                if !value.is_empty() {
                    warn!("{}: unrecognized Ct value '{}', needs manual review", field, value);
                }
                continue;
            }
            ct::Outcome::Extracted { value: v, .. } => v.to_string(),
            ct::Outcome::Discarded { .. } => String::new(),
        };
        trace!("{}: '{}' -> '{}' ({})", field, value, cleaned, outcome.rule());
        *value = cleaned;
    }

    // must come after normalization, which can surface a bare "0"
    remove_zero_cts(&mut record, panel)?;

    let combo = choose_ct(&record, panel);
    record.insert(panel.combo_field.clone(), combo);

    Ok(record)
}
