// src/pipeline/parse.rs

//! Source payload parsing.
//!
//! One pass over the raw CSV text produces the ordered record sequence and
//! the set of identity keys. Parsing is fail-closed: a payload missing a
//! required column or field is rejected whole, since partial ingestion would
//! corrupt the full-snapshot semantics of the persisted dataset.

use std::collections::HashSet;

use crate::error::SchemaError;
use crate::models::Violation;

/// The column contract: every payload must carry these headers.
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "id_poursuite",
    "business_id",
    "date",
    "description",
    "adresse",
    "date_jugement",
    "etablissement",
    "montant",
    "proprietaire",
    "ville",
    "statut",
    "date_statut",
    "categorie",
];

/// Parsed payload: ordered records plus their identity keys.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub records: Vec<Violation>,
    pub ids: HashSet<String>,
}

/// Parse the raw CSV payload into violation records.
///
/// Empty input and header-only input yield an empty outcome, not an error.
pub fn parse_violations(raw: &str) -> Result<ParseOutcome, SchemaError> {
    if raw.trim().is_empty() {
        return Ok(ParseOutcome::default());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());

    // Resolve header indices once; field access below is by position.
    let headers = reader.headers()?.clone();
    let mut columns = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, column) in columns.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h == column)
            .ok_or(SchemaError::MissingColumn { column })?;
    }

    let mut outcome = ParseOutcome::default();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |index: usize| -> Result<String, SchemaError> {
            record
                .get(columns[index])
                .map(str::to_string)
                .ok_or(SchemaError::MissingField {
                    line,
                    column: REQUIRED_COLUMNS[index],
                })
        };

        let violation = Violation {
            id_poursuite: field(0)?,
            business_id: field(1)?,
            date: field(2)?,
            description: field(3)?,
            adresse: field(4)?,
            date_jugement: field(5)?,
            etablissement: field(6)?,
            montant: field(7)?,
            proprietaire: field(8)?,
            ville: field(9)?,
            statut: field(10)?,
            date_statut: field(11)?,
            categorie: field(12)?,
        };

        outcome.ids.insert(violation.id_poursuite.clone());
        outcome.records.push(violation);
    }

    Ok(outcome)
}
