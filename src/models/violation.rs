//! Violation record data structure.

use serde::{Deserialize, Serialize};

/// One row of the published violations dataset.
///
/// All fields are opaque strings from the source CSV; `id_poursuite` is the
/// sole identity key and the only field used for equality/diffing. Records
/// are immutable once parsed — a run replaces the whole persisted
/// collection, it never mutates individual rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct Violation {
    /// Unique prosecution identifier (identity key)
    pub id_poursuite: String,

    /// Business identifier of the establishment
    pub business_id: String,

    /// Infraction date
    pub date: String,

    /// Infraction description
    pub description: String,

    /// Street address of the establishment
    pub adresse: String,

    /// Judgment date
    pub date_jugement: String,

    /// Establishment name
    pub etablissement: String,

    /// Fine amount
    pub montant: String,

    /// Owner name
    pub proprietaire: String,

    /// City
    pub ville: String,

    /// Prosecution status
    pub statut: String,

    /// Status date
    pub date_statut: String,

    /// Violation category
    pub categorie: String,
}
