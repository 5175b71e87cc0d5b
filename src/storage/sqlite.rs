// src/storage/sqlite.rs

//! SQLite persistence for the violations dataset.
//!
//! `replace_all` implements snapshot-replace semantics: delete-all plus
//! bulk insert inside one transaction, so concurrent readers either see the
//! previous complete dataset or the new one, never a mix. Read queries back
//! the external query surface and acquire their connection per call.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::PersistenceError;
use crate::models::Violation;
use crate::storage::ViolationStore;

/// Search terms shorter than this yield no results.
pub const MIN_SEARCH_CHARS: usize = 3;

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS violations (
    id_poursuite TEXT PRIMARY KEY,
    business_id TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    adresse TEXT NOT NULL,
    date_jugement TEXT NOT NULL,
    etablissement TEXT NOT NULL,
    montant TEXT NOT NULL,
    proprietaire TEXT NOT NULL,
    ville TEXT NOT NULL,
    statut TEXT NOT NULL,
    date_statut TEXT NOT NULL,
    categorie TEXT NOT NULL
)";

const INSERT: &str = "\
INSERT INTO violations (
    id_poursuite, business_id, date, description, adresse,
    date_jugement, etablissement, montant, proprietaire,
    ville, statut, date_statut, categorie
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

/// Searchable columns of the query surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Etablissement,
    Proprietaire,
    Adresse,
}

impl SearchField {
    /// Parse a user-supplied field name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "etablissement" => Some(Self::Etablissement),
            "proprietaire" => Some(Self::Proprietaire),
            "adresse" | "rue" => Some(Self::Adresse),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::Etablissement => "etablissement",
            Self::Proprietaire => "proprietaire",
            Self::Adresse => "adresse",
        }
    }
}

/// An establishment ranked by its violation count.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct EstablishmentCount {
    pub etablissement: String,
    pub total: i64,
}

/// SQLite-backed dataset store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PersistenceError(sqlx::Error::Io(e)))?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory database for tests.
    ///
    /// The pool is capped at one connection: every pooled connection would
    /// otherwise get its own empty `:memory:` database.
    pub async fn in_memory() -> Result<Self, PersistenceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), PersistenceError> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    /// Number of rows in the current snapshot.
    pub async fn count(&self) -> Result<i64, PersistenceError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM violations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Violations whose infraction date falls within `[start, end]`.
    pub async fn by_date_range(
        &self,
        start: &str,
        end: &str,
    ) -> Result<Vec<Violation>, PersistenceError> {
        let rows = sqlx::query_as::<_, Violation>(
            "SELECT * FROM violations WHERE date BETWEEN ? AND ? ORDER BY date",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// One establishment's violations within a period, newest first.
    pub async fn by_establishment(
        &self,
        name: &str,
        start: &str,
        end: &str,
    ) -> Result<Vec<Violation>, PersistenceError> {
        let rows = sqlx::query_as::<_, Violation>(
            "SELECT * FROM violations \
             WHERE etablissement = ? AND date BETWEEN ? AND ? \
             ORDER BY date DESC",
        )
        .bind(name)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Substring search over one column. Terms shorter than
    /// `MIN_SEARCH_CHARS` yield no results.
    pub async fn search(
        &self,
        field: SearchField,
        term: &str,
    ) -> Result<Vec<Violation>, PersistenceError> {
        if term.chars().count() < MIN_SEARCH_CHARS {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT * FROM violations WHERE {} LIKE ? ORDER BY date DESC",
            field.column()
        );
        let rows = sqlx::query_as::<_, Violation>(&sql)
            .bind(format!("%{term}%"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Distinct establishments ranked by violation count, descending.
    pub async fn establishments_by_violation_count(
        &self,
    ) -> Result<Vec<EstablishmentCount>, PersistenceError> {
        let rows = sqlx::query_as::<_, EstablishmentCount>(
            "SELECT etablissement, COUNT(*) AS total FROM violations \
             WHERE etablissement != '' \
             GROUP BY etablissement \
             ORDER BY total DESC, etablissement",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ViolationStore for SqliteStore {
    async fn replace_all(
        &self,
        records: &[Violation],
    ) -> std::result::Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM violations")
            .execute(&mut *tx)
            .await?;

        for v in records {
            sqlx::query(INSERT)
                .bind(&v.id_poursuite)
                .bind(&v.business_id)
                .bind(&v.date)
                .bind(&v.description)
                .bind(&v.adresse)
                .bind(&v.date_jugement)
                .bind(&v.etablissement)
                .bind(&v.montant)
                .bind(&v.proprietaire)
                .bind(&v.ville)
                .bind(&v.statut)
                .bind(&v.date_statut)
                .bind(&v.categorie)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        log::debug!("Dataset replaced: {} rows", records.len());
        Ok(())
    }
}
