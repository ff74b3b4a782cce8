//! Storage layer for techradar.
//!
//! This module provides `SQLite`-backed document storage for technologies.
//! It offers the primitives the catalog and lifecycle layers build on:
//! unique-constrained insert, filtered find, revision-checked replace,
//! delete by name, and distinct-value aggregation scoped to a filter.

pub mod migrations;
pub mod predicate;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::functions::FunctionFlags;
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::technology::Technology;

pub use predicate::{Facet, Predicate, CONTAINS_CI};

/// Default time a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str =
    "t.id, t.name, t.category, t.stage, t.tags, t.details_page, t.history, t.revision";

/// A technology as persisted, with its row id and revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTechnology {
    /// Row id; defines insertion order.
    pub id: i64,
    /// Write counter used for compare-and-swap updates.
    pub revision: i64,
    /// The document itself.
    pub technology: Technology,
}

/// The keyed document operations the lifecycle layer needs.
///
/// [`Storage`] is the production implementation; the trait exists so
/// read-modify-write logic can be exercised against interleaved writers.
pub trait TechnologyStore {
    /// Insert a new document; [`Error::Conflict`] if the name is taken.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the store fails.
    fn insert(&self, technology: &Technology) -> Result<i64>;

    /// Fetch a document and its revision by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn get(&self, name: &str) -> Result<Option<StoredTechnology>>;

    /// Replace a document if its revision is still `expected_revision`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn replace_if_revision(&self, technology: &Technology, expected_revision: i64)
        -> Result<bool>;

    /// Delete a document by name, reporting whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    fn delete(&self, name: &str) -> Result<bool>;
}

/// Storage engine for technology documents.
///
/// Several `Storage` handles may share one database file; the UNIQUE index
/// on `name` and the `revision` column keep them consistent.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Statements wait up to `busy_timeout` for a locked database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.busy_timeout(busy_timeout)?;
        // WAL lets readers proceed while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let storage = Self::init(path, conn)?;
        info!("Database opened successfully at {}", storage.path.display());
        Ok(storage)
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        Self::init(PathBuf::from(":memory:"), conn)
    }

    fn init(path: PathBuf, conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        migrations::initialize_schema(&conn)?;
        Ok(Self { path, conn })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new technology document.
    ///
    /// Returns the assigned row id. Name uniqueness is decided by the
    /// database constraint, so of two racing inserts exactly one succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] if the name is taken, or a database error.
    pub fn insert(&self, technology: &Technology) -> Result<i64> {
        let tags = serde_json::to_string(&technology.tags)?;
        let history = serde_json::to_string(&technology.history)?;

        let result = self.conn.execute(
            r"
            INSERT INTO technologies (name, category, stage, tags, details_page, history)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
            params![
                technology.name,
                technology.category.as_str(),
                technology.stage.as_str(),
                tags,
                technology.details_page,
                history,
            ],
        );

        match result {
            Ok(_) => {
                let id = self.conn.last_insert_rowid();
                debug!("Inserted technology '{}' with id {}", technology.name, id);
                Ok(id)
            }
            Err(err) if is_unique_violation(&err) => Err(Error::conflict(&technology.name)),
            Err(err) => Err(err.into()),
        }
    }

    /// Get a technology and its revision by exact name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the row is corrupt.
    pub fn get(&self, name: &str) -> Result<Option<StoredTechnology>> {
        let result = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM technologies AS t WHERE t.name = ?1"),
                [name],
                Self::row_to_stored,
            )
            .optional()?;
        Ok(result)
    }

    /// Replace a technology's document if its revision still matches.
    ///
    /// The name is the key and is never changed. Returns `false` when no row
    /// matched, i.e. the technology was deleted or another writer bumped the
    /// revision since `expected_revision` was read.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn replace_if_revision(
        &self,
        technology: &Technology,
        expected_revision: i64,
    ) -> Result<bool> {
        let tags = serde_json::to_string(&technology.tags)?;
        let history = serde_json::to_string(&technology.history)?;

        let affected = self.conn.execute(
            r"
            UPDATE technologies
            SET category = ?1, stage = ?2, tags = ?3, details_page = ?4, history = ?5,
                revision = revision + 1
            WHERE name = ?6 AND revision = ?7
            ",
            params![
                technology.category.as_str(),
                technology.stage.as_str(),
                tags,
                technology.details_page,
                history,
                technology.name,
                expected_revision,
            ],
        )?;

        Ok(affected > 0)
    }

    /// Delete a technology by name.
    ///
    /// Returns `true` if a technology was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM technologies WHERE name = ?1", [name])?;
        Ok(affected > 0)
    }

    /// Count total technologies in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM technologies", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Find technologies matching `predicate`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or a row is corrupt.
    pub fn find(&self, predicate: &Predicate) -> Result<Vec<Technology>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM technologies AS t{} ORDER BY t.id",
            predicate.where_clause()
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let technologies = stmt
            .query_map(params_from_iter(predicate.params()), |row| {
                Self::row_to_stored(row).map(|stored| stored.technology)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(technologies)
    }

    /// Count technologies matching `predicate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_matching(&self, predicate: &Predicate) -> Result<usize> {
        let sql = format!(
            "SELECT COUNT(*) FROM technologies AS t{}",
            predicate.where_clause()
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(predicate.params()), |row| row.get(0))?;
        usize::try_from(count).map_err(|_| Error::internal(format!("negative row count {count}")))
    }

    /// Distinct values of `facet` among technologies matching `predicate`,
    /// sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn distinct(&self, predicate: &Predicate, facet: Facet) -> Result<Vec<String>> {
        let where_clause = predicate.where_clause();
        let sql = match facet {
            Facet::Category => format!(
                "SELECT DISTINCT t.category FROM technologies AS t{where_clause} ORDER BY 1"
            ),
            Facet::Stage => {
                format!("SELECT DISTINCT t.stage FROM technologies AS t{where_clause} ORDER BY 1")
            }
            Facet::Tag => format!(
                "SELECT DISTINCT facet.value FROM technologies AS t, json_each(t.tags) AS facet\
                 {where_clause} ORDER BY 1"
            ),
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map(params_from_iter(predicate.params()), |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(values)
    }

    /// Run `f` inside a read transaction so every query it issues sees the
    /// same snapshot of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction cannot be started, or whatever
    /// `f` returns.
    pub fn read_snapshot<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }

    /// Convert a database row to a stored technology.
    fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredTechnology> {
        let id: i64 = row.get(0)?;
        let name: String = row.get(1)?;
        let category: String = row.get(2)?;
        let stage: String = row.get(3)?;
        let tags: String = row.get(4)?;
        let details_page: Option<String> = row.get(5)?;
        let history: String = row.get(6)?;
        let revision: i64 = row.get(7)?;

        let category = category
            .parse()
            .map_err(|err| conversion_error(2, err))?;
        let stage = stage.parse().map_err(|err| conversion_error(3, err))?;
        let tags = serde_json::from_str(&tags).map_err(|err| conversion_error(4, err))?;
        let history = serde_json::from_str(&history).map_err(|err| conversion_error(6, err))?;

        Ok(StoredTechnology {
            id,
            revision,
            technology: Technology {
                name,
                category,
                stage,
                tags,
                details_page,
                history,
            },
        })
    }
}

impl TechnologyStore for Storage {
    fn insert(&self, technology: &Technology) -> Result<i64> {
        Storage::insert(self, technology)
    }

    fn get(&self, name: &str) -> Result<Option<StoredTechnology>> {
        Storage::get(self, name)
    }

    fn replace_if_revision(
        &self,
        technology: &Technology,
        expected_revision: i64,
    ) -> Result<bool> {
        Storage::replace_if_revision(self, technology, expected_revision)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Storage::delete(self, name)
    }
}

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Register the scalar functions predicates rely on.
///
/// `contains_ci(haystack, needle)` is a Unicode-aware case-insensitive
/// substring test; `NULL` on either side never matches.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        CONTAINS_CI,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(haystack), Some(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            })
        },
    )?;
    Ok(())
}
