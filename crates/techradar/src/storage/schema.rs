//! `SQLite` schema definitions for techradar.
//!
//! Each row of `technologies` is one technology document. Scalar fields the
//! catalog filters on are plain columns; `tags` and `history` are stored as
//! JSON text so they stay embedded in the document.

/// SQL statement to create the technologies table.
///
/// `name` carries the UNIQUE constraint that arbitrates concurrent creates,
/// and `revision` is bumped on every write for optimistic concurrency.
pub const CREATE_TECHNOLOGIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS technologies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    category TEXT NOT NULL,
    stage TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    details_page TEXT,
    history TEXT NOT NULL,
    revision INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// SQL statement to create an index on `category` for filtering.
pub const CREATE_CATEGORY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_technologies_category ON technologies(category)
";

/// SQL statement to create an index on `stage` for filtering.
pub const CREATE_STAGE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_technologies_stage ON technologies(stage)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_TECHNOLOGIES_TABLE,
    CREATE_CATEGORY_INDEX,
    CREATE_STAGE_INDEX,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.is_empty());
        }
    }

    #[test]
    fn test_technologies_table_enforces_unique_name() {
        assert!(CREATE_TECHNOLOGIES_TABLE.contains("name TEXT NOT NULL UNIQUE"));
        assert!(CREATE_TECHNOLOGIES_TABLE.contains("revision INTEGER NOT NULL"));
        assert!(CREATE_TECHNOLOGIES_TABLE.contains("history TEXT NOT NULL"));
    }

    #[test]
    fn test_create_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
        assert!(CREATE_METADATA_TABLE.contains("value TEXT NOT NULL"));
    }
}
