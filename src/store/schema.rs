//! SQL DDL for initializing the secondary collection store.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `collections`: one row per record, keyed by `(entity, record_id)`, body
///   stored as serialized JSON, `position` preserving collection order
/// - `collection_marks`: one row per entity that has ever been written, so an
///   empty collection is distinguishable from one that was never saved
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    entity TEXT NOT NULL,
    record_id TEXT NOT NULL,
    body TEXT NOT NULL, -- JSON document, serialized as text
    position INTEGER NOT NULL,
    PRIMARY KEY (entity, record_id)
);

CREATE INDEX IF NOT EXISTS idx_collections_entity_position
    ON collections(entity, position);

CREATE TABLE IF NOT EXISTS collection_marks (
    entity TEXT PRIMARY KEY,
    written_at TEXT NOT NULL -- RFC3339
);
"#;
