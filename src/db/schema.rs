//! Database schema and migrations.
//!
//! Migrations are applied in order the first time the database is opened or
//! upgraded. The `schema_version` table records which have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: file registry
    r#"
CREATE TABLE files (
    seq             INTEGER PRIMARY KEY AUTOINCREMENT,
    id              TEXT NOT NULL UNIQUE,       -- FileId, also the blob key
    name            TEXT NOT NULL,
    size            INTEGER NOT NULL,
    content_type    TEXT NOT NULL,
    upload_time     TEXT NOT NULL,              -- RFC 3339, UTC
    expiry_time     TEXT,                       -- NULL = never expires
    password_hash   TEXT                        -- Argon2 PHC string, NULL = public
);

CREATE INDEX idx_files_expiry_time ON files(expiry_time) WHERE expiry_time IS NOT NULL;
"#,
];
