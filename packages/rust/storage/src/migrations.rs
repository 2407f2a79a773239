//! SQL migration definitions for the report database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: reports",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Finished reports. Summary columns are indexed copies of report_json fields.
CREATE TABLE IF NOT EXISTS reports (
    id               TEXT PRIMARY KEY,
    source_url       TEXT NOT NULL,
    company_name     TEXT NOT NULL,
    company_summary  TEXT NOT NULL,
    created_at       TEXT NOT NULL,
    competitor_count INTEGER NOT NULL,
    report_json      TEXT NOT NULL,
    report_sent      INTEGER NOT NULL DEFAULT 0,
    recipient_email  TEXT
);

CREATE INDEX IF NOT EXISTS idx_reports_created_at ON reports(created_at);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
