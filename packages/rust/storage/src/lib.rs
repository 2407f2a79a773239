//! libSQL storage layer for finished reports.
//!
//! The [`Storage`] struct wraps a local libSQL database. Each report is stored
//! as its full JSON serialization next to a handful of summary columns used by
//! the history listing, so a stored report round-trips losslessly.

mod migrations;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tracing::{debug, instrument};

use compintel_shared::{CompintelError, Report, ReportId, ReportStore, ReportSummary, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> CompintelError {
    CompintelError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompintelError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompintelError::Storage(format!(
                "database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CompintelError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(CompintelError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Report operations
    // -----------------------------------------------------------------------

    /// Insert a finished report.
    #[instrument(skip_all, fields(report_id = %report.id, company = %report.company_name))]
    pub async fn insert_report(&self, report: &Report) -> Result<ReportId> {
        self.check_writable()?;

        let report_json = serde_json::to_string(report)
            .map_err(|e| CompintelError::Storage(format!("failed to serialize report: {e}")))?;
        let id = report.id.to_string();
        let created_at = report
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true);

        self.conn
            .execute(
                "INSERT INTO reports (id, source_url, company_name, company_summary, created_at,
                                      competitor_count, report_json, report_sent, recipient_email)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id.as_str(),
                    report.source_url.as_str(),
                    report.company_name.as_str(),
                    report.company_summary.as_str(),
                    created_at.as_str(),
                    report.competitors.len() as i64,
                    report_json.as_str(),
                    i64::from(report.report_sent),
                    report.recipient_email.as_deref()
                ],
            )
            .await
            .map_err(storage_err)?;

        debug!("report stored");
        Ok(report.id.clone())
    }

    /// Flag a report as emailed to `email`. Repeating the call is harmless.
    pub async fn update_report_sent(&self, id: &ReportId, email: &str) -> Result<()> {
        self.check_writable()?;

        let updated = self
            .conn
            .execute(
                "UPDATE reports SET report_sent = 1, recipient_email = ?2 WHERE id = ?1",
                params![id.to_string(), email],
            )
            .await
            .map_err(storage_err)?;

        if updated == 0 {
            return Err(CompintelError::Storage(format!("report {id} not found")));
        }
        Ok(())
    }

    /// Load one report by ID.
    pub async fn get_report(&self, id: &ReportId) -> Result<Option<Report>> {
        let mut rows = self
            .conn
            .query(
                "SELECT report_json, report_sent, recipient_email FROM reports WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };

        let report_json = row.get::<String>(0).map_err(storage_err)?;
        let mut report: Report = serde_json::from_str(&report_json)
            .map_err(|e| CompintelError::Storage(format!("corrupt report {id}: {e}")))?;

        // The sent flag is only ever updated in its column.
        report.report_sent = row.get::<i64>(1).map_err(storage_err)? != 0;
        report.recipient_email = row.get::<String>(2).ok();

        Ok(Some(report))
    }

    /// List the most recent reports, newest first.
    pub async fn list_reports(&self, limit: usize) -> Result<Vec<ReportSummary>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, company_name, source_url, created_at, competitor_count, report_sent
                 FROM reports ORDER BY created_at DESC, id DESC LIMIT ?1",
                params![limit as i64],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id: String = row.get(0).map_err(storage_err)?;
            let created_at: String = row.get(3).map_err(storage_err)?;

            results.push(ReportSummary {
                id: id
                    .parse()
                    .map_err(|e| CompintelError::Storage(format!("bad report id {id}: {e}")))?,
                company_name: row.get(1).map_err(storage_err)?,
                source_url: row.get(2).map_err(storage_err)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| CompintelError::Storage(format!("bad timestamp: {e}")))?
                    .with_timezone(&Utc),
                competitor_count: row.get::<i64>(4).map_err(storage_err)?.max(0) as usize,
                report_sent: row.get::<i64>(5).map_err(storage_err)? != 0,
            });
        }
        Ok(results)
    }

    /// Delete every stored report, returning how many were removed.
    pub async fn delete_all_reports(&self) -> Result<u64> {
        self.check_writable()?;
        self.conn
            .execute("DELETE FROM reports", params![])
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl ReportStore for Storage {
    async fn save(&self, report: &Report) -> Result<ReportId> {
        self.insert_report(report).await
    }

    async fn mark_sent(&self, id: &ReportId, email: &str) -> Result<()> {
        self.update_report_sent(id, email).await
    }

    async fn get(&self, id: &ReportId) -> Result<Option<Report>> {
        self.get_report(id).await
    }

    async fn list(&self, limit: usize) -> Result<Vec<ReportSummary>> {
        self.list_reports(limit).await
    }

    async fn delete_all(&self) -> Result<u64> {
        self.delete_all_reports().await
    }
}
