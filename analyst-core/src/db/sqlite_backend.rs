//! SQLite database storage backend
//!
//! This backend stores tracker data in a SQLite database file, with one
//! table per record kind so single-row operations don't rewrite the
//! whole dataset.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::traits::{BackendType, DatabaseBackend};
use crate::models::{
    Analyst, AnalystChanges, Interaction, InteractionType, NewAnalyst, NewInteraction,
    NewReportMention, ReportMention, Tier, TrackerStore,
};

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ANALYST_COLUMNS: &str =
    "id, name, firm, tier, sentiment_score, last_contact_date, created_at";
const INTERACTION_COLUMNS: &str = "id, analyst_id, date, type, notes, created_at";
const REPORT_COLUMNS: &str = "id, analyst_id, title, report_date, url, summary, created_at";

/// SQLite backend implementation
pub struct SqliteBackend {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Creates a new SQLite backend
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open SQLite database {:?}", path))?;

        // WAL mode for better concurrent access
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let backend = Self {
            path,
            conn: Mutex::new(conn),
        };

        backend.init_schema()?;
        Ok(backend)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection mutex poisoned"))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        let has_version_table: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master \
             WHERE type = 'table' AND name = 'schema_version')",
            [],
            |row| row.get(0),
        )?;
        let current_version = if has_version_table {
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get::<_, Option<i32>>(0)
            })?
            .unwrap_or(0)
        } else {
            0
        };

        if current_version == 0 {
            log::debug!("creating schema v{} in {:?}", SCHEMA_VERSION, self.path);
            conn.execute_batch(include_str!("schema.sql"))?;
        } else if current_version < SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is outdated, expected {}",
                current_version,
                SCHEMA_VERSION
            );
        } else if current_version > SCHEMA_VERSION {
            anyhow::bail!(
                "Database schema version {} is newer than this build supports ({})",
                current_version,
                SCHEMA_VERSION
            );
        }

        Ok(())
    }

    fn parse_uuid(s: &str) -> Result<Uuid> {
        Uuid::parse_str(s).with_context(|| format!("Invalid UUID in database: {}", s))
    }

    fn parse_date(s: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .with_context(|| format!("Invalid date in database: {}", s))
    }

    fn parse_timestamp(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn format_date(date: &NaiveDate) -> String {
        date.format(DATE_FORMAT).to_string()
    }

    fn interaction_type_from_str(s: &str) -> InteractionType {
        InteractionType::parse(s).unwrap_or_default()
    }

    fn analyst_from_row(row: &Row<'_>) -> rusqlite::Result<AnalystRow> {
        Ok(AnalystRow {
            id: row.get(0)?,
            name: row.get(1)?,
            firm: row.get(2)?,
            tier: row.get(3)?,
            sentiment_score: row.get(4)?,
            last_contact_date: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn interaction_from_row(row: &Row<'_>) -> rusqlite::Result<InteractionRow> {
        Ok(InteractionRow {
            id: row.get(0)?,
            analyst_id: row.get(1)?,
            date: row.get(2)?,
            interaction_type: row.get(3)?,
            notes: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
        Ok(ReportRow {
            id: row.get(0)?,
            analyst_id: row.get(1)?,
            title: row.get(2)?,
            report_date: row.get(3)?,
            url: row.get(4)?,
            summary: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn query_analysts(
        conn: &Connection,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Analyst>> {
        let sql = format!(
            "SELECT {} FROM analysts {} ORDER BY rowid",
            ANALYST_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(args, Self::analyst_from_row)?;
        rows.map(|row| row?.into_model()).collect()
    }

    fn query_interactions(
        conn: &Connection,
        analyst_id: Option<&Uuid>,
    ) -> Result<Vec<Interaction>> {
        let rows = match analyst_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM interactions WHERE analyst_id = ?1 ORDER BY date DESC, rowid",
                    INTERACTION_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([id.to_string()], Self::interaction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM interactions ORDER BY rowid",
                    INTERACTION_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], Self::interaction_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(InteractionRow::into_model).collect()
    }

    fn query_reports(conn: &Connection, analyst_id: Option<&Uuid>) -> Result<Vec<ReportMention>> {
        let rows = match analyst_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM reports WHERE analyst_id = ?1 ORDER BY report_date DESC, rowid",
                    REPORT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([id.to_string()], Self::report_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!("SELECT {} FROM reports ORDER BY rowid", REPORT_COLUMNS);
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], Self::report_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };
        rows.into_iter().map(ReportRow::into_model).collect()
    }

    /// Save an analyst to the database
    fn save_analyst(conn: &Connection, analyst: &Analyst) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO analysts
             (id, name, firm, tier, sentiment_score, last_contact_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                analyst.id.to_string(),
                analyst.name,
                analyst.firm,
                analyst.tier.as_str(),
                analyst.sentiment_score,
                analyst.last_contact_date.as_ref().map(Self::format_date),
                analyst.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Save an interaction to the database
    fn save_interaction(conn: &Connection, interaction: &Interaction) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO interactions (id, analyst_id, date, type, notes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                interaction.id.to_string(),
                interaction.analyst_id.to_string(),
                Self::format_date(&interaction.date),
                interaction.interaction_type.to_string(),
                interaction.notes,
                interaction.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Save a report mention to the database
    fn save_report(conn: &Connection, report: &ReportMention) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO reports
             (id, analyst_id, title, report_date, url, summary, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                report.id.to_string(),
                report.analyst_id.to_string(),
                report.title,
                Self::format_date(&report.report_date),
                report.url,
                report.summary,
                report.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

struct AnalystRow {
    id: String,
    name: String,
    firm: String,
    tier: String,
    sentiment_score: i32,
    last_contact_date: Option<String>,
    created_at: String,
}

impl AnalystRow {
    fn into_model(self) -> Result<Analyst> {
        Ok(Analyst {
            id: SqliteBackend::parse_uuid(&self.id)?,
            name: self.name,
            firm: self.firm,
            tier: Tier::from_label(&self.tier),
            sentiment_score: self.sentiment_score,
            last_contact_date: self
                .last_contact_date
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(SqliteBackend::parse_date)
                .transpose()?,
            created_at: SqliteBackend::parse_timestamp(&self.created_at),
        })
    }
}

struct InteractionRow {
    id: String,
    analyst_id: String,
    date: String,
    interaction_type: String,
    notes: String,
    created_at: String,
}

impl InteractionRow {
    fn into_model(self) -> Result<Interaction> {
        Ok(Interaction {
            id: SqliteBackend::parse_uuid(&self.id)?,
            analyst_id: SqliteBackend::parse_uuid(&self.analyst_id)?,
            date: SqliteBackend::parse_date(&self.date)?,
            interaction_type: SqliteBackend::interaction_type_from_str(&self.interaction_type),
            notes: self.notes,
            created_at: SqliteBackend::parse_timestamp(&self.created_at),
        })
    }
}

struct ReportRow {
    id: String,
    analyst_id: String,
    title: String,
    report_date: String,
    url: Option<String>,
    summary: Option<String>,
    created_at: String,
}

impl ReportRow {
    fn into_model(self) -> Result<ReportMention> {
        Ok(ReportMention {
            id: SqliteBackend::parse_uuid(&self.id)?,
            analyst_id: SqliteBackend::parse_uuid(&self.analyst_id)?,
            title: self.title,
            report_date: SqliteBackend::parse_date(&self.report_date)?,
            url: self.url,
            summary: self.summary,
            created_at: SqliteBackend::parse_timestamp(&self.created_at),
        })
    }
}

impl DatabaseBackend for SqliteBackend {
    fn backend_type(&self) -> BackendType {
        BackendType::Sqlite
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<TrackerStore> {
        let conn = self.conn()?;

        let name: String = conn
            .query_row("SELECT name FROM metadata WHERE id = 1", [], |row| row.get(0))
            .optional()?
            .unwrap_or_default();

        Ok(TrackerStore {
            name,
            analysts: Self::query_analysts(&conn, "", &[])?,
            interactions: Self::query_interactions(&conn, None)?,
            report_mentions: Self::query_reports(&conn, None)?,
        })
    }

    fn save(&self, store: &TrackerStore) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM analysts", [])?;
        tx.execute("DELETE FROM interactions", [])?;
        tx.execute("DELETE FROM reports", [])?;

        for analyst in &store.analysts {
            Self::save_analyst(&tx, analyst)?;
        }
        for interaction in &store.interactions {
            Self::save_interaction(&tx, interaction)?;
        }
        for report in &store.report_mentions {
            Self::save_report(&tx, report)?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO metadata (id, name) VALUES (1, ?1)",
            params![store.name],
        )?;

        tx.commit()?;
        Ok(())
    }

    // Overrides for single-row operations

    fn list_analysts(&self) -> Result<Vec<Analyst>> {
        let conn = self.conn()?;
        Self::query_analysts(&conn, "", &[])
    }

    fn get_analyst(&self, id: &Uuid) -> Result<Option<Analyst>> {
        let conn = self.conn()?;
        let id = id.to_string();
        let mut found = Self::query_analysts(&conn, "WHERE id = ?1", &[&id])?;
        Ok(found.pop())
    }

    fn insert_analyst(&self, fields: NewAnalyst) -> Result<Uuid> {
        let conn = self.conn()?;
        let analyst = Analyst::from_new(fields);
        Self::save_analyst(&conn, &analyst)?;
        Ok(analyst.id)
    }

    fn update_analyst(&self, id: &Uuid, changes: &AnalystChanges) -> Result<()> {
        let conn = self.conn()?;
        let id_str = id.to_string();
        let mut analyst = Self::query_analysts(&conn, "WHERE id = ?1", &[&id_str])?
            .pop()
            .with_context(|| format!("Analyst not found: {}", id))?;
        analyst.apply(changes);
        conn.execute(
            "UPDATE analysts
             SET name = ?2, firm = ?3, tier = ?4, sentiment_score = ?5, last_contact_date = ?6
             WHERE id = ?1",
            params![
                id_str,
                analyst.name,
                analyst.firm,
                analyst.tier.as_str(),
                analyst.sentiment_score,
                analyst.last_contact_date.as_ref().map(Self::format_date),
            ],
        )?;
        Ok(())
    }

    fn delete_analyst(&self, id: &Uuid) -> Result<()> {
        let conn = self.conn()?;
        let rows_affected = conn.execute("DELETE FROM analysts WHERE id = ?1", [id.to_string()])?;
        if rows_affected == 0 {
            anyhow::bail!("Analyst not found: {}", id)
        }
        Ok(())
    }

    fn list_interactions(&self, analyst_id: &Uuid) -> Result<Vec<Interaction>> {
        let conn = self.conn()?;
        Self::query_interactions(&conn, Some(analyst_id))
    }

    fn insert_interaction(&self, fields: NewInteraction) -> Result<Uuid> {
        let conn = self.conn()?;
        let interaction = Interaction::from_new(fields);
        Self::save_interaction(&conn, &interaction)?;
        Ok(interaction.id)
    }

    fn delete_interactions_for(&self, analyst_id: &Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM interactions WHERE analyst_id = ?1",
            [analyst_id.to_string()],
        )?;
        Ok(removed)
    }

    fn list_report_mentions(&self, analyst_id: &Uuid) -> Result<Vec<ReportMention>> {
        let conn = self.conn()?;
        Self::query_reports(&conn, Some(analyst_id))
    }

    fn insert_report_mention(&self, fields: NewReportMention) -> Result<Uuid> {
        let conn = self.conn()?;
        let report = ReportMention::from_new(fields);
        Self::save_report(&conn, &report)?;
        Ok(report.id)
    }

    fn delete_report_mentions_for(&self, analyst_id: &Uuid) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM reports WHERE analyst_id = ?1",
            [analyst_id.to_string()],
        )?;
        Ok(removed)
    }

    fn count_children(&self, analyst_id: &Uuid) -> Result<(usize, usize)> {
        let conn = self.conn()?;
        let id = analyst_id.to_string();
        let interactions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM interactions WHERE analyst_id = ?1",
            [&id],
            |row| row.get(0),
        )?;
        let reports: i64 = conn.query_row(
            "SELECT COUNT(*) FROM reports WHERE analyst_id = ?1",
            [&id],
            |row| row.get(0),
        )?;
        Ok((interactions as usize, reports as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_sqlite_backend_create_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        backend.create_if_not_exists().unwrap();

        let store = backend.load().unwrap();
        assert!(store.analysts.is_empty());
        assert!(store.report_mentions.is_empty());
    }

    #[test]
    fn test_sqlite_backend_reopen_keeps_schema() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        {
            let backend = SqliteBackend::new(temp_file.path()).unwrap();
            backend
                .insert_analyst(NewAnalyst::new("Jane Doe", "Gartner"))
                .unwrap();
        }
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        assert_eq!(backend.list_analysts().unwrap().len(), 1);

        let versions: i64 = backend
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_sqlite_rejects_newer_schema() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        {
            let backend = SqliteBackend::new(temp_file.path()).unwrap();
            backend
                .conn()
                .unwrap()
                .execute("UPDATE schema_version SET version = ?1", [SCHEMA_VERSION + 1])
                .unwrap();
        }

        let err = SqliteBackend::new(temp_file.path()).err().unwrap();
        assert!(err.to_string().contains("newer"));
    }

    #[test]
    fn test_sqlite_stored_tier_read_exactly() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        let id = Uuid::new_v4();
        backend
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO analysts (id, name, firm, tier, sentiment_score, created_at)
                 VALUES (?1, 'Jane Doe', 'Gartner', 'tier1', 5, ?2)",
                params![id.to_string(), Utc::now().to_rfc3339()],
            )
            .unwrap();

        let analyst = backend.get_analyst(&id).unwrap().unwrap();
        assert_eq!(analyst.tier, Tier::Unrecognized("tier1".to_string()));
    }

    #[test]
    fn test_sqlite_backend_save_and_load() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let mut store = TrackerStore::new();
        store.name = "AR Program".to_string();
        store.analysts.push(Analyst::from_new(
            NewAnalyst::new("Sam Lee", "IDC")
                .with_tier(Tier::Unrecognized("Watchlist".to_string()))
                .with_last_contact(date(2024, 2, 29)),
        ));
        backend.save(&store).unwrap();

        let loaded = backend.load().unwrap();
        assert_eq!(loaded.name, "AR Program");
        assert_eq!(loaded.analysts.len(), 1);
        assert_eq!(loaded.analysts[0].tier.as_str(), "Watchlist");
        assert_eq!(loaded.analysts[0].last_contact_date, Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_sqlite_backend_analyst_crud() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();

        let id = backend
            .insert_analyst(NewAnalyst::new("Jane Doe", "Gartner"))
            .unwrap();
        let loaded = backend.get_analyst(&id).unwrap();
        assert_eq!(loaded.unwrap().name, "Jane Doe");

        backend
            .update_analyst(&id, &AnalystChanges::last_contact(date(2024, 1, 5)))
            .unwrap();
        let updated = backend.get_analyst(&id).unwrap().unwrap();
        assert_eq!(updated.last_contact_date, Some(date(2024, 1, 5)));
        assert_eq!(updated.firm, "Gartner");

        assert!(backend
            .update_analyst(&Uuid::new_v4(), &AnalystChanges::default())
            .is_err());

        backend.delete_analyst(&id).unwrap();
        assert!(backend.get_analyst(&id).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_children_ordered_and_not_cascaded() {
        let temp_file = NamedTempFile::with_suffix(".db").unwrap();
        let backend = SqliteBackend::new(temp_file.path()).unwrap();
        let id = backend
            .insert_analyst(NewAnalyst::new("Jane Doe", "Gartner"))
            .unwrap();

        for day in [3, 17, 9] {
            backend
                .insert_interaction(NewInteraction {
                    analyst_id: id,
                    date: date(2024, 4, day),
                    interaction_type: InteractionType::Email,
                    notes: format!("note {}", day),
                })
                .unwrap();
        }
        backend
            .insert_report_mention(NewReportMention {
                analyst_id: id,
                title: "Wave Report".to_string(),
                report_date: date(2024, 5, 1),
                url: None,
                summary: Some("Named a leader".to_string()),
            })
            .unwrap();

        let dates: Vec<NaiveDate> = backend
            .list_interactions(&id)
            .unwrap()
            .into_iter()
            .map(|i| i.date)
            .collect();
        assert_eq!(dates, vec![date(2024, 4, 17), date(2024, 4, 9), date(2024, 4, 3)]);
        assert_eq!(backend.count_children(&id).unwrap(), (3, 1));

        backend.delete_analyst(&id).unwrap();
        assert_eq!(backend.count_children(&id).unwrap(), (3, 1));

        assert_eq!(backend.delete_interactions_for(&id).unwrap(), 3);
        assert_eq!(backend.delete_report_mentions_for(&id).unwrap(), 1);
        assert_eq!(backend.count_children(&id).unwrap(), (0, 0));
    }
}
