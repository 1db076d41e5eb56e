use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use tracing::debug;

use crate::parser::tasks::{TaskRecord, TaskStatus};

pub const DB_PATH_ENV: &str = "WORKLOG_DB_PATH";

/// Database location: `WORKLOG_DB_PATH` when set, else the configured path.
pub fn path(configured: &str) -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(configured))
}

/// Receives finished task records.
pub trait TaskSink {
    fn accept(&mut self, record: &TaskRecord) -> Result<()>;

    fn accept_all(&mut self, records: &[TaskRecord]) -> Result<usize> {
        for r in records {
            self.accept(r)?;
        }
        Ok(records.len())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating database directory {}", dir.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("opening {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn save_tasks(&mut self, records: &[TaskRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(UPSERT)?;
            for r in records {
                count += stmt.execute(rusqlite::params![
                    r.member_name,
                    r.work_date.to_string(),
                    r.project_name.as_deref().unwrap_or(""),
                    r.content,
                    r.progress_percent,
                    r.status.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        debug!(records = count, "tasks saved");
        Ok(count)
    }

    /// Stored records with `from <= work_date <= to`, oldest first.
    pub fn fetch_tasks(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<TaskRecord>> {
        let from = from.map(|d| d.to_string()).unwrap_or_else(|| "0000-01-01".to_string());
        let to = to.map(|d| d.to_string()).unwrap_or_else(|| "9999-12-31".to_string());
        let mut stmt = self.conn.prepare(
            "SELECT member_name, work_date, project_name, content, progress_percent, status
             FROM daily_tasks
             WHERE work_date BETWEEN ?1 AND ?2
             ORDER BY work_date, member_name, project_name",
        )?;
        let rows = stmt
            .query_map(rusqlite::params![from, to], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u8>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(member_name, date, project, content, progress_percent, status)| -> Result<TaskRecord> {
                Ok(TaskRecord {
                    member_name,
                    work_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                        .with_context(|| format!("bad stored date {date:?}"))?,
                    project_name: (!project.is_empty()).then_some(project),
                    content,
                    progress_percent,
                    status: status.parse::<TaskStatus>().map_err(anyhow::Error::msg)?,
                })
            })
            .collect()
    }

    pub fn count(&self) -> Result<usize> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM daily_tasks", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl TaskSink for SqliteStore {
    fn accept(&mut self, record: &TaskRecord) -> Result<()> {
        self.save_tasks(std::slice::from_ref(record))?;
        Ok(())
    }

    fn accept_all(&mut self, records: &[TaskRecord]) -> Result<usize> {
        self.save_tasks(records)
    }
}

const UPSERT: &str = "INSERT INTO daily_tasks
     (member_name, work_date, project_name, content, progress_percent, status)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(member_name, work_date, project_name) DO UPDATE SET
        content = excluded.content,
        progress_percent = excluded.progress_percent,
        status = excluded.status,
        updated_at = datetime('now')";

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS daily_tasks (
            id               INTEGER PRIMARY KEY,
            member_name      TEXT NOT NULL,
            work_date        TEXT NOT NULL,
            project_name     TEXT NOT NULL DEFAULT '',
            content          TEXT NOT NULL,
            progress_percent INTEGER NOT NULL DEFAULT 0 CHECK(progress_percent BETWEEN 0 AND 100),
            status           TEXT NOT NULL DEFAULT '진행중' CHECK(status IN ('완료','진행중','대기')),
            created_at       TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at       TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(member_name, work_date, project_name)
        );
        CREATE INDEX IF NOT EXISTS idx_daily_tasks_date ON daily_tasks(work_date);
        CREATE INDEX IF NOT EXISTS idx_daily_tasks_member ON daily_tasks(member_name);
        ",
    )?;
    Ok(())
}
