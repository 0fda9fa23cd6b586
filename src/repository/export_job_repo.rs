// ==========================================
// 城镇洪涝暴露统计 - 导出任务台账仓储
// ==========================================
// 职责: 记录每个导出任务的状态（QUEUED/RUNNING/SUCCEEDED/FAILED）
// 用途: 队列准入控制（活跃任务数 vs 上限）、事后查看任务结果
// 红线: Repository 不做业务逻辑，只做数据映射
// ==========================================

use crate::domain::types::ExportJobStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// 导出任务台账记录
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJobRecord {
    pub task_id: String,
    pub description: String,
    pub folder: String,
    pub row_count: i64,
    pub status: ExportJobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub output_path: Option<String>,
    pub error_message: Option<String>,
}

impl ExportJobRecord {
    /// 新建排队中的任务记录
    pub fn queued(task_id: String, description: String, folder: String, row_count: i64) -> Self {
        Self {
            task_id,
            description,
            folder,
            row_count,
            status: ExportJobStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            output_path: None,
            error_message: None,
        }
    }
}

/// 准入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Rejected { active: usize },
}

// ==========================================
// ExportJobRepository
// ==========================================
pub struct ExportJobRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ExportJobRepository {
    /// 创建仓储并确保台账表存在
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS export_job_queue (
                task_id TEXT PRIMARY KEY,
                description TEXT NOT NULL,
                folder TEXT NOT NULL,
                row_count INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'QUEUED',
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                output_path TEXT,
                error_message TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_export_job_status
              ON export_job_queue(status, created_at);
            "#,
        )?;
        Ok(())
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 活跃任务数未达上限时入队（检查与写入在同一事务内）
    pub fn try_enqueue(
        &self,
        record: &ExportJobRecord,
        ceiling: usize,
    ) -> RepositoryResult<Admission> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let active: i64 = tx.query_row(
            "SELECT COUNT(*) FROM export_job_queue WHERE status IN ('QUEUED', 'RUNNING')",
            [],
            |row| row.get(0),
        )?;
        let active = active.max(0) as usize;
        if active >= ceiling {
            return Ok(Admission::Rejected { active });
        }

        tx.execute(
            r#"
            INSERT INTO export_job_queue (
                task_id, description, folder, row_count, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.task_id,
                record.description,
                record.folder,
                record.row_count,
                record.status.as_str(),
                format_ts(&record.created_at),
            ],
        )?;
        tx.commit()?;

        Ok(Admission::Accepted)
    }

    /// QUEUED → RUNNING
    pub fn mark_running(&self, task_id: &str) -> RepositoryResult<()> {
        self.transition(
            task_id,
            ExportJobStatus::Queued,
            ExportJobStatus::Running,
            "UPDATE export_job_queue SET status = 'RUNNING', started_at = ?2 WHERE task_id = ?1 AND status = 'QUEUED'",
            params![task_id, format_ts(&Utc::now())],
        )
    }

    /// RUNNING → SUCCEEDED
    pub fn mark_succeeded(&self, task_id: &str, output_path: &str) -> RepositoryResult<()> {
        self.transition(
            task_id,
            ExportJobStatus::Running,
            ExportJobStatus::Succeeded,
            "UPDATE export_job_queue SET status = 'SUCCEEDED', completed_at = ?2, output_path = ?3 WHERE task_id = ?1 AND status = 'RUNNING'",
            params![task_id, format_ts(&Utc::now()), output_path],
        )
    }

    /// RUNNING → FAILED
    pub fn mark_failed(&self, task_id: &str, error_message: &str) -> RepositoryResult<()> {
        self.transition(
            task_id,
            ExportJobStatus::Running,
            ExportJobStatus::Failed,
            "UPDATE export_job_queue SET status = 'FAILED', completed_at = ?2, error_message = ?3 WHERE task_id = ?1 AND status = 'RUNNING'",
            params![task_id, format_ts(&Utc::now()), error_message],
        )
    }

    /// 将遗留的活跃任务（QUEUED/RUNNING）标记为 FAILED，返回处理条数
    ///
    /// 用于打开台账时清理此前进程中断遗留的任务，避免其占用队列名额
    pub fn fail_interrupted(&self, error_message: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE export_job_queue SET status = 'FAILED', completed_at = ?1, error_message = ?2 WHERE status IN ('QUEUED', 'RUNNING')",
            params![format_ts(&Utc::now()), error_message],
        )?;
        Ok(updated)
    }

    fn transition(
        &self,
        task_id: &str,
        from: ExportJobStatus,
        to: ExportJobStatus,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(sql, params)?;
        if updated == 1 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM export_job_queue WHERE task_id = ?1",
                params![task_id],
                |row| row.get(0),
            )
            .optional()?;

        match current {
            None => Err(RepositoryError::NotFound {
                entity: "export_job".to_string(),
                id: task_id.to_string(),
            }),
            Some(actual) => Err(RepositoryError::InvalidStateTransition {
                from: format!("{} (期望 {})", actual, from.as_str()),
                to: to.as_str().to_string(),
            }),
        }
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find(&self, task_id: &str) -> RepositoryResult<Option<ExportJobRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("{} WHERE task_id = ?1", SELECT_COLUMNS),
                params![task_id],
                map_record,
            )
            .optional()?;
        Ok(record)
    }

    /// 按状态列出任务（按创建时间升序）
    pub fn list_by_status(&self, status: ExportJobStatus) -> RepositoryResult<Vec<ExportJobRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = ?1 ORDER BY created_at, task_id",
            SELECT_COLUMNS
        ))?;
        let rows = stmt.query_map(params![status.as_str()], map_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// 活跃（QUEUED + RUNNING）任务数
    pub fn count_active(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM export_job_queue WHERE status IN ('QUEUED', 'RUNNING')",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }

    /// 各状态任务数
    pub fn count_by_status(&self) -> RepositoryResult<Vec<(ExportJobStatus, usize)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM export_job_queue GROUP BY status ORDER BY status",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = Vec::new();
        for row in rows {
            let (status, count) = row?;
            counts.push((ExportJobStatus::from_str(&status), count.max(0) as usize));
        }
        Ok(counts)
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT task_id, description, folder, row_count, status, created_at,
           started_at, completed_at, output_path, error_message
    FROM export_job_queue"#;

fn map_record(row: &Row<'_>) -> rusqlite::Result<ExportJobRecord> {
    let status: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    let started_at: Option<String> = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;

    Ok(ExportJobRecord {
        task_id: row.get(0)?,
        description: row.get(1)?,
        folder: row.get(2)?,
        row_count: row.get(3)?,
        status: ExportJobStatus::from_str(&status),
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
        started_at: started_at.as_deref().and_then(parse_ts),
        completed_at: completed_at.as_deref().and_then(parse_ts),
        output_path: row.get(8)?,
        error_message: row.get(9)?,
    })
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
