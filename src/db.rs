// ==========================================
// 城镇洪涝暴露统计 - SQLite 连接初始化
// ==========================================
// 目标:
// - 导出任务台账的所有连接使用同一套 PRAGMA
// - 统一 busy_timeout，导出 worker 与提交方同时写入时减少 busy 错误
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 内存数据库路径
pub const IN_MEMORY: &str = ":memory:";

/// 配置 SQLite 连接的统一 PRAGMA
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = if db_path == IN_MEMORY {
        Connection::open_in_memory()?
    } else {
        Connection::open(db_path)?
    };
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认台账路径
///
/// 优先级: 环境变量 `WSF_EXPOSURE_LEDGER_PATH` → 用户数据目录 → 当前目录
pub fn get_default_ledger_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("WSF_EXPOSURE_LEDGER_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./wsf_export_jobs.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("wsf-flood-exposure");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("wsf_export_jobs.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_applies_pragmas() {
        let conn = open_sqlite_connection(IN_MEMORY).unwrap();
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
