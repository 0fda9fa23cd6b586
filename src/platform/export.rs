// ==========================================
// 城镇洪涝暴露统计 - 表格导出
// ==========================================
// 职责: 导出任务定义、导出服务 trait、本地导出服务
// 本地实现: SQLite 台账 + 后台 worker 写 CSV（<root>/<folder>/<description>.csv）
// 红线: 提交即返回（fire-and-forget），不等待完成、不重试
// ==========================================

use crate::domain::region::RegionAttributeSet;
use crate::platform::error::{PlatformError, PlatformResult};
use crate::repository::export_job_repo::{Admission, ExportJobRecord, ExportJobRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

// ==========================================
// 导出任务
// ==========================================

/// 待导出的表格
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// 单区域单行表格
    pub fn from_attribute_set(set: &RegionAttributeSet) -> Self {
        Self {
            columns: set.columns(),
            rows: vec![set.row()],
        }
    }
}

/// 导出任务
#[derive(Debug, Clone, PartialEq)]
pub struct ExportJob {
    /// 任务名（同时作为输出文件名）
    pub description: String,
    /// 目标目录
    pub folder: String,
    pub table: ExportTable,
}

/// 提交回执
#[derive(Debug, Clone, PartialEq)]
pub struct JobTicket {
    pub task_id: String,
    pub description: String,
    pub submitted_at: DateTime<Utc>,
}

/// 导出服务
///
/// 提交后任务的执行、完成与失败均由导出服务自行管理
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// 提交导出任务；队列已满时返回 `PlatformError::QueueFull`
    async fn submit(&self, job: ExportJob) -> PlatformResult<JobTicket>;

    /// 关闭服务（本地实现会等待队列中的任务写完）
    async fn shutdown(&self) -> PlatformResult<()> {
        Ok(())
    }
}

// ==========================================
// LocalExportSink - 本地导出服务
// ==========================================

/// 中断遗留任务的失败原因
pub const INTERRUPTED_MESSAGE: &str = "导出中断: 上次会话未正常关闭";

struct QueuedExport {
    task_id: String,
    job: ExportJob,
}

/// 本地导出服务
///
/// 创建后处于暂停状态（任务只排队不执行），调用 `start` 后由后台 worker 逐个写出
pub struct LocalExportSink {
    output_root: PathBuf,
    queue_ceiling: usize,
    ledger: Arc<ExportJobRepository>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedExport>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueuedExport>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl LocalExportSink {
    pub fn new(
        output_root: impl Into<PathBuf>,
        queue_ceiling: usize,
        ledger: Arc<ExportJobRepository>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            output_root: output_root.into(),
            queue_ceiling,
            ledger,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
        }
    }

    pub fn ledger(&self) -> &Arc<ExportJobRepository> {
        &self.ledger
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// 清理台账中此前会话遗留的活跃任务（进程中断时未写完的任务）
    ///
    /// 须在本服务提交任何任务之前调用
    pub fn recover_interrupted(&self) -> PlatformResult<usize> {
        let recovered = self.ledger.fail_interrupted(INTERRUPTED_MESSAGE)?;
        if recovered > 0 {
            tracing::warn!(recovered, "台账中存在中断遗留的导出任务，已标记为失败");
        }
        Ok(recovered)
    }

    /// 启动后台 worker（需在 tokio 运行时内调用；重复调用无副作用）
    pub fn start(&self) -> PlatformResult<()> {
        let receiver = self
            .receiver
            .lock()
            .map_err(|e| PlatformError::Other(anyhow::anyhow!("锁获取失败: {}", e)))?
            .take();

        let mut rx = match receiver {
            Some(rx) => rx,
            None => return Ok(()),
        };

        let ledger = self.ledger.clone();
        let root = self.output_root.clone();
        let handle = tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                run_export(&ledger, &root, item);
            }
            tracing::debug!("导出 worker 退出");
        });

        *self
            .worker
            .lock()
            .map_err(|e| PlatformError::Other(anyhow::anyhow!("锁获取失败: {}", e)))? =
            Some(handle);
        Ok(())
    }
}

#[async_trait]
impl ExportSink for LocalExportSink {
    async fn submit(&self, job: ExportJob) -> PlatformResult<JobTicket> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| PlatformError::Other(anyhow::anyhow!("锁获取失败: {}", e)))?
            .clone()
            .ok_or(PlatformError::ExportClosed)?;

        let task_id = Uuid::new_v4().to_string();
        let record = ExportJobRecord::queued(
            task_id.clone(),
            job.description.clone(),
            job.folder.clone(),
            job.table.rows.len() as i64,
        );

        match self.ledger.try_enqueue(&record, self.queue_ceiling)? {
            Admission::Accepted => {}
            Admission::Rejected { active } => {
                return Err(PlatformError::QueueFull {
                    active,
                    ceiling: self.queue_ceiling,
                })
            }
        }

        let description = job.description.clone();
        sender
            .send(QueuedExport {
                task_id: task_id.clone(),
                job,
            })
            .map_err(|_| PlatformError::ExportClosed)?;

        tracing::debug!(task_id = %task_id, description = %description, "导出任务已入队");

        Ok(JobTicket {
            task_id,
            description,
            submitted_at: record.created_at,
        })
    }

    async fn shutdown(&self) -> PlatformResult<()> {
        // 关闭发送端；未启动的 worker 在此启动，把已排队任务写完
        let _ = self
            .sender
            .lock()
            .map_err(|e| PlatformError::Other(anyhow::anyhow!("锁获取失败: {}", e)))?
            .take();
        self.start()?;

        let handle = self
            .worker
            .lock()
            .map_err(|e| PlatformError::Other(anyhow::anyhow!("锁获取失败: {}", e)))?
            .take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| PlatformError::Other(anyhow::anyhow!("导出 worker 异常退出: {}", e)))?;
        }
        Ok(())
    }
}

/// 执行单个导出任务并更新台账
fn run_export(ledger: &ExportJobRepository, root: &Path, item: QueuedExport) {
    if let Err(e) = ledger.mark_running(&item.task_id) {
        tracing::error!(task_id = %item.task_id, error = %e, "导出任务状态更新失败");
        return;
    }

    match write_csv(root, &item.job) {
        Ok(path) => {
            let path = path.display().to_string();
            tracing::info!(
                task_id = %item.task_id,
                description = %item.job.description,
                output = %path,
                "导出完成"
            );
            if let Err(e) = ledger.mark_succeeded(&item.task_id, &path) {
                tracing::error!(task_id = %item.task_id, error = %e, "导出任务状态更新失败");
            }
        }
        Err(e) => {
            tracing::error!(
                task_id = %item.task_id,
                description = %item.job.description,
                error = %e,
                "导出失败"
            );
            if let Err(e) = ledger.mark_failed(&item.task_id, &e.to_string()) {
                tracing::error!(task_id = %item.task_id, error = %e, "导出任务状态更新失败");
            }
        }
    }
}

/// 写出 CSV 文件，返回文件路径
///
/// 列数校验在创建文件之前完成，校验失败不留下文件
pub fn write_csv(root: &Path, job: &ExportJob) -> PlatformResult<PathBuf> {
    let width = job.table.columns.len();
    if let Some(row) = job.table.rows.iter().find(|row| row.len() != width) {
        return Err(PlatformError::ExportFailed {
            description: job.description.clone(),
            message: format!("列数不一致: 表头 {} 列，数据 {} 列", width, row.len()),
        });
    }

    let dir = root.join(&job.folder);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.csv", job.description));

    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&job.table.columns)?;
    for row in &job.table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;

    Ok(path)
}
