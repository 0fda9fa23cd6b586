// ==========================================
// 城镇洪涝暴露统计 - 仓储层
// ==========================================
// 职责: 导出任务台账的数据访问
// ==========================================

pub mod error;
pub mod export_job_repo;

pub use error::{RepositoryError, RepositoryResult};
pub use export_job_repo::{Admission, ExportJobRecord, ExportJobRepository};
