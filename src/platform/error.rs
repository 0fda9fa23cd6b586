// ==========================================
// 城镇洪涝暴露统计 - 计算平台错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 计算平台（栅格引擎 / 要素库 / 导出队列）错误
#[derive(Error, Debug)]
pub enum PlatformError {
    // ===== 数据集引用错误 =====
    #[error("数据集不存在: {0}")]
    AssetNotFound(String),

    #[error("数据集无效 ({asset}): {message}")]
    InvalidAsset { asset: String, message: String },

    // ===== 规约计算错误 =====
    #[error("规约像元数超限: {pixels:.0} > max_pixels={max_pixels:.0}（未启用 best_effort）")]
    TooManyPixels { pixels: f64, max_pixels: f64 },

    #[error("规约参数无效: {0}")]
    InvalidReduceParams(String),

    #[error("规约计算失败: {0}")]
    ReductionFailed(String),

    // ===== 导出队列错误 =====
    #[error("导出队列已满: 活跃任务 {active} 个，上限 {ceiling} 个")]
    QueueFull { active: usize, ceiling: usize },

    #[error("导出服务已关闭")]
    ExportClosed,

    #[error("导出失败 ({description}): {message}")]
    ExportFailed {
        description: String,
        message: String,
    },

    // ===== 会话错误 =====
    #[error("会话已关闭")]
    SessionClosed,

    // ===== 底层错误 =====
    #[error("文件读写失败: {0}")]
    Io(String),

    #[error("JSON 解析失败: {0}")]
    Json(String),

    #[error("CSV 写入失败: {0}")]
    Csv(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PlatformError {
    /// 是否属于配置类错误（数据集引用错误）
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PlatformError::AssetNotFound(_) | PlatformError::InvalidAsset { .. }
        )
    }
}

impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(err: serde_json::Error) -> Self {
        PlatformError::Json(err.to_string())
    }
}

impl From<csv::Error> for PlatformError {
    fn from(err: csv::Error) -> Self {
        PlatformError::Csv(err.to_string())
    }
}

/// Result 类型别名
pub type PlatformResult<T> = Result<T, PlatformError>;
