// ==========================================
// 城镇洪涝暴露统计 - 引擎错误类型
// ==========================================
// 分类:
// - 配置错误: 计算开始前致命
// - 几何错误: 跳过该区域并标记
// - 规约错误: 按 (区域, 年份) 上报，不重试
// - 队列准入错误: 按配置错误处理，不重试
// ==========================================

use crate::config::error::ConfigError;
use crate::domain::geometry::GeometryError;
use crate::platform::error::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("区域键重复: {native_key}（区域序号 {first} 与 {second}）")]
    DuplicateRegionKey {
        native_key: String,
        first: usize,
        second: usize,
    },

    #[error("区域 {region_id} 几何无效: {source}")]
    Geometry {
        region_id: u32,
        #[source]
        source: GeometryError,
    },

    #[error("区域 {region_id} 年份 {year} 规约失败: {source}")]
    Reduction {
        region_id: u32,
        year: i32,
        #[source]
        source: PlatformError,
    },

    #[error("导出队列准入失败（区域 {region_id}）: {source}")]
    QueueAdmission {
        region_id: u32,
        #[source]
        source: PlatformError,
    },

    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl EngineError {
    /// 是否为致命错误（终止本次运行）
    ///
    /// 几何错误与规约错误只影响单个区域
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EngineError::Geometry { .. } | EngineError::Reduction { .. }
        )
    }

    /// 是否属于配置类错误（含队列准入）
    pub fn is_configuration(&self) -> bool {
        match self {
            EngineError::Configuration(_)
            | EngineError::Config(_)
            | EngineError::DuplicateRegionKey { .. }
            | EngineError::QueueAdmission { .. } => true,
            EngineError::Platform(e) => e.is_configuration(),
            _ => false,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
