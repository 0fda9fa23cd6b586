// ==========================================
// 城镇洪涝暴露统计 - 核心库
// ==========================================
// 功能: 按参考区域、按年份统计落在各淹没水深等级内的聚落面积（km²），
//       每个区域导出一张单行表格
// 输入: 聚落演变栅格（像元值 = 首次聚落年份）、淹没水深栅格、参考区域
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 区域、几何、水深等级、暴露记录
pub mod domain;

// 配置层 - 运行配置
pub mod config;

// 平台层 - 栅格引擎 / 要素库 / 导出服务
pub mod platform;

// 仓储层 - 导出任务台账
pub mod repository;

// 引擎层 - 核心算法
pub mod engine;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 性能统计
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ExportJobStatus, Geometry, HazardClass, RawFeature, Region, RegionAttributeSet,
    SettlementExtentRecord,
};

// 配置
pub use config::{RunConfig, RunConfigReader, YearSequence};

// 平台
pub use platform::{EngineSession, ExportSink, Image, LocalSessionSettings, ReduceParams};

// 引擎
pub use engine::{
    assign_region_ids, BatchExportOrchestrator, BatchReport, EngineError, HazardClassifier,
    SettlementExposureAggregator,
};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "城镇洪涝暴露统计";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
