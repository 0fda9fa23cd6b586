// ==========================================
// 城镇洪涝暴露统计 - 计算平台层
// ==========================================
// 职责: 外部协作方的接口与本地实现
// - 栅格引擎: 影像运算 + 区域规约
// - 要素库: 参考区域
// - 导出服务: 异步表格导出（受队列上限约束）
// 红线: 核心算法只通过 EngineSession 访问平台
// ==========================================

pub mod error;
pub mod export;
pub mod feature_store;
pub mod image;
pub mod raster;
pub mod reducer;
pub mod session;

pub use error::{PlatformError, PlatformResult};
pub use export::{ExportJob, ExportSink, ExportTable, JobTicket, LocalExportSink};
pub use image::{Image, SampleContext};
pub use raster::{GeoTransform, Raster, RasterFile};
pub use reducer::{ReduceParams, Reduction};
pub use session::{
    EngineSession, FeatureStore, LocalCatalog, LocalSessionSettings, RasterEngine, SessionSummary,
};
