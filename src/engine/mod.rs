// ==========================================
// 城镇洪涝暴露统计 - 引擎层
// ==========================================
// 职责: 区域编号、水深分级、聚落暴露聚合、批量导出编排
// 红线: 引擎只通过平台接口访问栅格 / 要素 / 导出
// ==========================================

pub mod aggregator;
pub mod error;
pub mod hazard_classifier;
pub mod id_assigner;
pub mod orchestrator;

pub use aggregator::{ExposureInputs, SettlementExposureAggregator};
pub use error::{EngineError, EngineResult};
pub use hazard_classifier::{HazardClassMasks, HazardClassifier};
pub use id_assigner::{assign_region_ids, RegionCatalog};
pub use orchestrator::{
    plan_range, process_region, BatchExportOrchestrator, BatchPlan, BatchReport, FlaggedRegion,
    RegionFailure, RegionOutcome, RegionPhase,
};
