// ==========================================
// 城镇洪涝暴露统计 - 领域层
// ==========================================
// 职责: 区域、几何、水深等级、暴露记录
// 红线: 领域层不访问计算平台
// ==========================================

pub mod exposure;
pub mod geometry;
pub mod region;
pub mod types;

pub use exposure::{class_field_name, total_field_name, year_field_names, SettlementExtentRecord};
pub use geometry::{Coord, Geometry, GeometryError};
pub use region::{Attributes, RawFeature, Region, RegionAttributeSet, ID_FIELD};
pub use types::{ExportJobStatus, HazardClass};
