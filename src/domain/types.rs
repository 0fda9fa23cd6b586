// ==========================================
// 城镇洪涝暴露统计 - 领域类型定义
// ==========================================
// 职责: 淹没水深等级、导出任务状态等枚举
// 红线: 五个水深等级两两互斥、合起来覆盖所有有值像元
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// HazardClass - 淹没水深等级
// ==========================================

/// 淹没水深等级（单位: 米）
///
/// 区间规则: 除 `Zero` 为单点 {0} 外，其余均为左开右闭
/// - Zero: {0}
/// - UpTo015: (0, 0.15]
/// - UpTo050: (0.15, 0.5]
/// - UpTo150: (0.5, 1.5]
/// - Above150: (1.5, +∞)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HazardClass {
    Zero,
    UpTo015,
    UpTo050,
    UpTo150,
    Above150,
}

impl HazardClass {
    /// 全部等级（按水深递增）
    pub const ALL: [HazardClass; 5] = [
        HazardClass::Zero,
        HazardClass::UpTo015,
        HazardClass::UpTo050,
        HazardClass::UpTo150,
        HazardClass::Above150,
    ];

    /// 输出字段中的等级标记（SE_<tag>_<year>）
    pub fn field_tag(&self) -> &'static str {
        match self {
            HazardClass::Zero => "0",
            HazardClass::UpTo015 => "015",
            HazardClass::UpTo050 => "050",
            HazardClass::UpTo150 => "150",
            HazardClass::Above150 => "150p",
        }
    }

    /// 区间边界: (下界-开, 上界-闭)
    ///
    /// `Zero` 返回 (None, Some(0.0))，按单点处理
    pub fn bounds(&self) -> (Option<f64>, Option<f64>) {
        match self {
            HazardClass::Zero => (None, Some(0.0)),
            HazardClass::UpTo015 => (Some(0.0), Some(0.15)),
            HazardClass::UpTo050 => (Some(0.15), Some(0.5)),
            HazardClass::UpTo150 => (Some(0.5), Some(1.5)),
            HazardClass::Above150 => (Some(1.5), None),
        }
    }

    /// 判断水深是否落在本等级
    pub fn contains(&self, depth: f64) -> bool {
        match self.bounds() {
            (None, Some(point)) => depth == point,
            (Some(lower), Some(upper)) => depth > lower && depth <= upper,
            (Some(lower), None) => depth > lower,
            (None, None) => false,
        }
    }

    /// 水深分级
    ///
    /// 负值与 NaN 不属于任何等级，返回 None
    pub fn classify(depth: f64) -> Option<HazardClass> {
        HazardClass::ALL.into_iter().find(|class| class.contains(depth))
    }

    /// 在 [f64; 5] 等按等级排列的数组中的下标
    pub fn index(&self) -> usize {
        match self {
            HazardClass::Zero => 0,
            HazardClass::UpTo015 => 1,
            HazardClass::UpTo050 => 2,
            HazardClass::UpTo150 => 3,
            HazardClass::Above150 => 4,
        }
    }
}

impl fmt::Display for HazardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            (None, Some(point)) => write!(f, "{{{}}}", point),
            (Some(lower), Some(upper)) => write!(f, "({}, {}]", lower, upper),
            (Some(lower), None) => write!(f, "({}, +inf)", lower),
            (None, None) => write!(f, "(empty)"),
        }
    }
}

// ==========================================
// ExportJobStatus - 导出任务状态
// ==========================================

/// 导出任务状态
///
/// 生命周期: Queued → Running → Succeeded / Failed
/// 状态推进由导出平台负责，编排器只观察"已提交"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportJobStatus {
    /// 排队中
    Queued,
    /// 执行中
    Running,
    /// 已完成
    Succeeded,
    /// 失败
    Failed,
}

impl ExportJobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ExportJobStatus::Queued => "QUEUED",
            ExportJobStatus::Running => "RUNNING",
            ExportJobStatus::Succeeded => "SUCCEEDED",
            ExportJobStatus::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "QUEUED" => ExportJobStatus::Queued,
            "RUNNING" => ExportJobStatus::Running,
            "SUCCEEDED" => ExportJobStatus::Succeeded,
            _ => ExportJobStatus::Failed,
        }
    }

    /// 是否占用平台队列名额
    pub fn is_active(&self) -> bool {
        matches!(self, ExportJobStatus::Queued | ExportJobStatus::Running)
    }
}

impl fmt::Display for ExportJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
