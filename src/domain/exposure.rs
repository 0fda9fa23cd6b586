// ==========================================
// 城镇洪涝暴露统计 - 聚落暴露记录
// ==========================================
// 职责: 单个 (区域, 年份) 的聚落面积统计结果及输出字段命名
// 单位: km²
// 字段: SE_<Y>, SE_0_<Y>, SE_015_<Y>, SE_050_<Y>, SE_150_<Y>, SE_150p_<Y>
// ==========================================

use crate::domain::types::HazardClass;
use serde::{Deserialize, Serialize};

/// 总聚落面积字段名
pub fn total_field_name(year: i32) -> String {
    format!("SE_{}", year)
}

/// 分等级聚落面积字段名
pub fn class_field_name(class: HazardClass, year: i32) -> String {
    format!("SE_{}_{}", class.field_tag(), year)
}

/// 某一年份的全部 6 个字段名（总量在前，等级按水深递增）
pub fn year_field_names(year: i32) -> Vec<String> {
    let mut names = Vec::with_capacity(1 + HazardClass::ALL.len());
    names.push(total_field_name(year));
    names.extend(HazardClass::ALL.iter().map(|c| class_field_name(*c, year)));
    names
}

// ==========================================
// SettlementExtentRecord
// ==========================================

/// 单个 (区域, 年份) 的聚落面积（km²）
///
/// 不变量:
/// - 所有值非负
/// - total ≈ 五个等级之和（区域边缘离散化误差内）
/// - 同一区域内随年份单调不减
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SettlementExtentRecord {
    /// 总聚落面积
    pub total_km2: f64,
    /// 各水深等级聚落面积，下标见 `HazardClass::index`
    pub class_km2: [f64; 5],
}

impl SettlementExtentRecord {
    /// 无聚落（全部为 0，而不是缺失）
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn class_area(&self, class: HazardClass) -> f64 {
        self.class_km2[class.index()]
    }

    pub fn set_class_area(&mut self, class: HazardClass, km2: f64) {
        self.class_km2[class.index()] = km2;
    }

    /// 五个等级之和
    pub fn class_sum(&self) -> f64 {
        self.class_km2.iter().sum()
    }

    /// 总量与分等级之和是否在容差内一致
    pub fn is_consistent(&self, tolerance_km2: f64) -> bool {
        (self.total_km2 - self.class_sum()).abs() <= tolerance_km2
    }

    /// 展开为 (字段名, 值) 列表，顺序与 `year_field_names` 一致
    pub fn fields(&self, year: i32) -> Vec<(String, f64)> {
        let mut fields = Vec::with_capacity(6);
        fields.push((total_field_name(year), self.total_km2));
        for class in HazardClass::ALL {
            fields.push((class_field_name(class, year), self.class_area(class)));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_names_follow_convention() {
        assert_eq!(
            year_field_names(1990),
            vec![
                "SE_1990",
                "SE_0_1990",
                "SE_015_1990",
                "SE_050_1990",
                "SE_150_1990",
                "SE_150p_1990",
            ]
        );
    }

    #[test]
    fn test_zero_record_has_all_fields() {
        let fields = SettlementExtentRecord::zero().fields(2015);
        assert_eq!(fields.len(), 6);
        assert!(fields.iter().all(|(_, v)| *v == 0.0));
    }

    #[test]
    fn test_consistency_check() {
        let mut record = SettlementExtentRecord {
            total_km2: 1.0,
            ..Default::default()
        };
        record.set_class_area(HazardClass::Zero, 0.6);
        record.set_class_area(HazardClass::UpTo050, 0.4);
        assert!(record.is_consistent(1e-9));

        record.set_class_area(HazardClass::Above150, 0.1);
        assert!(!record.is_consistent(1e-9));
        assert_eq!(record.class_area(HazardClass::Above150), 0.1);
    }
}
