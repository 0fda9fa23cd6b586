// ==========================================
// 城镇洪涝暴露统计 - 参考区域
// ==========================================
// 职责: 原始要素、带编号区域、区域输出属性集
// 红线: 原始属性原样透传，只允许追加 id 与年份字段
// ==========================================

use crate::domain::exposure::{year_field_names, SettlementExtentRecord};
use crate::domain::geometry::Geometry;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// 区域属性（字段名 → 值，不做解释）
pub type Attributes = BTreeMap<String, Value>;

/// 编号字段名
pub const ID_FIELD: &str = "id";

// ==========================================
// RawFeature - 要素库中的原始要素
// ==========================================

/// 要素库返回的原始要素
#[derive(Debug, Clone, PartialEq)]
pub struct RawFeature {
    /// 要素库内的唯一键
    pub native_key: String,
    pub geometry: Geometry,
    pub attributes: Attributes,
}

// ==========================================
// Region - 已编号区域
// ==========================================

/// 已分配编号的参考区域
///
/// 创建后不可变；年份字段累积在 `RegionAttributeSet` 中
#[derive(Debug, Clone)]
pub struct Region {
    /// 编号（1..=N）
    pub id: u32,
    pub native_key: String,
    pub geometry: Arc<Geometry>,
    /// 原始属性 + `id`
    pub attributes: Attributes,
}

impl Region {
    pub fn new(id: u32, feature: RawFeature) -> Self {
        let mut attributes = feature.attributes;
        attributes.insert(ID_FIELD.to_string(), Value::from(id));
        Self {
            id,
            native_key: feature.native_key,
            geometry: Arc::new(feature.geometry),
            attributes,
        }
    }
}

// ==========================================
// RegionAttributeSet - 单区域输出记录（累加器）
// ==========================================

/// 单区域的输出记录
///
/// 年份字段只增不改：写入年份 Y 不影响其他年份；
/// 对同一年份重复写入相同结果是幂等的
#[derive(Debug, Clone, PartialEq)]
pub struct RegionAttributeSet {
    pub region_id: u32,
    attributes: Attributes,
    years: BTreeMap<i32, SettlementExtentRecord>,
}

impl RegionAttributeSet {
    pub fn from_region(region: &Region) -> Self {
        Self {
            region_id: region.id,
            attributes: region.attributes.clone(),
            years: BTreeMap::new(),
        }
    }

    /// 写入某一年份的 6 个字段
    pub fn record_year(&mut self, year: i32, record: SettlementExtentRecord) {
        self.years.insert(year, record);
    }

    pub fn year(&self, year: i32) -> Option<&SettlementExtentRecord> {
        self.years.get(&year)
    }

    pub fn years(&self) -> impl Iterator<Item = (i32, &SettlementExtentRecord)> {
        self.years.iter().map(|(y, r)| (*y, r))
    }

    pub fn year_count(&self) -> usize {
        self.years.len()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// 按字段名取值（原始属性或年份字段）
    pub fn get(&self, field: &str) -> Option<Value> {
        if let Some(v) = self.attributes.get(field) {
            return Some(v.clone());
        }
        self.years.iter().find_map(|(year, record)| {
            record
                .fields(*year)
                .into_iter()
                .find(|(name, _)| name == field)
                .map(|(_, v)| Value::from(v))
        })
    }

    /// 输出列名: 原始属性（含 id），随后按年份递增的 6 个字段
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self.attributes.keys().cloned().collect();
        for year in self.years.keys() {
            columns.extend(year_field_names(*year));
        }
        columns
    }

    /// 输出行（与 `columns` 一一对应）
    pub fn row(&self) -> Vec<String> {
        let mut row: Vec<String> = self.attributes.values().map(render_value).collect();
        for (year, record) in &self.years {
            row.extend(record.fields(*year).into_iter().map(|(_, v)| v.to_string()));
        }
        row
    }
}

/// 属性值转文本
///
/// 字符串不加引号，null 为空串，数组/对象保留 JSON 文本
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
