// ==========================================
// 城镇洪涝暴露统计 - 区域编号器
// ==========================================
// 职责: 按要素库原始顺序为区域分配连续编号 1..N
// 输入: 要素库返回的原始要素（任意原生键）
// 输出: RegionCatalog（每个区域追加属性 id）
// 红线: 编号稠密、唯一、保持输入顺序；同一输入两次编号结果相同
// ==========================================

use crate::domain::region::{RawFeature, Region};
use crate::engine::error::{EngineError, EngineResult};
use std::collections::HashMap;

/// 已编号区域集合
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
    by_key: HashMap<String, u32>,
}

impl RegionCatalog {
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// 按编号取区域（编号从 1 开始）
    pub fn get_by_id(&self, id: u32) -> Option<&Region> {
        let index = (id as usize).checked_sub(1)?;
        self.regions.get(index)
    }

    /// 按 0 基序号取区域（序号 j 对应 id = j + 1）
    pub fn get_by_index(&self, index: usize) -> Option<&Region> {
        self.regions.get(index)
    }

    /// 原生键 → 编号
    pub fn id_for_key(&self, native_key: &str) -> Option<u32> {
        self.by_key.get(native_key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}

/// 分配区域编号
///
/// 第 i 个要素（0 基）获得 id = i + 1；原生键重复视为配置错误
pub fn assign_region_ids(features: Vec<RawFeature>) -> EngineResult<RegionCatalog> {
    let mut catalog = RegionCatalog {
        regions: Vec::with_capacity(features.len()),
        by_key: HashMap::with_capacity(features.len()),
    };

    for (index, feature) in features.into_iter().enumerate() {
        let id = u32::try_from(index + 1).map_err(|_| {
            EngineError::Configuration(format!("区域数量超出编号范围: {}", index + 1))
        })?;

        if let Some(existing) = catalog.by_key.get(&feature.native_key) {
            return Err(EngineError::DuplicateRegionKey {
                native_key: feature.native_key,
                first: *existing as usize - 1,
                second: index,
            });
        }
        catalog.by_key.insert(feature.native_key.clone(), id);
        catalog.regions.push(Region::new(id, feature));
    }

    tracing::debug!(regions = catalog.len(), "区域编号完成");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::Geometry;
    use crate::domain::region::{Attributes, ID_FIELD};
    use serde_json::Value;

    fn feature(key: &str) -> RawFeature {
        let mut attributes = Attributes::new();
        attributes.insert("NAME".to_string(), Value::from(format!("region-{}", key)));
        RawFeature {
            native_key: key.to_string(),
            geometry: Geometry::rectangle(0.0, 0.0, 1.0, 1.0),
            attributes,
        }
    }

    #[test]
    fn test_ids_follow_input_order() {
        let catalog =
            assign_region_ids(vec![feature("z"), feature("a"), feature("m")]).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.id_for_key("z"), Some(1));
        assert_eq!(catalog.id_for_key("a"), Some(2));
        assert_eq!(catalog.id_for_key("m"), Some(3));
        assert_eq!(
            catalog.get_by_id(2).unwrap().attributes.get(ID_FIELD),
            Some(&Value::from(2))
        );
        assert!(catalog.get_by_id(0).is_none());
        assert!(catalog.get_by_id(4).is_none());
    }

    #[test]
    fn test_empty_input_gives_empty_catalog() {
        let catalog = assign_region_ids(Vec::new()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_duplicate_native_key_is_rejected() {
        let err = assign_region_ids(vec![feature("a"), feature("b"), feature("a")]).unwrap_err();
        match err {
            EngineError::DuplicateRegionKey { native_key, first, second } => {
                assert_eq!(native_key, "a");
                assert_eq!((first, second), (0, 2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let input = vec![feature("3"), feature("1"), feature("2")];
        let first: Vec<(u32, String)> = assign_region_ids(input.clone())
            .unwrap()
            .iter()
            .map(|r| (r.id, r.native_key.clone()))
            .collect();
        let second: Vec<(u32, String)> = assign_region_ids(input)
            .unwrap()
            .iter()
            .map(|r| (r.id, r.native_key.clone()))
            .collect();
        assert_eq!(first, second);
    }
}
