// ==========================================
// 城镇洪涝暴露统计 - 水深分级器
// ==========================================
// 职责: 将淹没水深影像划分为 5 个等级掩膜
// 步骤: 无数据像元先填充（默认 0），再按 HazardClass 区间生成 0/1 掩膜
// 红线: 掩膜两两互斥、合起来覆盖所有有值像元；每次运行只构建一次
// ==========================================

use crate::domain::types::HazardClass;
use crate::platform::image::Image;

/// 水深分级结果
///
/// 只持有惰性影像表达式，可在区域、年份之间共享
#[derive(Debug, Clone)]
pub struct HazardClassMasks {
    /// 填充无数据后的水深影像
    filled: Image,
    /// 按 `HazardClass::index` 排列
    masks: [Image; 5],
}

impl HazardClassMasks {
    pub fn filled(&self) -> &Image {
        &self.filled
    }

    pub fn mask(&self, class: HazardClass) -> &Image {
        &self.masks[class.index()]
    }

    /// (等级, 掩膜)，按水深递增
    pub fn iter(&self) -> impl Iterator<Item = (HazardClass, &Image)> {
        HazardClass::ALL.into_iter().map(move |c| (c, self.mask(c)))
    }
}

/// 水深分级器
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardClassifier {
    nodata_fill: f64,
}

impl Default for HazardClassifier {
    fn default() -> Self {
        Self { nodata_fill: 0.0 }
    }
}

impl HazardClassifier {
    pub fn new(nodata_fill: f64) -> Self {
        Self { nodata_fill }
    }

    pub fn nodata_fill(&self) -> f64 {
        self.nodata_fill
    }

    /// 构建 5 个等级掩膜
    pub fn classify(&self, hazard: &Image) -> HazardClassMasks {
        let filled = hazard.unmask(self.nodata_fill);
        let masks = HazardClass::ALL.map(|class| class_mask(&filled, class));
        tracing::debug!(nodata_fill = self.nodata_fill, "水深分级掩膜已构建");
        HazardClassMasks { filled, masks }
    }
}

/// 单个等级的 0/1 掩膜
fn class_mask(depth: &Image, class: HazardClass) -> Image {
    match class.bounds() {
        (None, Some(point)) => depth.eq(point),
        (Some(lower), Some(upper)) => depth.gt(lower).and(&depth.lte(upper)),
        (Some(lower), None) => depth.gt(lower),
        (None, None) => Image::constant(0.0),
    }
}
