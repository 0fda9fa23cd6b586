// ==========================================
// 城镇洪涝暴露统计 - 聚落暴露聚合器
// ==========================================
// 职责: 计算单个 (区域, 年份) 的聚落面积（总量 + 5 个水深等级）
// 流程:
//   1. 聚落影像裁剪到区域，掩膜保留 值 <= 年份 的像元，再取 值 > 0
//   2. 面积影像 = 像元面积 × 1e-6 × 聚落指示（无数据填 0），单位 km²
//   3. 在区域内求和得到总量；叠加各等级掩膜后分别求和
// 红线: 无聚落时结果为 0.0（不是缺失）；规约失败原样上报，不重试
// ==========================================

use crate::domain::exposure::SettlementExtentRecord;
use crate::domain::region::{Region, RegionAttributeSet};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::hazard_classifier::HazardClassMasks;
use crate::perf;
use crate::platform::image::Image;
use crate::platform::reducer::ReduceParams;
use crate::platform::session::RasterEngine;
use std::sync::Arc;
use tracing::instrument;

/// m² → km²
const M2_TO_KM2: f64 = 1e-6;

/// 每次运行共享的输入影像
#[derive(Debug, Clone)]
pub struct ExposureInputs {
    /// 聚落演变影像（像元值 = 首次检测到聚落的年份，0 为非聚落）
    pub settlement: Image,
    pub masks: HazardClassMasks,
}

impl ExposureInputs {
    pub fn new(settlement: Image, masks: HazardClassMasks) -> Self {
        Self { settlement, masks }
    }
}

/// 聚落暴露聚合器
pub struct SettlementExposureAggregator {
    engine: Arc<dyn RasterEngine>,
    params: ReduceParams,
}

impl SettlementExposureAggregator {
    pub fn new(engine: Arc<dyn RasterEngine>, params: ReduceParams) -> Self {
        Self { engine, params }
    }

    pub fn params(&self) -> &ReduceParams {
        &self.params
    }

    /// 计算单个 (区域, 年份) 的聚落面积
    #[instrument(skip(self, inputs, region), fields(region_id = region.id))]
    pub async fn compute(
        &self,
        inputs: &ExposureInputs,
        region: &Region,
        year: i32,
    ) -> EngineResult<SettlementExtentRecord> {
        region
            .geometry
            .validate()
            .map_err(|source| EngineError::Geometry {
                region_id: region.id,
                source,
            })?;

        let area = settled_area_image(&inputs.settlement, region, year);

        let mut record = SettlementExtentRecord::zero();
        record.total_km2 = self.reduce(&area, region, year).await?;
        for (class, mask) in inputs.masks.iter() {
            let class_area = self.reduce(&area.update_mask(mask), region, year).await?;
            record.set_class_area(class, class_area);
        }

        tracing::debug!(
            year,
            total_km2 = record.total_km2,
            class_sum_km2 = record.class_sum(),
            "区域年份统计完成"
        );
        Ok(record)
    }

    /// 计算并写入区域输出记录（同一年份重复写入结果相同）
    pub async fn accumulate(
        &self,
        inputs: &ExposureInputs,
        region: &Region,
        year: i32,
        set: &mut RegionAttributeSet,
    ) -> EngineResult<()> {
        let record = self.compute(inputs, region, year).await?;
        set.record_year(year, record);
        Ok(())
    }

    async fn reduce(&self, image: &Image, region: &Region, year: i32) -> EngineResult<f64> {
        perf::record_reduction();
        let sum = self
            .engine
            .reduce_sum(image, &region.geometry, &self.params)
            .await
            .map_err(|source| EngineError::Reduction {
                region_id: region.id,
                year,
                source,
            })?;
        Ok(sum.unwrap_or(0.0))
    }
}

/// 截至 year 的聚落面积影像（km²/像元，区域外与非聚落处为 0）
fn settled_area_image(settlement: &Image, region: &Region, year: i32) -> Image {
    let settled = settlement
        .clip(region.geometry.clone())
        .update_mask(&settlement.lte(year as f64))
        .gt(0.0);

    Image::pixel_area()
        .scale(M2_TO_KM2)
        .multiply(&settled.unmask(0.0))
}
