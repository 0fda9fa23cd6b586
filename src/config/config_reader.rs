// ==========================================
// 城镇洪涝暴露统计 - 运行配置读取 Trait
// ==========================================
// 职责: 定义编排器所需的配置读取接口（不包含实现细节）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::error::ConfigResult;
use crate::config::run_config::{
    DatasetRefs, OutputSettings, RegionRange, RunConfig, YearSequence,
};
use crate::platform::reducer::ReduceParams;
use async_trait::async_trait;

// ==========================================
// RunConfigReader Trait
// ==========================================
// 用途: 批量导出编排器所需的配置读取接口
// 实现者: RunConfig（JSON 文件 + 环境变量覆写）
#[async_trait]
pub trait RunConfigReader: Send + Sync {
    /// 数据集引用（聚落 / 水深 / 区域）
    async fn datasets(&self) -> ConfigResult<DatasetRefs>;

    /// 年份序列
    ///
    /// # 默认值
    /// - 1985..=2015，步长 1
    async fn year_sequence(&self) -> ConfigResult<YearSequence>;

    /// 区域处理范围 [start, end)
    async fn region_range(&self) -> ConfigResult<RegionRange>;

    /// 单批导出任务上限
    ///
    /// # 默认值
    /// - 3000
    async fn max_jobs_per_batch(&self) -> ConfigResult<usize>;

    /// 区域规约参数
    ///
    /// # 默认值
    /// - scale 30 m, best_effort, max_pixels 1e18, tile_scale 1
    async fn reduce_params(&self) -> ConfigResult<ReduceParams>;

    /// 输出目录与任务名前缀
    async fn output_settings(&self) -> ConfigResult<OutputSettings>;
}

#[async_trait]
impl RunConfigReader for RunConfig {
    async fn datasets(&self) -> ConfigResult<DatasetRefs> {
        Ok(self.datasets.clone())
    }

    async fn year_sequence(&self) -> ConfigResult<YearSequence> {
        Ok(self.years)
    }

    async fn region_range(&self) -> ConfigResult<RegionRange> {
        Ok(self.range)
    }

    async fn max_jobs_per_batch(&self) -> ConfigResult<usize> {
        Ok(self.max_jobs_per_batch)
    }

    async fn reduce_params(&self) -> ConfigResult<ReduceParams> {
        Ok(self.reduction)
    }

    async fn output_settings(&self) -> ConfigResult<OutputSettings> {
        Ok(self.output.clone())
    }
}
