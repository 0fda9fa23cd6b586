// ==========================================
// 城镇洪涝暴露统计 - 批量导出编排器
// ==========================================
// 用途: 对区域范围 [start, end) 逐个区域、逐个年份计算聚落暴露，
//       每个区域提交一个单行表格导出任务
// 流程:
//   1. 读取配置 → 校验年份/规约参数
//   2. 加载区域 → 分配编号 → 确定处理范围（不超过单批上限）
//   3. 加载影像 → 水深分级（每次运行一次）
//   4. 逐区域: 逐年累加 → 提交导出（提交即返回，不轮询、不重试）
// 红线: 单个区域失败不影响其他区域；队列准入失败终止本次运行
// ==========================================

use crate::config::RunConfigReader;
use crate::config::{OutputSettings, RegionRange};
use crate::domain::region::{Region, RegionAttributeSet};
use crate::engine::aggregator::{ExposureInputs, SettlementExposureAggregator};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::hazard_classifier::HazardClassifier;
use crate::engine::id_assigner::{assign_region_ids, RegionCatalog};
use crate::perf::PerfGuard;
use crate::platform::error::PlatformError;
use crate::platform::export::{ExportJob, ExportSink, ExportTable, JobTicket};
use crate::platform::session::EngineSession;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

// ==========================================
// BatchPlan - 处理范围
// ==========================================

/// 实际处理的区域序号范围 [start, end)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPlan {
    pub start: usize,
    pub end: usize,
    pub total_regions: usize,
}

impl BatchPlan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 确定处理范围
///
/// - end 缺省为 start + max_jobs_per_batch
/// - end 超过区域总数时截断
/// - 请求宽度超过 max_jobs_per_batch 为配置错误
pub fn plan_range(
    range: RegionRange,
    total_regions: usize,
    max_jobs_per_batch: usize,
) -> EngineResult<BatchPlan> {
    if max_jobs_per_batch == 0 {
        return Err(EngineError::Configuration(
            "max_jobs_per_batch 必须 ≥ 1".to_string(),
        ));
    }

    let requested_end = range
        .end
        .unwrap_or_else(|| range.start.saturating_add(max_jobs_per_batch));
    if requested_end < range.start {
        return Err(EngineError::Configuration(format!(
            "区域范围无效: [{}, {})",
            range.start, requested_end
        )));
    }
    if requested_end - range.start > max_jobs_per_batch {
        return Err(EngineError::Configuration(format!(
            "区域范围 [{}, {}) 超过单批上限 {}",
            range.start, requested_end, max_jobs_per_batch
        )));
    }
    if range.start > total_regions {
        return Err(EngineError::Configuration(format!(
            "区域起始序号 {} 超出区域总数 {}",
            range.start, total_regions
        )));
    }

    Ok(BatchPlan {
        start: range.start,
        end: requested_end.min(total_regions),
        total_regions,
    })
}

// ==========================================
// 运行报告
// ==========================================

/// 区域处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionPhase {
    /// 已编号，尚未计算
    Identified,
    /// 正在累加某一年份
    Accumulating { year: i32 },
    /// 导出任务已提交
    Submitted,
}

impl fmt::Display for RegionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionPhase::Identified => write!(f, "IDENTIFIED"),
            RegionPhase::Accumulating { year } => write!(f, "ACCUMULATING({})", year),
            RegionPhase::Submitted => write!(f, "SUBMITTED"),
        }
    }
}

/// 单个 (区域, 年份) 的失败记录；year 为 None 表示区域级失败（如几何无效）
#[derive(Debug, Clone, PartialEq)]
pub struct RegionFailure {
    pub year: Option<i32>,
    pub message: String,
}

/// 被标记（未导出）的区域
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedRegion {
    pub region_id: u32,
    pub native_key: String,
    /// 停止时所处阶段
    pub phase: RegionPhase,
    pub failures: Vec<RegionFailure>,
    /// 已成功计算的年份（部分结果，不导出）
    pub partial: RegionAttributeSet,
}

/// 单个区域处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum RegionOutcome {
    Submitted(JobTicket),
    Flagged(FlaggedRegion),
}

/// 批量导出运行报告
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub plan: BatchPlan,
    pub years: Vec<i32>,
    pub submitted: Vec<JobTicket>,
    pub flagged: Vec<FlaggedRegion>,
}

impl BatchReport {
    fn new(plan: BatchPlan, years: Vec<i32>) -> Self {
        Self {
            plan,
            years,
            submitted: Vec::new(),
            flagged: Vec::new(),
        }
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged.len()
    }
}

// ==========================================
// BatchExportOrchestrator
// ==========================================

pub struct BatchExportOrchestrator<C>
where
    C: RunConfigReader,
{
    config: Arc<C>,
}

impl<C> BatchExportOrchestrator<C>
where
    C: RunConfigReader,
{
    pub fn new(config: Arc<C>) -> Self {
        Self { config }
    }

    /// 执行一次批量导出
    ///
    /// 配置错误（含数据集引用、范围、队列准入）直接返回 Err；
    /// 区域级失败记录在 BatchReport.flagged 中
    pub async fn run(&self, session: &EngineSession) -> EngineResult<BatchReport> {
        let _perf = PerfGuard::new("batch_export");

        // ===== 1. 配置 =====
        let datasets = self.config.datasets().await?;
        let years = self.config.year_sequence().await?;
        years.validate()?;
        let range = self.config.region_range().await?;
        let max_jobs = self.config.max_jobs_per_batch().await?;
        let params = self.config.reduce_params().await?;
        params
            .validate()
            .map_err(|e| EngineError::Configuration(e.to_string()))?;
        let output = self.config.output_settings().await?;

        // ===== 2. 区域 =====
        let features = session
            .features()?
            .load_features(&datasets.regions)
            .await?;
        let catalog = assign_region_ids(features)?;
        let plan = plan_range(range, catalog.len(), max_jobs)?;

        info!(
            regions = catalog.len(),
            range_start = plan.start,
            range_end = plan.end,
            years = years.years().len(),
            "开始批量导出"
        );

        // ===== 3. 影像与水深分级 =====
        let raster = session.raster()?;
        let settlement = raster.load_image(&datasets.settlement).await?;
        let hazard = raster.load_image(&datasets.hazard).await?;
        let masks = HazardClassifier::new(datasets.hazard_nodata_fill).classify(&hazard);
        let inputs = ExposureInputs::new(settlement, masks);

        // ===== 4. 逐区域处理 =====
        let aggregator = SettlementExposureAggregator::new(raster.clone(), params);
        let report = self
            .run_plan(
                &aggregator,
                session.export()?.as_ref(),
                &catalog,
                &inputs,
                plan,
                &years.years(),
                &output,
            )
            .await?;

        info!(
            submitted = report.submitted_count(),
            flagged = report.flagged_count(),
            "批量导出完成"
        );
        Ok(report)
    }

    /// 按处理范围逐区域执行
    #[allow(clippy::too_many_arguments)]
    pub async fn run_plan(
        &self,
        aggregator: &SettlementExposureAggregator,
        export: &dyn ExportSink,
        catalog: &RegionCatalog,
        inputs: &ExposureInputs,
        plan: BatchPlan,
        years: &[i32],
        output: &OutputSettings,
    ) -> EngineResult<BatchReport> {
        let mut report = BatchReport::new(plan, years.to_vec());

        for index in plan.start..plan.end {
            let region_id = u32::try_from(index + 1).map_err(|_| {
                EngineError::Configuration(format!("区域序号超出编号范围: {}", index))
            })?;
            let region = catalog.get_by_id(region_id).ok_or_else(|| {
                EngineError::Configuration(format!("区域 {} 不存在", region_id))
            })?;

            match process_region(aggregator, export, inputs, region, years, output).await {
                Ok(RegionOutcome::Submitted(ticket)) => report.submitted.push(ticket),
                Ok(RegionOutcome::Flagged(flagged)) => report.flagged.push(flagged),
                Err(e) => {
                    warn!(
                        region_id,
                        submitted = report.submitted_count(),
                        error = %e,
                        "批量导出中止（已提交的任务保留）"
                    );
                    return Err(e);
                }
            }
        }

        Ok(report)
    }
}

/// 处理单个区域: 逐年累加后提交导出
#[instrument(skip_all, fields(region_id = region.id))]
pub async fn process_region(
    aggregator: &SettlementExposureAggregator,
    export: &dyn ExportSink,
    inputs: &ExposureInputs,
    region: &Region,
    years: &[i32],
    output: &OutputSettings,
) -> EngineResult<RegionOutcome> {
    let _perf = PerfGuard::new("process_region");
    let mut phase = RegionPhase::Identified;
    let mut set = RegionAttributeSet::from_region(region);
    let mut failures = Vec::new();

    for &year in years {
        phase = RegionPhase::Accumulating { year };
        match aggregator.accumulate(inputs, region, year, &mut set).await {
            Ok(()) => {}
            Err(EngineError::Geometry { source, .. }) => {
                warn!(error = %source, "区域几何无效，跳过");
                failures.push(RegionFailure {
                    year: None,
                    message: source.to_string(),
                });
                break;
            }
            Err(EngineError::Reduction { year, source, .. }) => {
                warn!(year, error = %source, "区域年份规约失败");
                failures.push(RegionFailure {
                    year: Some(year),
                    message: source.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    if !failures.is_empty() {
        return Ok(RegionOutcome::Flagged(FlaggedRegion {
            region_id: region.id,
            native_key: region.native_key.clone(),
            phase,
            failures,
            partial: set,
        }));
    }

    let job = ExportJob {
        description: output.description_for(region.id),
        folder: output.folder.clone(),
        table: ExportTable::from_attribute_set(&set),
    };
    let ticket = match export.submit(job).await {
        Ok(ticket) => ticket,
        Err(source @ PlatformError::QueueFull { .. }) => {
            return Err(EngineError::QueueAdmission {
                region_id: region.id,
                source,
            })
        }
        Err(e) => return Err(e.into()),
    };

    phase = RegionPhase::Submitted;
    debug!(phase = %phase, task_id = %ticket.task_id, description = %ticket.description, "导出任务已提交");
    Ok(RegionOutcome::Submitted(ticket))
}
