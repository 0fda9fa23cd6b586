// ==========================================
// 城镇洪涝暴露统计 - 运行配置
// ==========================================
// 职责: 数据集引用、年份序列、区域处理范围、规约参数、输出位置
// 来源: JSON 配置文件，随后应用环境变量覆写（config_keys）
// 红线: 配置错误必须在任何计算开始前暴露
// ==========================================

use crate::config::error::{ConfigError, ConfigResult};
use crate::db::get_default_ledger_path;
use crate::platform::reducer::ReduceParams;
use crate::platform::session::LocalSessionSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 平台队列上限（同时排队的导出任务数）
pub const DEFAULT_MAX_JOBS_PER_BATCH: usize = 3000;

/// 默认输出目录名
pub const DEFAULT_OUTPUT_FOLDER: &str = "Results";

/// 默认任务名前缀
pub const DEFAULT_DESCRIPTION_PREFIX: &str = "WSFevolution_ZonalStatistics_";

// ==========================================
// 环境变量覆写键
// ==========================================
pub mod config_keys {
    pub const SETTLEMENT_DATASET: &str = "WSF_EXPOSURE_SETTLEMENT_DATASET";
    pub const HAZARD_DATASET: &str = "WSF_EXPOSURE_HAZARD_DATASET";
    pub const REGIONS_DATASET: &str = "WSF_EXPOSURE_REGIONS_DATASET";
    pub const YEAR_START: &str = "WSF_EXPOSURE_YEAR_START";
    pub const YEAR_END: &str = "WSF_EXPOSURE_YEAR_END";
    pub const YEAR_STEP: &str = "WSF_EXPOSURE_YEAR_STEP";
    pub const RANGE_START: &str = "WSF_EXPOSURE_RANGE_START";
    pub const RANGE_END: &str = "WSF_EXPOSURE_RANGE_END";
    pub const MAX_JOBS_PER_BATCH: &str = "WSF_EXPOSURE_MAX_JOBS_PER_BATCH";
    pub const OUTPUT_FOLDER: &str = "WSF_EXPOSURE_OUTPUT_FOLDER";
    pub const OUTPUT_DIR: &str = "WSF_EXPOSURE_OUTPUT_DIR";
    pub const CATALOG_ROOT: &str = "WSF_EXPOSURE_CATALOG_ROOT";

    /// 所有覆写键共同前缀
    pub const PREFIX: &str = "WSF_EXPOSURE_";
}

// ==========================================
// 配置分节
// ==========================================

/// 数据集引用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRefs {
    /// 聚落演变栅格（像元值 = 首次检测到聚落的年份）
    pub settlement: String,
    /// 淹没水深栅格（米）
    pub hazard: String,
    /// 参考区域要素集
    pub regions: String,
    /// 水深无数据像元的填充值
    #[serde(default)]
    pub hazard_nodata_fill: f64,
}

/// 年份序列 [start, end]，步长 step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSequence {
    pub start: i32,
    pub end: i32,
    #[serde(default = "default_step")]
    pub step: u32,
}

fn default_step() -> u32 {
    1
}

impl YearSequence {
    pub fn new(start: i32, end: i32, step: u32) -> Self {
        Self { start, end, step }
    }

    /// 逐年 WSF 演变数据: 1985..=2015
    pub fn yearly_wsf() -> Self {
        Self::new(1985, 2015, 1)
    }

    /// 五年步长 WSF 演变数据: 1990, 1995, ..., 2015
    pub fn five_year_wsf() -> Self {
        Self::new(1990, 2015, 5)
    }

    /// 递增的年份列表
    pub fn years(&self) -> Vec<i32> {
        if self.step == 0 || self.start > self.end {
            return Vec::new();
        }
        (self.start..=self.end).step_by(self.step as usize).collect()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.step == 0 {
            return Err(ConfigError::invalid("years.step", "步长必须 ≥ 1"));
        }
        if self.start > self.end {
            return Err(ConfigError::invalid(
                "years",
                format!("起始年份 {} 晚于结束年份 {}", self.start, self.end),
            ));
        }
        Ok(())
    }
}

impl Default for YearSequence {
    fn default() -> Self {
        Self::yearly_wsf()
    }
}

/// 区域处理范围 [start, end)，按 0 基序号（对应 id = 序号 + 1）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionRange {
    #[serde(default)]
    pub start: usize,
    /// 缺省为 start + max_jobs_per_batch（并截断到区域总数）
    #[serde(default)]
    pub end: Option<usize>,
}

impl RegionRange {
    pub fn new(start: usize, end: Option<usize>) -> Self {
        Self { start, end }
    }
}

/// 输出设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub folder: String,
    pub description_prefix: String,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            folder: DEFAULT_OUTPUT_FOLDER.to_string(),
            description_prefix: DEFAULT_DESCRIPTION_PREFIX.to_string(),
        }
    }
}

impl OutputSettings {
    /// 区域导出任务名
    pub fn description_for(&self, region_id: u32) -> String {
        format!("{}{}", self.description_prefix, region_id)
    }
}

/// 本地平台设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformSettings {
    pub catalog_root: PathBuf,
    pub output_root: PathBuf,
    /// None 时使用默认台账路径
    pub ledger_path: Option<String>,
    pub queue_ceiling: usize,
}

impl Default for PlatformSettings {
    fn default() -> Self {
        Self {
            catalog_root: PathBuf::from("."),
            output_root: PathBuf::from("."),
            ledger_path: None,
            queue_ceiling: DEFAULT_MAX_JOBS_PER_BATCH,
        }
    }
}

// ==========================================
// RunConfig
// ==========================================

/// 运行配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub datasets: DatasetRefs,
    #[serde(default)]
    pub years: YearSequence,
    #[serde(default)]
    pub range: RegionRange,
    #[serde(default = "default_max_jobs")]
    pub max_jobs_per_batch: usize,
    #[serde(default)]
    pub reduction: ReduceParams,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub platform: PlatformSettings,
}

fn default_max_jobs() -> usize {
    DEFAULT_MAX_JOBS_PER_BATCH
}

impl RunConfig {
    /// 仅指定数据集，其余取默认值
    pub fn new(datasets: DatasetRefs) -> Self {
        Self {
            datasets,
            years: YearSequence::default(),
            range: RegionRange::default(),
            max_jobs_per_batch: DEFAULT_MAX_JOBS_PER_BATCH,
            reduction: ReduceParams::default(),
            output: OutputSettings::default(),
            platform: PlatformSettings::default(),
        }
    }

    /// 读取 JSON 配置文件
    ///
    /// catalog_root / output_root 为相对路径时，相对于配置文件所在目录
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_json_str(&text)?;

        if let Some(base) = path.parent() {
            if config.platform.catalog_root.is_relative() {
                config.platform.catalog_root = base.join(&config.platform.catalog_root);
            }
            if config.platform.output_root.is_relative() {
                config.platform.output_root = base.join(&config.platform.output_root);
            }
        }
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// 应用进程环境变量覆写
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(
            std::env::vars().filter(|(k, _)| k.starts_with(config_keys::PREFIX)),
        )
    }

    /// 应用覆写（未知键忽略）
    pub fn apply_overrides<I>(&mut self, overrides: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in overrides {
            let value = value.trim().to_string();
            match key.as_str() {
                config_keys::SETTLEMENT_DATASET => self.datasets.settlement = value,
                config_keys::HAZARD_DATASET => self.datasets.hazard = value,
                config_keys::REGIONS_DATASET => self.datasets.regions = value,
                config_keys::YEAR_START => self.years.start = parse_value(&key, &value)?,
                config_keys::YEAR_END => self.years.end = parse_value(&key, &value)?,
                config_keys::YEAR_STEP => self.years.step = parse_value(&key, &value)?,
                config_keys::RANGE_START => self.range.start = parse_value(&key, &value)?,
                config_keys::RANGE_END => {
                    self.range.end = if value.is_empty() {
                        None
                    } else {
                        Some(parse_value(&key, &value)?)
                    }
                }
                config_keys::MAX_JOBS_PER_BATCH => {
                    self.max_jobs_per_batch = parse_value(&key, &value)?
                }
                config_keys::OUTPUT_FOLDER => self.output.folder = value,
                config_keys::OUTPUT_DIR => self.platform.output_root = PathBuf::from(value),
                config_keys::CATALOG_ROOT => self.platform.catalog_root = PathBuf::from(value),
                _ => {
                    tracing::debug!(key = %key, "忽略未知配置覆写键");
                    continue;
                }
            }
            tracing::debug!(key = %key, "已应用配置覆写");
        }
        Ok(())
    }

    /// 配置校验
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("datasets.settlement", &self.datasets.settlement),
            ("datasets.hazard", &self.datasets.hazard),
            ("datasets.regions", &self.datasets.regions),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "数据集 ID 不能为空"));
            }
        }
        if !self.datasets.hazard_nodata_fill.is_finite() || self.datasets.hazard_nodata_fill < 0.0 {
            return Err(ConfigError::invalid(
                "datasets.hazard_nodata_fill",
                "填充值必须为非负有限数",
            ));
        }

        self.years.validate()?;

        if self.max_jobs_per_batch == 0 {
            return Err(ConfigError::invalid("max_jobs_per_batch", "必须 ≥ 1"));
        }
        if let Some(end) = self.range.end {
            if end < self.range.start {
                return Err(ConfigError::invalid(
                    "range",
                    format!("结束序号 {} 小于起始序号 {}", end, self.range.start),
                ));
            }
            if end - self.range.start > self.max_jobs_per_batch {
                return Err(ConfigError::invalid(
                    "range",
                    format!(
                        "范围 [{}, {}) 共 {} 个区域，超过单批上限 {}，请拆分为多次运行",
                        self.range.start,
                        end,
                        end - self.range.start,
                        self.max_jobs_per_batch
                    ),
                ));
            }
        }

        self.reduction
            .validate()
            .map_err(|e| ConfigError::invalid("reduction", e.to_string()))?;

        if self.output.folder.trim().is_empty() {
            return Err(ConfigError::invalid("output.folder", "输出目录名不能为空"));
        }
        if self.platform.queue_ceiling == 0 {
            return Err(ConfigError::invalid("platform.queue_ceiling", "必须 ≥ 1"));
        }
        Ok(())
    }

    /// 本地会话参数
    pub fn local_session_settings(&self) -> LocalSessionSettings {
        LocalSessionSettings {
            catalog_root: self.platform.catalog_root.clone(),
            output_root: self.platform.output_root.clone(),
            ledger_path: self
                .platform
                .ledger_path
                .clone()
                .unwrap_or_else(get_default_ledger_path),
            queue_ceiling: self.platform.queue_ceiling,
        }
    }
}

fn parse_value<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::ConfigValueError {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}
