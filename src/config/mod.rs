// ==========================================
// 城镇洪涝暴露统计 - 配置层
// ==========================================
// 职责: 运行配置加载、环境变量覆写、校验
// 来源: JSON 配置文件 + WSF_EXPOSURE_* 环境变量
// ==========================================

pub mod config_reader;
pub mod error;
pub mod run_config;

pub use config_reader::RunConfigReader;
pub use error::{ConfigError, ConfigResult};
pub use run_config::{
    config_keys, DatasetRefs, OutputSettings, PlatformSettings, RegionRange, RunConfig,
    YearSequence, DEFAULT_MAX_JOBS_PER_BATCH,
};
