// ==========================================
// 城镇洪涝暴露统计 - 命令行入口
// ==========================================
// 用法:
//   wsf-flood-exposure <config.json> [range_start] [range_end]
//
// 流程: 读取配置 → 打开本地会话 → 执行一批导出 → 关闭会话（等待导出写完）
// ==========================================

use anyhow::{bail, Context};
use std::path::PathBuf;
use std::sync::Arc;
use wsf_flood_exposure::config::{RegionRange, RunConfig};
use wsf_flood_exposure::engine::BatchExportOrchestrator;
use wsf_flood_exposure::platform::EngineSession;
use wsf_flood_exposure::{logging, APP_NAME, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let config_path = match args.next() {
        Some(p) => PathBuf::from(p),
        None => bail!("用法: wsf-flood-exposure <config.json> [range_start] [range_end]"),
    };
    let range_start = args
        .next()
        .map(|s| s.trim().parse::<usize>())
        .transpose()
        .context("range_start 必须为非负整数")?;
    let range_end = args
        .next()
        .map(|s| s.trim().parse::<usize>())
        .transpose()
        .context("range_end 必须为非负整数")?;

    tracing::info!("==================================================");
    tracing::info!("{} v{}", APP_NAME, VERSION);
    tracing::info!("==================================================");

    let mut config = RunConfig::from_file(&config_path)
        .with_context(|| format!("无法加载配置: {}", config_path.display()))?;
    config.apply_env_overrides()?;
    if let Some(start) = range_start {
        config.range = RegionRange::new(start, range_end);
    }
    config.validate()?;

    let session = EngineSession::open_local(&config.local_session_settings())
        .context("无法打开本地会话")?;

    let orchestrator = BatchExportOrchestrator::new(Arc::new(config));
    let result = orchestrator.run(&session).await;

    // 先关闭会话（等待已提交任务写完），再处理运行结果
    let summary = session.close().await?;
    let report = result?;

    println!(
        "range=[{}, {}) of {} regions, years={}, submitted={}, flagged={}, reductions={}",
        report.plan.start,
        report.plan.end,
        report.plan.total_regions,
        report.years.len(),
        report.submitted_count(),
        report.flagged_count(),
        summary.reductions
    );
    for flagged in &report.flagged {
        for failure in &flagged.failures {
            match failure.year {
                Some(year) => println!(
                    "flagged region id={} key={} year={}: {}",
                    flagged.region_id, flagged.native_key, year, failure.message
                ),
                None => println!(
                    "flagged region id={} key={}: {}",
                    flagged.region_id, flagged.native_key, failure.message
                ),
            }
        }
        if flagged.partial.year_count() > 0 {
            let years: Vec<String> = flagged.partial.years().map(|(y, _)| y.to_string()).collect();
            println!(
                "flagged region id={} partial years: {}",
                flagged.region_id,
                years.join(",")
            );
        }
    }

    Ok(())
}
