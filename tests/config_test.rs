// ==========================================
// 运行配置集成测试
// ==========================================
// 测试目标: 配置文件加载、覆写、校验，以及 RunConfig 作为编排器配置源
// ==========================================


use std::sync::Arc;
use test_helpers::*;
use wsf_flood_exposure::config::{
    config_keys, ConfigError, RegionRange, RunConfig, RunConfigReader, YearSequence,
};
use wsf_flood_exposure::engine::{BatchExportOrchestrator, EngineError};

fn write_config(dir: &TestCatalog, text: &str) -> std::path::PathBuf {
    let path = dir.root().join("run.json");
    std::fs::write(&path, text).expect("Failed to write config");
    path
}

#[tokio::test]
async fn test_full_config_file_is_read_through_reader_trait() {
    let dir = TestCatalog::new();
    let path = write_config(
        &dir,
        r#"{
            "datasets": {
                "settlement": "wsf_evolution",
                "hazard": "hazard_depth",
                "regions": "regions.geojson",
                "hazard_nodata_fill": 0.0
            },
            "years": {"start": 1990, "end": 2015, "step": 5},
            "range": {"start": 3000, "end": 6000},
            "max_jobs_per_batch": 3000,
            "reduction": {"scale_m": 30.0, "best_effort": true, "max_pixels": 1e18, "tile_scale": 4},
            "output": {"folder": "Results_5y"},
            "platform": {"catalog_root": ".", "output_root": "out", "ledger_path": ":memory:", "queue_ceiling": 3000}
        }"#,
    );

    let config = RunConfig::from_file(&path).unwrap();
    config.validate().unwrap();

    assert_eq!(
        config.year_sequence().await.unwrap(),
        YearSequence::five_year_wsf()
    );
    assert_eq!(
        config.region_range().await.unwrap(),
        RegionRange::new(3000, Some(6000))
    );
    assert_eq!(config.max_jobs_per_batch().await.unwrap(), 3000);
    assert_eq!(config.reduce_params().await.unwrap().tile_scale, 4);

    let output = config.output_settings().await.unwrap();
    assert_eq!(output.folder, "Results_5y");
    assert_eq!(output.description_prefix, "WSFevolution_ZonalStatistics_");

    let settings = config.local_session_settings();
    assert_eq!(settings.catalog_root, dir.root().join("."));
    assert_eq!(settings.output_root, dir.root().join("out"));
    assert_eq!(settings.ledger_path, ":memory:");
}

#[test]
fn test_overrides_then_validation() {
    let mut config = RunConfig::new(datasets());
    config
        .apply_overrides(vec![
            (config_keys::RANGE_START.to_string(), "0".to_string()),
            (config_keys::RANGE_END.to_string(), "3001".to_string()),
        ])
        .unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { .. })
    ));

    config
        .apply_overrides(vec![(config_keys::RANGE_END.to_string(), String::new())])
        .unwrap();
    assert_eq!(config.range.end, None);
    assert!(config.validate().is_ok());

    config
        .apply_overrides(vec![(config_keys::YEAR_STEP.to_string(), "0".to_string())])
        .unwrap();
    assert!(config.validate().is_err());
}

#[test]
fn test_malformed_config_is_parse_error() {
    let dir = TestCatalog::new();
    let path = write_config(&dir, r#"{"datasets": {"settlement": "wsf"}}"#);
    assert!(matches!(
        RunConfig::from_file(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[tokio::test]
async fn test_run_config_drives_orchestrator() {
    let dir = strip_catalog(6);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let mut config = run_config(&dir, YearSequence::new(1990, 1990, 1), RegionRange::new(2, None));
    config.output.folder = "Batch".to_string();
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 4);
    let jobs = sink.jobs();
    assert!(jobs.iter().all(|j| j.folder == "Batch"));
    assert_eq!(jobs[0].description, "WSFevolution_ZonalStatistics_3");
}

#[tokio::test]
async fn test_invalid_year_sequence_fails_before_computation() {
    let dir = strip_catalog(3);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(YearSequence::new(2000, 1990, 1), RegionRange::new(0, None));
    let err = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::Config(ConfigError::Invalid { .. })));
    assert!(err.is_configuration());
    assert_eq!(sink.count(), 0);
}
