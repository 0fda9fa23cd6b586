// ==========================================
// 批量导出编排器端到端测试
// ==========================================
// 测试目标:
// - 区域范围 [start, end) 与单批上限
// - 导出任务命名 / 目录 / 单行表格内容
// - 几何错误跳过并标记，不影响其他区域
// - 队列准入失败终止运行
// - 本地会话: CSV 文件 + 任务台账
// ==========================================


use serde_json::json;
use std::sync::Arc;
use test_helpers::*;
use wsf_flood_exposure::config::{RegionRange, YearSequence};
use wsf_flood_exposure::domain::ExportJobStatus;
use wsf_flood_exposure::engine::{BatchExportOrchestrator, EngineError, RegionPhase};
use wsf_flood_exposure::platform::EngineSession;

fn single_year() -> YearSequence {
    YearSequence::new(1990, 1990, 1)
}

#[tokio::test]
async fn test_range_of_3000_submits_exactly_3000_jobs() {
    let dir = strip_catalog(3000);
    let sink = Arc::new(RecordingExportSink::new(3000));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(single_year(), RegionRange::new(0, Some(3000)));
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 3000);
    assert_eq!(report.flagged_count(), 0);
    assert_eq!(sink.count(), 3000);

    let jobs = sink.jobs();
    assert_eq!(jobs[0].description, "WSFevolution_ZonalStatistics_1");
    assert_eq!(jobs[2999].description, "WSFevolution_ZonalStatistics_3000");
    assert!(jobs.iter().all(|j| j.folder == "Results"));
}

#[tokio::test]
async fn test_default_range_never_exceeds_batch_ceiling() {
    let dir = strip_catalog(3001);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(single_year(), RegionRange::new(0, None));
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!((report.plan.start, report.plan.end), (0, 3000));
    assert_eq!(sink.count(), 3000);
}

#[tokio::test]
async fn test_range_wider_than_ceiling_fails_before_any_submission() {
    let dir = strip_catalog(10);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let mut config = MockRunConfig::new(single_year(), RegionRange::new(0, Some(10)));
    config.max_jobs_per_batch = 5;
    let err = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_second_batch_selects_ids_by_index_plus_one() {
    let dir = strip_catalog(8);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(
        YearSequence::new(1985, 1995, 5),
        RegionRange::new(5, Some(20)),
    );
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    // end 截断到区域总数
    assert_eq!((report.plan.start, report.plan.end), (5, 8));
    assert_eq!(report.years, vec![1985, 1990, 1995]);

    let descriptions: Vec<String> = sink.jobs().into_iter().map(|j| j.description).collect();
    assert_eq!(
        descriptions,
        vec![
            "WSFevolution_ZonalStatistics_6",
            "WSFevolution_ZonalStatistics_7",
            "WSFevolution_ZonalStatistics_8",
        ]
    );

    // 单行表格: 原始属性 + id，随后按年份递增的 6 个字段
    let table = &sink.jobs()[0].table;
    assert_eq!(table.rows.len(), 1);
    assert_eq!(
        &table.columns[..8],
        &[
            "NAME", "id", "SE_1985", "SE_0_1985", "SE_015_1985", "SE_050_1985", "SE_150_1985",
            "SE_150p_1985"
        ]
    );
    assert_eq!(table.columns.len(), 2 + 6 * 3);
    assert_eq!(table.rows[0][0], "cell-5");
    assert_eq!(table.rows[0][1], "6");
    let se_1990 = table.columns.iter().position(|c| c == "SE_050_1990").unwrap();
    let value: f64 = table.rows[0][se_1990].parse().unwrap();
    assert!((value - CELL * CELL * 1e-6).abs() < 1e-12);
}

#[tokio::test]
async fn test_invalid_geometry_is_flagged_and_other_regions_continue() {
    let dir = strip_catalog(3);
    let mut regions = strip_regions(3);
    regions["features"][1]["geometry"] = json!(null);
    dir.write_regions(&regions);

    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(YearSequence::new(1990, 2000, 5), RegionRange::new(0, None));
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 2);
    assert_eq!(report.flagged_count(), 1);
    let flagged = &report.flagged[0];
    assert_eq!(flagged.region_id, 2);
    assert_eq!(flagged.phase, RegionPhase::Accumulating { year: 1990 });
    assert_eq!(flagged.failures.len(), 1);
    assert_eq!(flagged.failures[0].year, None);

    let descriptions: Vec<String> = sink.jobs().into_iter().map(|j| j.description).collect();
    assert_eq!(
        descriptions,
        vec!["WSFevolution_ZonalStatistics_1", "WSFevolution_ZonalStatistics_3"]
    );
}

#[tokio::test]
async fn test_elevation_positions_load_and_malformed_coordinates_flag_one_region() {
    let dir = strip_catalog(3);
    let mut regions = strip_regions(3);
    regions["features"][0]["geometry"]["coordinates"] =
        json!([[[0.0, 0.0, 12.0], [30.0, 0.0, 12.0], [30.0, 30.0, 12.5], [0.0, 30.0, 12.0], [0.0, 0.0, 12.0]]]);
    regions["features"][1]["geometry"]["coordinates"] = json!([[[30.0], [60.0, 0.0], [60.0, 30.0]]]);
    dir.write_regions(&regions);

    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(single_year(), RegionRange::new(0, None));
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 2);
    assert_eq!(report.flagged_count(), 1);
    assert_eq!(report.flagged[0].region_id, 2);

    let first = &sink.jobs()[0];
    assert_eq!(first.description, "WSFevolution_ZonalStatistics_1");
    let se = first.table.columns.iter().position(|c| c == "SE_1990").unwrap();
    let value: f64 = first.table.rows[0][se].parse().unwrap();
    assert!((value - CELL * CELL * 1e-6).abs() < 1e-12);
}

#[tokio::test]
async fn test_reduction_failure_is_reported_per_region_and_year() {
    let dir = strip_catalog(2);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let mut config = MockRunConfig::new(YearSequence::new(1990, 1991, 1), RegionRange::new(0, None));
    config.params.best_effort = false;
    config.params.max_pixels = 1.0;
    config.params.scale_m = 10.0;
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();

    assert_eq!(report.submitted_count(), 0);
    assert_eq!(report.flagged_count(), 2);
    for flagged in &report.flagged {
        let years: Vec<Option<i32>> = flagged.failures.iter().map(|f| f.year).collect();
        assert_eq!(years, vec![Some(1990), Some(1991)]);
    }
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_queue_full_stops_run_and_keeps_submitted_jobs() {
    let dir = strip_catalog(5);
    let sink = Arc::new(RecordingExportSink::new(2));
    let session = recording_session(&dir, sink.clone());

    let config = MockRunConfig::new(single_year(), RegionRange::new(0, None));
    let err = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::QueueAdmission { region_id: 3, .. }));
    assert!(err.is_configuration());
    assert_eq!(sink.count(), 2);
}

#[tokio::test]
async fn test_missing_dataset_is_configuration_error() {
    let dir = strip_catalog(2);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());

    let mut config = MockRunConfig::new(single_year(), RegionRange::new(0, None));
    config.datasets.hazard = "no_such_hazard".to_string();
    let err = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn test_local_session_writes_csv_and_ledger() {
    init_logging();

    let dir = strip_catalog(4);
    let config = run_config(&dir, YearSequence::five_year_wsf(), RegionRange::new(0, None));
    config.validate().unwrap();

    let session = EngineSession::open_local(&config.local_session_settings()).unwrap();
    let report = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap();
    assert_eq!(report.submitted_count(), 4);

    let ledger = session.ledger().cloned().unwrap();
    let summary = session.close().await.unwrap();
    assert_eq!(summary.reductions, 4 * 6 * 6);

    let succeeded = ledger.list_by_status(ExportJobStatus::Succeeded).unwrap();
    assert_eq!(succeeded.len(), 4);
    assert_eq!(ledger.count_active().unwrap(), 0);

    for id in 1..=4 {
        let path = dir
            .output_root()
            .join("Results")
            .join(format!("WSFevolution_ZonalStatistics_{}.csv", id));
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[1], "id");
        assert_eq!(headers.len(), 2 + 6 * 6);
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][1], id.to_string().as_str());
    }
}

#[tokio::test]
async fn test_closed_session_cannot_run() {
    let dir = strip_catalog(2);
    let sink = Arc::new(RecordingExportSink::new(usize::MAX));
    let session = recording_session(&dir, sink.clone());
    session.close().await.unwrap();

    let config = MockRunConfig::new(single_year(), RegionRange::new(0, None));
    let err = BatchExportOrchestrator::new(Arc::new(config))
        .run(&session)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Platform(wsf_flood_exposure::platform::PlatformError::SessionClosed)
    ));
}
