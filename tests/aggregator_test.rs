// ==========================================
// 聚落暴露聚合器集成测试
// ==========================================
// 测试目标: 基于本地数据集目录验证面积统计、分级一致性、年份单调性
// ==========================================


use serde_json::json;
use test_helpers::*;
use wsf_flood_exposure::config::YearSequence;
use geo::Polygon;
use wsf_flood_exposure::domain::geometry::{rectangle, ring};
use wsf_flood_exposure::domain::{Geometry, HazardClass, RawFeature, Region, RegionAttributeSet};
use wsf_flood_exposure::engine::{ExposureInputs, HazardClassifier, SettlementExposureAggregator};
use wsf_flood_exposure::platform::{
    FeatureStore, GeoTransform, LocalCatalog, Raster, RasterEngine, ReduceParams,
};

const TOL: f64 = 1e-9;

fn region(id: u32, geometry: Geometry) -> Region {
    Region::new(
        id,
        RawFeature {
            native_key: format!("key-{}", id),
            geometry,
            attributes: Default::default(),
        },
    )
}

async fn load_inputs(catalog: &LocalCatalog, nodata_fill: f64) -> ExposureInputs {
    let settlement = catalog.load_image(SETTLEMENT_ID).await.unwrap();
    let hazard = catalog.load_image(HAZARD_ID).await.unwrap();
    ExposureInputs::new(
        settlement,
        HazardClassifier::new(nodata_fill).classify(&hazard),
    )
}

fn field(set: &RegionAttributeSet, name: &str) -> f64 {
    set.get(name)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("missing field {}", name))
}

#[tokio::test]
async fn test_square_region_settled_in_1990_with_moderate_depth() {
    test_helpers::init_logging();

    // 300 m × 300 m，1990 年整体成为聚落，水深 0.3 m
    let dir = TestCatalog::new();
    dir.write_raster(SETTLEMENT_ID, &square_raster("wsf", 10, Some(1990.0)));
    dir.write_raster(HAZARD_ID, &square_raster("depth", 10, Some(0.3)));
    let catalog = dir.catalog();
    let inputs = load_inputs(&catalog, 0.0).await;

    let r = region(1, Geometry::rectangle(0.0, 0.0, 300.0, 300.0));
    let aggregator = SettlementExposureAggregator::new(catalog.clone(), ReduceParams::default());

    let mut set = RegionAttributeSet::from_region(&r);
    for year in YearSequence::new(1985, 1990, 1).years() {
        aggregator.accumulate(&inputs, &r, year, &mut set).await.unwrap();
    }

    let area_km2 = 0.09;
    assert_eq!(field(&set, "SE_1985"), 0.0);
    assert!((field(&set, "SE_1990") - area_km2).abs() < TOL);
    assert!((field(&set, "SE_050_1990") - area_km2).abs() < TOL);
    for name in ["SE_0_1990", "SE_015_1990", "SE_150_1990", "SE_150p_1990"] {
        assert_eq!(field(&set, name), 0.0, "{}", name);
    }
    for name in ["SE_0_1985", "SE_015_1985", "SE_050_1985", "SE_150_1985", "SE_150p_1985"] {
        assert_eq!(field(&set, name), 0.0, "{}", name);
    }
    // 每个区域 6 次规约 × 6 个年份
    assert_eq!(catalog.reduction_count(), 36);
}

#[tokio::test]
async fn test_totals_match_class_sums_and_grow_over_time() {
    // 6x6 像元: 聚落年份逐列递增，水深覆盖全部等级并含无数据
    let t = GeoTransform::new(0.0, 180.0, CELL);
    let settle_years = [0.0, 1985.0, 1991.0, 1999.0, 2006.0, 2015.0];
    let depths = [
        None,
        Some(0.0),
        Some(0.15),
        Some(0.4),
        Some(1.5),
        Some(3.2),
    ];
    let mut settlement = Raster::filled("wsf", 6, 6, t, None).unwrap();
    let mut hazard = Raster::filled("depth", 6, 6, t, None).unwrap();
    for row in 0..6 {
        for col in 0..6 {
            settlement.set(col, row, Some(settle_years[col]));
            hazard.set(col, row, depths[(row + col) % 6]);
        }
    }
    let dir = TestCatalog::new();
    dir.write_raster(SETTLEMENT_ID, &settlement);
    dir.write_raster(HAZARD_ID, &hazard);
    let catalog = dir.catalog();
    let inputs = load_inputs(&catalog, 0.0).await;

    // 外环 180x180 去掉中间 60x60 的洞，另加一个数据范围外的多边形
    let with_hole = Polygon::new(
        rectangle(0.0, 0.0, 180.0, 180.0).exterior().clone(),
        vec![ring(&[(60.0, 60.0), (120.0, 60.0), (120.0, 120.0), (60.0, 120.0)])],
    );
    let far_away = rectangle(600.0, 600.0, 690.0, 690.0);
    let r = region(7, Geometry::new(vec![with_hole, far_away]));

    let aggregator = SettlementExposureAggregator::new(catalog.clone(), ReduceParams::default());
    let mut previous = 0.0;
    let mut final_total = 0.0;
    for year in YearSequence::yearly_wsf().years() {
        let record = aggregator.compute(&inputs, &r, year).await.unwrap();
        assert!(record.is_consistent(TOL), "year {}: {:?}", year, record);
        assert!(record.total_km2 + TOL >= previous, "year {} decreased", year);
        assert!(record.class_km2.iter().all(|v| *v >= 0.0));
        previous = record.total_km2;
        final_total = record.total_km2;
    }

    // 2015 年: 5 列有聚落（值 0 的列不算），每列 6 格减去洞内的格
    // 洞覆盖第 2、3 列的第 2、3 行
    let cell_km2 = CELL * CELL * 1e-6;
    let expected_cells = 5.0 * 6.0 - 4.0;
    assert!((final_total - expected_cells * cell_km2).abs() < TOL);
}

#[tokio::test]
async fn test_no_settlement_gives_zero_for_every_field() {
    let dir = TestCatalog::new();
    dir.write_raster(SETTLEMENT_ID, &square_raster("wsf", 4, Some(0.0)));
    dir.write_raster(HAZARD_ID, &square_raster("depth", 4, Some(2.0)));
    let catalog = dir.catalog();
    let inputs = load_inputs(&catalog, 0.0).await;

    let r = region(2, Geometry::rectangle(0.0, 0.0, 120.0, 120.0));
    let aggregator = SettlementExposureAggregator::new(catalog, ReduceParams::default());

    let years = YearSequence::five_year_wsf().years();
    let mut set = RegionAttributeSet::from_region(&r);
    for year in &years {
        aggregator.accumulate(&inputs, &r, *year, &mut set).await.unwrap();
    }

    assert_eq!(set.year_count(), years.len());
    for (year, record) in set.years() {
        for (name, value) in record.fields(year) {
            assert_eq!(value, 0.0, "{}", name);
        }
    }
    // 1 个 id 属性 + 每年 6 个字段
    assert_eq!(set.columns().len(), 1 + 6 * years.len());
}

#[tokio::test]
async fn test_hazard_mosaic_later_tile_wins_and_nodata_is_filled() {
    let dir = TestCatalog::new();
    dir.write_raster(SETTLEMENT_ID, &row_raster("wsf", vec![Some(2000.0); 4]));
    // 瓦片 a: 1.0 m（最后一格无数据），瓦片 b 覆盖前 2 格: 3.0 m / 无数据
    dir.write_tile(
        HAZARD_ID,
        "a",
        &row_raster("a", vec![Some(1.0), Some(1.0), Some(1.0), None]),
    );
    dir.write_tile(HAZARD_ID, "b", &row_raster("b", vec![Some(3.0), None]));
    let catalog = dir.catalog();
    let inputs = load_inputs(&catalog, 0.0).await;

    let r = region(3, Geometry::rectangle(0.0, 0.0, 120.0, 30.0));
    let aggregator = SettlementExposureAggregator::new(catalog, ReduceParams::default());
    let record = aggregator.compute(&inputs, &r, 2015).await.unwrap();

    let cell_km2 = CELL * CELL * 1e-6;
    // 第 1 格取上层瓦片 b；第 2 格 b 无数据，取下层 a
    assert!((record.class_area(HazardClass::Above150) - cell_km2).abs() < TOL);
    assert!((record.class_area(HazardClass::UpTo150) - 2.0 * cell_km2).abs() < TOL);
    // 两个瓦片都无数据的第 4 格填充为 0
    assert!((record.class_area(HazardClass::Zero) - cell_km2).abs() < TOL);
    assert!(record.is_consistent(TOL));
}

#[tokio::test]
async fn test_geojson_region_round_trip_through_catalog() {
    let dir = strip_catalog(3);
    dir.write_regions(&json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "id": 42,
            "properties": {"NAME": "all"},
            "geometry": {"type": "Polygon", "coordinates": rectangle_coords(0.0, 0.0, 90.0, 30.0)}
        }]
    }));
    let catalog = dir.catalog();
    let features = catalog.load_features(REGIONS_ID).await.unwrap();
    assert_eq!(features.len(), 1);
    assert_eq!(features[0].native_key, "42");

    let r = Region::new(1, features[0].clone());
    let inputs = load_inputs(&catalog, 0.0).await;
    let aggregator = SettlementExposureAggregator::new(catalog.clone(), ReduceParams::default());
    let record = aggregator.compute(&inputs, &r, 1990).await.unwrap();
    assert!((record.class_area(HazardClass::UpTo050) - 3.0 * CELL * CELL * 1e-6).abs() < TOL);
}
