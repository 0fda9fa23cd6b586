// ==========================================
// 城镇洪涝暴露统计 - 本地要素库（GeoJSON）
// ==========================================
// 职责: 读取参考区域 FeatureCollection
// 主键: 要素 id（字符串或数字）；缺失时使用 "#<序号>"（"#0", "#1", ...）
// 几何: 仅支持 Polygon / MultiPolygon，其余类型按空几何处理
// 坐标: 位置至少 2 个分量，多余分量（高程等）忽略；格式错误按空几何处理
// ==========================================

use crate::domain::geometry::Geometry;
use crate::domain::region::{Attributes, RawFeature};
use crate::platform::error::{PlatformError, PlatformResult};
use geo::{Coord, LineString, Polygon};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// 无 id 要素的原生键前缀
pub const POSITIONAL_KEY_PREFIX: &str = "#";

#[derive(Debug, Deserialize)]
struct GeoJsonCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    properties: Option<Attributes>,
    #[serde(default)]
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonGeometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

type Position = Vec<f64>;
type Ring = Vec<Position>;

/// 解析 GeoJSON FeatureCollection 文本
pub fn parse_feature_collection(asset: &str, text: &str) -> PlatformResult<Vec<RawFeature>> {
    let collection: GeoJsonCollection =
        serde_json::from_str(text).map_err(|e| PlatformError::InvalidAsset {
            asset: asset.to_string(),
            message: e.to_string(),
        })?;

    if collection.kind != "FeatureCollection" {
        return Err(PlatformError::InvalidAsset {
            asset: asset.to_string(),
            message: format!("期望 FeatureCollection，实际 {}", collection.kind),
        });
    }

    let mut features = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let native_key = match feature.id {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("{}{}", POSITIONAL_KEY_PREFIX, index),
        };

        let geometry = match feature.geometry {
            Some(g) => convert_geometry(asset, &native_key, g),
            None => Geometry::empty(),
        };

        features.push(RawFeature {
            native_key,
            geometry,
            attributes: feature.properties.unwrap_or_default(),
        });
    }

    Ok(features)
}

/// 读取 GeoJSON 文件
pub fn read_feature_collection(path: &Path) -> PlatformResult<Vec<RawFeature>> {
    let text = std::fs::read_to_string(path)?;
    parse_feature_collection(&path.display().to_string(), &text)
}

/// 转换单个要素几何；无法转换时返回空几何，由编排器按区域标记
fn convert_geometry(asset: &str, key: &str, g: GeoJsonGeometry) -> Geometry {
    let converted = match g.kind.as_str() {
        "Polygon" => serde_json::from_value::<Vec<Ring>>(g.coordinates)
            .map_err(|e| e.to_string())
            .and_then(to_polygon)
            .map(Geometry::from),
        "MultiPolygon" => serde_json::from_value::<Vec<Vec<Ring>>>(g.coordinates)
            .map_err(|e| e.to_string())
            .and_then(|polygons| {
                polygons
                    .into_iter()
                    .map(to_polygon)
                    .collect::<Result<Vec<_>, _>>()
            })
            .map(Geometry::new),
        other => {
            tracing::warn!(asset, key, geometry_type = other, "不支持的几何类型，按空几何处理");
            return Geometry::empty();
        }
    };

    converted.unwrap_or_else(|message| {
        tracing::warn!(asset, key, error = %message, "要素坐标格式错误，按空几何处理");
        Geometry::empty()
    })
}

fn to_polygon(rings: Vec<Ring>) -> Result<Polygon<f64>, String> {
    let mut rings = rings
        .into_iter()
        .map(to_line_string)
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

fn to_line_string(ring: Ring) -> Result<LineString<f64>, String> {
    ring.into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(format!("位置分量不足: {:?}", position)),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(LineString::new)
}
