// ==========================================
// 城镇洪涝暴露统计 - 本地栅格
// ==========================================
// 职责: 规则格网栅格、最近像元取值、JSON 栅格文件读取
// 约定: 原点为左上角，行号向下递增，像元为正方形（米）
// ==========================================

use crate::platform::error::{PlatformError, PlatformResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 仿射变换（无旋转）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_size: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, cell_size: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            cell_size,
        }
    }
}

/// 单波段栅格，None 表示无数据（masked）
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub name: String,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    values: Vec<Option<f64>>,
}

impl Raster {
    /// 创建栅格，values 按行优先排列
    pub fn new(
        name: impl Into<String>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        values: Vec<Option<f64>>,
    ) -> PlatformResult<Self> {
        let name = name.into();
        if values.len() != width * height {
            return Err(PlatformError::InvalidAsset {
                asset: name,
                message: format!(
                    "像元数不匹配: {}x{} 需要 {} 个值，实际 {}",
                    width,
                    height,
                    width * height,
                    values.len()
                ),
            });
        }
        if !(transform.cell_size.is_finite() && transform.cell_size > 0.0) {
            return Err(PlatformError::InvalidAsset {
                asset: name,
                message: format!("像元大小无效: {}", transform.cell_size),
            });
        }
        Ok(Self {
            name,
            width,
            height,
            transform,
            values,
        })
    }

    /// 全部像元为同一值
    pub fn filled(
        name: impl Into<String>,
        width: usize,
        height: usize,
        transform: GeoTransform,
        value: Option<f64>,
    ) -> PlatformResult<Self> {
        Self::new(name, width, height, transform, vec![value; width * height])
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.values[row * self.width + col]
    }

    pub fn set(&mut self, col: usize, row: usize, value: Option<f64>) {
        if col < self.width && row < self.height {
            self.values[row * self.width + col] = value;
        }
    }

    /// 取包含点 (x, y) 的像元值，范围外返回 None
    pub fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let t = &self.transform;
        let col = ((x - t.origin_x) / t.cell_size).floor();
        let row = ((t.origin_y - y) / t.cell_size).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        self.get(col as usize, row as usize)
    }

    /// 像元中心坐标
    pub fn cell_center(&self, col: usize, row: usize) -> (f64, f64) {
        let t = &self.transform;
        (
            t.origin_x + (col as f64 + 0.5) * t.cell_size,
            t.origin_y - (row as f64 + 0.5) * t.cell_size,
        )
    }

    /// 所有有值像元 (col, row, value)
    pub fn defined_cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.values.iter().enumerate().filter_map(move |(i, v)| {
            v.map(|value| (i % self.width, i / self.width, value))
        })
    }
}

// ==========================================
// 栅格文件（JSON）
// ==========================================

/// 栅格 JSON 文件格式
///
/// 等于 nodata 或为 null 的值视为无数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterFile {
    #[serde(default)]
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_size: f64,
    #[serde(default)]
    pub nodata: Option<f64>,
    pub values: Vec<Option<f64>>,
}

impl RasterFile {
    pub fn into_raster(self, fallback_name: &str) -> PlatformResult<Raster> {
        let nodata = self.nodata;
        let values = self
            .values
            .into_iter()
            .map(|v| match v {
                Some(x) if x.is_nan() => None,
                Some(x) if Some(x) == nodata => None,
                other => other,
            })
            .collect();
        Raster::new(
            self.name.unwrap_or_else(|| fallback_name.to_string()),
            self.width,
            self.height,
            GeoTransform::new(self.origin_x, self.origin_y, self.cell_size),
            values,
        )
    }

    pub fn from_raster(raster: &Raster, nodata: Option<f64>) -> Self {
        Self {
            name: Some(raster.name.clone()),
            width: raster.width,
            height: raster.height,
            origin_x: raster.transform.origin_x,
            origin_y: raster.transform.origin_y,
            cell_size: raster.transform.cell_size,
            nodata,
            values: raster
                .values
                .iter()
                .map(|v| match (v, nodata) {
                    (None, Some(nd)) => Some(nd),
                    (other, _) => *other,
                })
                .collect(),
        }
    }
}

/// 读取 JSON 栅格文件
pub fn read_raster_file(path: &Path) -> PlatformResult<Raster> {
    let asset = path.display().to_string();
    let text = std::fs::read_to_string(path)?;
    let file: RasterFile = serde_json::from_str(&text).map_err(|e| PlatformError::InvalidAsset {
        asset: asset.clone(),
        message: e.to_string(),
    })?;
    file.into_raster(&asset)
}

/// 写出 JSON 栅格文件
pub fn write_raster_file(path: &Path, raster: &Raster, nodata: Option<f64>) -> PlatformResult<()> {
    let file = RasterFile::from_raster(raster, nodata);
    std::fs::write(path, serde_json::to_string(&file)?)?;
    Ok(())
}
