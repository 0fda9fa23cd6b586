// ==========================================
// 城镇洪涝暴露统计 - 区域几何
// ==========================================
// 职责: 区域几何（geo::MultiPolygon）、有效性检查、点包含判定
// 坐标系: 平面投影坐标（米），面积按平面计算
// 边界: 落在边界上的点不算包含（geo::Contains 语义）
// ==========================================

use geo::{coord, Area, BoundingRect, Contains, LineString, MultiPolygon, Polygon, Rect};
use thiserror::Error;

pub use geo::Coord;

/// 几何错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("几何为空")]
    Empty,

    #[error("环顶点数不足 (polygon={polygon}, ring={ring}): 至少需要 3 个不同顶点，实际 {count}")]
    TooFewVertices {
        polygon: usize,
        ring: usize,
        count: usize,
    },

    #[error("坐标非有限值 (polygon={polygon}, ring={ring})")]
    NonFiniteCoordinate { polygon: usize, ring: usize },

    #[error("面积为 0 (polygon={0})")]
    ZeroArea(usize),
}

/// 轴对齐矩形多边形
pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
    Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }).to_polygon()
}

/// 由坐标序列构造环（自动闭合）
pub fn ring(points: &[(f64, f64)]) -> LineString<f64> {
    LineString::from(points.to_vec())
}

// ==========================================
// Geometry
// ==========================================

/// 区域几何
///
/// Polygon 与 MultiPolygon 统一为 MultiPolygon；空 MultiPolygon 表示缺失几何
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry(MultiPolygon<f64>);

impl Geometry {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        Self(MultiPolygon::new(polygons))
    }

    /// 空几何（缺失、不支持或坐标格式错误）
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::from(rectangle(min_x, min_y, max_x, max_y))
    }

    pub fn polygons(&self) -> &[Polygon<f64>] {
        &self.0 .0
    }

    pub fn as_multi_polygon(&self) -> &MultiPolygon<f64> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.polygons().iter().all(|p| p.exterior().0.is_empty())
    }

    /// 有效性检查
    ///
    /// 检查项: 非空、坐标有限、每个环至少 3 个不同顶点、面积 > 0
    pub fn validate(&self) -> Result<(), GeometryError> {
        if self.is_empty() {
            return Err(GeometryError::Empty);
        }

        for (pi, polygon) in self.polygons().iter().enumerate() {
            let rings = std::iter::once(polygon.exterior()).chain(polygon.interiors());
            for (ri, ring) in rings.enumerate() {
                if ring.coords().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
                    return Err(GeometryError::NonFiniteCoordinate {
                        polygon: pi,
                        ring: ri,
                    });
                }
                let distinct = distinct_vertex_count(ring);
                if distinct < 3 {
                    return Err(GeometryError::TooFewVertices {
                        polygon: pi,
                        ring: ri,
                        count: distinct,
                    });
                }
            }
            if polygon.unsigned_area() == 0.0 {
                return Err(GeometryError::ZeroArea(pi));
            }
        }

        Ok(())
    }

    /// 外包矩形（空几何返回 None）
    pub fn bbox(&self) -> Option<Rect<f64>> {
        self.0.bounding_rect()
    }

    /// 点是否落在几何内部（洞内不算）
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let c = coord! { x: x, y: y };
        self.polygons().iter().any(|p| p.contains(&c))
    }

    /// 平面面积（平方米）
    pub fn area(&self) -> f64 {
        self.0.unsigned_area()
    }
}

impl From<Polygon<f64>> for Geometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::new(vec![polygon])
    }
}

impl From<MultiPolygon<f64>> for Geometry {
    fn from(multi: MultiPolygon<f64>) -> Self {
        Self(multi)
    }
}

fn distinct_vertex_count(ring: &LineString<f64>) -> usize {
    let mut seen: Vec<Coord<f64>> = Vec::with_capacity(ring.0.len());
    for c in ring.coords() {
        if !seen.contains(c) {
            seen.push(*c);
        }
    }
    seen.len()
}
