// ==========================================
// 城镇洪涝暴露统计 - 区域规约（求和）
// ==========================================
// 职责: 在给定尺度的采样格网上对影像按区域求和
// 规则: 采样点为格网像元中心，落在区域内才计入；被掩膜的点不计入
// best_effort: 像元数超过 max_pixels 时逐级放大尺度（×2）直到满足
// ==========================================

use crate::domain::geometry::Geometry;
use crate::platform::error::{PlatformError, PlatformResult};
use crate::platform::image::{Image, SampleContext};
use serde::{Deserialize, Serialize};

/// 默认规约尺度（米）
pub const DEFAULT_SCALE_M: f64 = 30.0;

/// 默认最大像元数
pub const DEFAULT_MAX_PIXELS: f64 = 1e18;

/// 规约参数
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceParams {
    /// 采样尺度（米）
    pub scale_m: f64,
    /// 超出 max_pixels 时是否自动放大尺度
    pub best_effort: bool,
    /// 单次规约允许的最大像元数
    pub max_pixels: f64,
    /// 远程引擎切片系数，本地引擎不使用
    pub tile_scale: u32,
}

impl Default for ReduceParams {
    fn default() -> Self {
        Self {
            scale_m: DEFAULT_SCALE_M,
            best_effort: true,
            max_pixels: DEFAULT_MAX_PIXELS,
            tile_scale: 1,
        }
    }
}

impl ReduceParams {
    pub fn validate(&self) -> PlatformResult<()> {
        if !(self.scale_m.is_finite() && self.scale_m > 0.0) {
            return Err(PlatformError::InvalidReduceParams(format!(
                "scale_m 必须为正数，实际 {}",
                self.scale_m
            )));
        }
        if !(self.max_pixels >= 1.0) {
            return Err(PlatformError::InvalidReduceParams(format!(
                "max_pixels 必须 ≥ 1，实际 {}",
                self.max_pixels
            )));
        }
        if self.tile_scale == 0 {
            return Err(PlatformError::InvalidReduceParams(
                "tile_scale 必须 ≥ 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// 规约结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction {
    /// 求和结果；没有任何未掩膜采样点时为 None
    pub sum: Option<f64>,
    /// 参与求和的采样点数
    pub pixel_count: u64,
    /// 实际使用的尺度（best_effort 可能放大）
    pub scale_m: f64,
}

/// 区域求和
pub fn reduce_sum(
    image: &Image,
    geometry: &Geometry,
    params: &ReduceParams,
) -> PlatformResult<Reduction> {
    params.validate()?;

    let (min, max) = match geometry.bbox() {
        Some(b) => (b.min(), b.max()),
        None => {
            return Ok(Reduction {
                sum: None,
                pixel_count: 0,
                scale_m: params.scale_m,
            })
        }
    };

    // 尺度选择
    let mut scale = params.scale_m;
    loop {
        let pixels = grid_pixels(min.x, max.x, scale) * grid_pixels(min.y, max.y, scale);
        if pixels <= params.max_pixels {
            break;
        }
        if !params.best_effort {
            return Err(PlatformError::TooManyPixels {
                pixels,
                max_pixels: params.max_pixels,
            });
        }
        scale *= 2.0;
    }
    if scale != params.scale_m {
        tracing::debug!(
            requested_scale_m = params.scale_m,
            effective_scale_m = scale,
            "best_effort: 放大规约尺度"
        );
    }

    // 与尺度对齐的采样格网
    let col0 = (min.x / scale).floor() as i64;
    let col1 = (max.x / scale).ceil() as i64;
    let row0 = (min.y / scale).floor() as i64;
    let row1 = (max.y / scale).ceil() as i64;
    let pixel_area_m2 = scale * scale;

    let mut sum = 0.0;
    let mut pixel_count: u64 = 0;
    for row in row0..row1 {
        let y = (row as f64 + 0.5) * scale;
        for col in col0..col1 {
            let x = (col as f64 + 0.5) * scale;
            if !geometry.contains(x, y) {
                continue;
            }
            let ctx = SampleContext {
                x,
                y,
                pixel_area_m2,
            };
            if let Some(v) = image.sample(&ctx) {
                if !v.is_finite() {
                    return Err(PlatformError::ReductionFailed(format!(
                        "采样点 ({}, {}) 值非有限: {}",
                        x, y, v
                    )));
                }
                sum += v;
                pixel_count += 1;
            }
        }
    }

    Ok(Reduction {
        sum: if pixel_count > 0 { Some(sum) } else { None },
        pixel_count,
        scale_m: scale,
    })
}

/// 某一方向上的格网像元数
fn grid_pixels(min: f64, max: f64, scale: f64) -> f64 {
    ((max / scale).ceil() - (min / scale).floor()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(size: f64) -> Geometry {
        Geometry::rectangle(0.0, 0.0, size, size)
    }

    #[test]
    fn test_pixel_area_sum_equals_region_area() {
        let g = square(300.0);
        let r = reduce_sum(&Image::pixel_area(), &g, &ReduceParams::default()).unwrap();
        assert_eq!(r.pixel_count, 100);
        assert_eq!(r.sum, Some(90_000.0));
        assert_eq!(r.scale_m, 30.0);
    }

    #[test]
    fn test_fully_masked_returns_none() {
        let g = square(90.0);
        let masked = Image::constant(1.0).update_mask(&Image::constant(0.0));
        let r = reduce_sum(&masked, &g, &ReduceParams::default()).unwrap();
        assert_eq!(r.sum, None);
        assert_eq!(r.pixel_count, 0);
    }

    #[test]
    fn test_too_many_pixels_without_best_effort() {
        let params = ReduceParams {
            best_effort: false,
            max_pixels: 10.0,
            ..Default::default()
        };
        let err = reduce_sum(&Image::pixel_area(), &square(300.0), &params).unwrap_err();
        assert!(matches!(err, PlatformError::TooManyPixels { .. }));
    }

    #[test]
    fn test_best_effort_coarsens_scale_and_preserves_area() {
        let params = ReduceParams {
            max_pixels: 30.0,
            ..Default::default()
        };
        let r = reduce_sum(&Image::pixel_area(), &square(480.0), &params).unwrap();
        assert!(r.scale_m > 30.0);
        assert_eq!(r.sum, Some(480.0 * 480.0));
    }

    #[test]
    fn test_invalid_params() {
        let params = ReduceParams {
            scale_m: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            reduce_sum(&Image::pixel_area(), &square(30.0), &params),
            Err(PlatformError::InvalidReduceParams(_))
        ));
    }
}
