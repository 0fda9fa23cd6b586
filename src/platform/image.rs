// ==========================================
// 城镇洪涝暴露统计 - 影像表达式
// ==========================================
// 职责: 惰性影像运算（裁剪、掩膜、填充、比较、相乘、像元面积）
// 说明: 表达式只描述运算，按采样点求值；None 表示该点被掩膜
// ==========================================

use crate::domain::geometry::Geometry;
use crate::platform::raster::Raster;
use std::sync::Arc;

/// 比较运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Lte,
}

impl CompareOp {
    fn apply(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Eq => lhs == rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Lte => lhs <= rhs,
        }
    }
}

/// 采样上下文
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleContext {
    pub x: f64,
    pub y: f64,
    /// 当前规约尺度下的像元面积（平方米）
    pub pixel_area_m2: f64,
}

#[derive(Debug)]
enum ImageNode {
    /// 影像集合镶嵌，后面的瓦片覆盖前面的
    Mosaic(Vec<Arc<Raster>>),
    Constant(f64),
    PixelArea,
    Clip {
        source: Image,
        geometry: Arc<Geometry>,
    },
    UpdateMask {
        source: Image,
        mask: Image,
    },
    Unmask {
        source: Image,
        fill: f64,
    },
    Compare {
        source: Image,
        op: CompareOp,
        value: f64,
    },
    And(Image, Image),
    Multiply(Image, Image),
    Scale {
        source: Image,
        factor: f64,
    },
}

/// 影像表达式句柄（克隆开销为一次引用计数）
#[derive(Debug, Clone)]
pub struct Image(Arc<ImageNode>);

impl Image {
    fn node(node: ImageNode) -> Self {
        Image(Arc::new(node))
    }

    // ==========================================
    // 构造
    // ==========================================

    pub fn mosaic(tiles: Vec<Arc<Raster>>) -> Self {
        Self::node(ImageNode::Mosaic(tiles))
    }

    pub fn from_raster(raster: Raster) -> Self {
        Self::mosaic(vec![Arc::new(raster)])
    }

    pub fn constant(value: f64) -> Self {
        Self::node(ImageNode::Constant(value))
    }

    /// 像元面积（平方米），随规约尺度变化
    pub fn pixel_area() -> Self {
        Self::node(ImageNode::PixelArea)
    }

    // ==========================================
    // 运算
    // ==========================================

    /// 几何外的像元被掩膜
    pub fn clip(&self, geometry: Arc<Geometry>) -> Self {
        Self::node(ImageNode::Clip {
            source: self.clone(),
            geometry,
        })
    }

    /// mask 为 0 或被掩膜的位置，结果被掩膜
    pub fn update_mask(&self, mask: &Image) -> Self {
        Self::node(ImageNode::UpdateMask {
            source: self.clone(),
            mask: mask.clone(),
        })
    }

    /// 被掩膜的位置填充为 fill
    pub fn unmask(&self, fill: f64) -> Self {
        Self::node(ImageNode::Unmask {
            source: self.clone(),
            fill,
        })
    }

    pub fn eq(&self, value: f64) -> Self {
        self.compare(CompareOp::Eq, value)
    }

    pub fn gt(&self, value: f64) -> Self {
        self.compare(CompareOp::Gt, value)
    }

    pub fn lte(&self, value: f64) -> Self {
        self.compare(CompareOp::Lte, value)
    }

    fn compare(&self, op: CompareOp, value: f64) -> Self {
        Self::node(ImageNode::Compare {
            source: self.clone(),
            op,
            value,
        })
    }

    /// 逻辑与（两者均非 0 为 1，否则为 0）
    pub fn and(&self, other: &Image) -> Self {
        Self::node(ImageNode::And(self.clone(), other.clone()))
    }

    pub fn multiply(&self, other: &Image) -> Self {
        Self::node(ImageNode::Multiply(self.clone(), other.clone()))
    }

    pub fn scale(&self, factor: f64) -> Self {
        Self::node(ImageNode::Scale {
            source: self.clone(),
            factor,
        })
    }

    // ==========================================
    // 求值
    // ==========================================

    /// 在采样点求值
    pub fn sample(&self, ctx: &SampleContext) -> Option<f64> {
        match self.0.as_ref() {
            ImageNode::Mosaic(tiles) => tiles.iter().rev().find_map(|t| t.sample(ctx.x, ctx.y)),
            ImageNode::Constant(v) => Some(*v),
            ImageNode::PixelArea => Some(ctx.pixel_area_m2),
            ImageNode::Clip { source, geometry } => {
                if geometry.contains(ctx.x, ctx.y) {
                    source.sample(ctx)
                } else {
                    None
                }
            }
            ImageNode::UpdateMask { source, mask } => match mask.sample(ctx) {
                Some(m) if m != 0.0 => source.sample(ctx),
                _ => None,
            },
            ImageNode::Unmask { source, fill } => Some(source.sample(ctx).unwrap_or(*fill)),
            ImageNode::Compare { source, op, value } => source
                .sample(ctx)
                .map(|v| if op.apply(v, *value) { 1.0 } else { 0.0 }),
            ImageNode::And(a, b) => {
                let (a, b) = (a.sample(ctx)?, b.sample(ctx)?);
                Some(if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 })
            }
            ImageNode::Multiply(a, b) => Some(a.sample(ctx)? * b.sample(ctx)?),
            ImageNode::Scale { source, factor } => source.sample(ctx).map(|v| v * factor),
        }
    }
}
