// ==========================================
// 城镇洪涝暴露统计 - 计算平台会话
// ==========================================
// 职责: 定义栅格引擎 / 要素库接口；显式的会话句柄（open → close）
// 说明: 各组件通过会话句柄访问平台，不使用全局会话
// 本地实现: LocalCatalog 以目录为数据集根
//   - 栅格数据集: <root>/<id>.json 单文件，或 <root>/<id>/ 目录（多瓦片镶嵌）
//   - 区域数据集: <root>/<id>（GeoJSON FeatureCollection）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::geometry::Geometry;
use crate::domain::region::RawFeature;
use crate::platform::error::{PlatformError, PlatformResult};
use crate::platform::export::{ExportSink, LocalExportSink};
use crate::platform::feature_store::read_feature_collection;
use crate::platform::image::Image;
use crate::platform::raster::read_raster_file;
use crate::platform::reducer::{reduce_sum, ReduceParams};
use crate::repository::export_job_repo::ExportJobRepository;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ==========================================
// 平台接口
// ==========================================

/// 栅格引擎
#[async_trait]
pub trait RasterEngine: Send + Sync {
    /// 解析数据集并返回（镶嵌后的）影像
    async fn load_image(&self, dataset_id: &str) -> PlatformResult<Image>;

    /// 区域求和；没有任何未掩膜像元时返回 None
    async fn reduce_sum(
        &self,
        image: &Image,
        geometry: &Geometry,
        params: &ReduceParams,
    ) -> PlatformResult<Option<f64>>;
}

/// 要素库
#[async_trait]
pub trait FeatureStore: Send + Sync {
    /// 按要素库原始顺序返回全部要素
    async fn load_features(&self, dataset_id: &str) -> PlatformResult<Vec<RawFeature>>;
}

// ==========================================
// LocalCatalog - 本地目录数据集
// ==========================================

/// 本地栅格引擎 + 要素库
pub struct LocalCatalog {
    root: PathBuf,
    reductions: AtomicU64,
}

impl LocalCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            reductions: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 已执行的规约次数
    pub fn reduction_count(&self) -> u64 {
        self.reductions.load(Ordering::Relaxed)
    }

    fn resolve(&self, dataset_id: &str) -> PlatformResult<PathBuf> {
        let id = dataset_id.trim();
        if id.is_empty() {
            return Err(PlatformError::AssetNotFound("(空数据集 ID)".to_string()));
        }
        let direct = self.root.join(id);
        if direct.exists() {
            return Ok(direct);
        }
        let with_ext = self.root.join(format!("{}.json", id));
        if with_ext.exists() {
            return Ok(with_ext);
        }
        Err(PlatformError::AssetNotFound(id.to_string()))
    }
}

#[async_trait]
impl RasterEngine for LocalCatalog {
    async fn load_image(&self, dataset_id: &str) -> PlatformResult<Image> {
        let path = self.resolve(dataset_id)?;

        let mut tiles = Vec::new();
        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(&path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
                .collect();
            files.sort();
            for file in files {
                tiles.push(Arc::new(read_raster_file(&file)?));
            }
            if tiles.is_empty() {
                return Err(PlatformError::InvalidAsset {
                    asset: dataset_id.to_string(),
                    message: "影像集合为空".to_string(),
                });
            }
        } else {
            tiles.push(Arc::new(read_raster_file(&path)?));
        }

        tracing::debug!(dataset_id, tiles = tiles.len(), "影像加载完成");
        Ok(Image::mosaic(tiles))
    }

    async fn reduce_sum(
        &self,
        image: &Image,
        geometry: &Geometry,
        params: &ReduceParams,
    ) -> PlatformResult<Option<f64>> {
        self.reductions.fetch_add(1, Ordering::Relaxed);
        let reduction = reduce_sum(image, geometry, params)?;
        tracing::trace!(
            pixels = reduction.pixel_count,
            scale_m = reduction.scale_m,
            tile_scale = params.tile_scale,
            "区域规约完成"
        );
        Ok(reduction.sum)
    }
}

#[async_trait]
impl FeatureStore for LocalCatalog {
    async fn load_features(&self, dataset_id: &str) -> PlatformResult<Vec<RawFeature>> {
        let path = self.resolve(dataset_id)?;
        if path.is_dir() {
            return Err(PlatformError::InvalidAsset {
                asset: dataset_id.to_string(),
                message: "区域数据集必须是单个 GeoJSON 文件".to_string(),
            });
        }
        read_feature_collection(&path)
    }
}

// ==========================================
// EngineSession - 会话句柄
// ==========================================

/// 本地会话参数
#[derive(Debug, Clone)]
pub struct LocalSessionSettings {
    /// 数据集根目录
    pub catalog_root: PathBuf,
    /// 导出根目录
    pub output_root: PathBuf,
    /// 导出任务台账（SQLite 路径，":memory:" 为内存库）
    pub ledger_path: String,
    /// 平台队列上限
    pub queue_ceiling: usize,
}

/// 会话关闭摘要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub reductions: u64,
}

/// 平台会话句柄
///
/// 生命周期: open → (各组件使用) → close；close 后不可再使用
pub struct EngineSession {
    raster: Arc<dyn RasterEngine>,
    features: Arc<dyn FeatureStore>,
    export: Arc<dyn ExportSink>,
    local: Option<Arc<LocalCatalog>>,
    ledger: Option<Arc<ExportJobRepository>>,
    closed: AtomicBool,
}

impl EngineSession {
    /// 由任意平台实现组装会话
    pub fn from_parts(
        raster: Arc<dyn RasterEngine>,
        features: Arc<dyn FeatureStore>,
        export: Arc<dyn ExportSink>,
    ) -> Self {
        Self {
            raster,
            features,
            export,
            local: None,
            ledger: None,
            closed: AtomicBool::new(false),
        }
    }

    /// 打开本地会话（需在 tokio 运行时内调用）
    pub fn open_local(settings: &LocalSessionSettings) -> PlatformResult<Self> {
        if !settings.catalog_root.is_dir() {
            return Err(PlatformError::AssetNotFound(format!(
                "数据集根目录不存在: {}",
                settings.catalog_root.display()
            )));
        }

        let conn = open_sqlite_connection(&settings.ledger_path)
            .map_err(|e| PlatformError::Repository(e.into()))?;
        let ledger = Arc::new(ExportJobRepository::new(Arc::new(Mutex::new(conn)))?);

        let sink = LocalExportSink::new(
            settings.output_root.clone(),
            settings.queue_ceiling,
            ledger.clone(),
        );
        sink.recover_interrupted()?;
        sink.start()?;

        let catalog = Arc::new(LocalCatalog::new(settings.catalog_root.clone()));

        tracing::info!(
            catalog_root = %settings.catalog_root.display(),
            output_root = %settings.output_root.display(),
            ledger = %settings.ledger_path,
            queue_ceiling = settings.queue_ceiling,
            "本地会话已打开"
        );

        Ok(Self {
            raster: catalog.clone(),
            features: catalog.clone(),
            export: Arc::new(sink),
            local: Some(catalog),
            ledger: Some(ledger),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> PlatformResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PlatformError::SessionClosed);
        }
        Ok(())
    }

    pub fn raster(&self) -> PlatformResult<&Arc<dyn RasterEngine>> {
        self.ensure_open()?;
        Ok(&self.raster)
    }

    pub fn features(&self) -> PlatformResult<&Arc<dyn FeatureStore>> {
        self.ensure_open()?;
        Ok(&self.features)
    }

    pub fn export(&self) -> PlatformResult<&Arc<dyn ExportSink>> {
        self.ensure_open()?;
        Ok(&self.export)
    }

    /// 本地会话的导出台账（其他实现为 None）
    pub fn ledger(&self) -> Option<&Arc<ExportJobRepository>> {
        self.ledger.as_ref()
    }

    /// 关闭会话：关闭导出服务（等待已排队任务交付）
    pub async fn close(&self) -> PlatformResult<SessionSummary> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(PlatformError::SessionClosed);
        }
        self.export.shutdown().await?;

        let summary = SessionSummary {
            reductions: self
                .local
                .as_ref()
                .map(|c| c.reduction_count())
                .unwrap_or(0),
        };
        tracing::info!(reductions = summary.reductions, "会话已关闭");
        Ok(summary)
    }
}
