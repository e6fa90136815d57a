use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use futures::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::cache::FeatureCache;
use crate::db::ImageRecord;
use crate::error::{CacheError, ExtractionError, FetchError};
use crate::extractor::FeatureExtractor;
use crate::fetcher::ImageFetcher;
use crate::index::FeatureIndex;
use crate::metrics;

/// 索引加载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    Empty,
    Syncing,
    Loaded,
    LoadFailed,
}

/// 查询方看到的索引快照，重建完成后整体替换
#[derive(Debug)]
pub enum IndexSnapshot {
    /// 从未完成过加载
    Empty,
    Loaded(FeatureIndex),
    /// 最近一次加载没有得到任何向量
    LoadFailed,
}

/// 一次重载的统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ReloadReport {
    /// 目录中的图片数量（去重后）
    pub catalog_images: usize,
    /// 本轮开始时已缓存的数量
    pub cached: usize,
    /// 本轮新提取并写入缓存的数量
    pub extracted: usize,
    /// 本轮失败的数量，下次重载时会重试
    pub failed: usize,
    /// 最终进入索引的向量数量
    pub indexed: usize,
}

/// 单张图片同步失败的原因
#[derive(Debug, Error)]
enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extract(#[from] ExtractionError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// 负责同步特征缓存并构建内存索引
///
/// 状态：EMPTY → SYNCING → {LOADED | LOAD_FAILED}，之后可以重复进入 SYNCING
pub struct IndexLoader<F> {
    cache: FeatureCache,
    fetcher: F,
    fetch_timeout: Duration,
    workers: usize,
    state: RwLock<IndexState>,
    active: RwLock<Arc<IndexSnapshot>>,
    // 同一时间只允许一个重载
    reload_lock: Mutex<()>,
}

impl<F: ImageFetcher> IndexLoader<F> {
    pub fn new(cache: FeatureCache, fetcher: F, fetch_timeout: Duration, workers: usize) -> Self {
        Self {
            cache,
            fetcher,
            fetch_timeout,
            workers: workers.max(1),
            state: RwLock::new(IndexState::Empty),
            active: RwLock::new(Arc::new(IndexSnapshot::Empty)),
            reload_lock: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &FeatureCache {
        &self.cache
    }

    pub fn state(&self) -> IndexState {
        match self.state.read() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// 获取当前索引快照，返回后不受后续重载影响
    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        match self.active.read() {
            Ok(active) => active.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_state(&self, state: IndexState) {
        match self.state.write() {
            Ok(mut guard) => *guard = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    fn publish(&self, snapshot: IndexSnapshot, state: IndexState) {
        let snapshot = Arc::new(snapshot);
        match self.active.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
        self.set_state(state);
    }

    /// 同步目录与缓存，然后重建索引
    ///
    /// 单张图片的失败只会被记录并跳过，不会中断本轮重载。
    /// 缓存无法读取或提取器维度与缓存不一致时返回错误：
    /// 已加载的索引继续保留，从未加载成功时以 LOAD_FAILED 结束。
    pub async fn reload(
        &self,
        catalog: &[ImageRecord],
        extractor: &Arc<dyn FeatureExtractor>,
    ) -> Result<ReloadReport, CacheError> {
        let _guard = self.reload_lock.lock().await;
        let start = Instant::now();
        self.set_state(IndexState::Syncing);
        info!("开始重载索引，目录共 {} 张图片", catalog.len());

        match self.sync_and_build(catalog, extractor).await {
            Ok((report, index)) => {
                metrics::observe_reload(&report);
                if index.is_empty() {
                    warn!("没有可用的特征向量，索引加载失败");
                    self.publish(IndexSnapshot::LoadFailed, IndexState::LoadFailed);
                } else {
                    info!(
                        "索引加载完成: {} 个向量，新增 {}，失败 {}，耗时 {:.2}s",
                        report.indexed,
                        report.extracted,
                        report.failed,
                        start.elapsed().as_secs_f32()
                    );
                    self.publish(IndexSnapshot::Loaded(index), IndexState::Loaded);
                }
                Ok(report)
            }
            Err(e) => {
                if let IndexSnapshot::Loaded(index) = &*self.snapshot() {
                    warn!("重载失败，继续使用上一次的索引（{} 个向量）: {}", index.len(), e);
                    self.set_state(IndexState::Loaded);
                } else {
                    warn!("重载失败: {}", e);
                    self.publish(IndexSnapshot::LoadFailed, IndexState::LoadFailed);
                }
                Err(e)
            }
        }
    }

    async fn sync_and_build(
        &self,
        catalog: &[ImageRecord],
        extractor: &Arc<dyn FeatureExtractor>,
    ) -> Result<(ReloadReport, FeatureIndex), CacheError> {
        if extractor.dim() != self.cache.dim() {
            return Err(CacheError::DimensionMismatch {
                expected: self.cache.dim(),
                found: extractor.dim(),
            });
        }

        // 目录中重复的 image_id 只保留第一次出现
        let mut seen = HashSet::new();
        let catalog = catalog.iter().filter(|r| seen.insert(r.image_id)).collect::<Vec<_>>();

        let cached = self.cache.ids()?;
        let misses = catalog
            .iter()
            .filter(|r| !cached.contains(&r.image_id))
            .map(|r| (r.image_id, r.image_url.clone()))
            .collect::<Vec<_>>();
        let mut report = ReloadReport {
            catalog_images: catalog.len(),
            cached: catalog.len() - misses.len(),
            ..Default::default()
        };
        debug!("缓存命中 {}，需要提取 {}", report.cached, misses.len());

        let mut results = futures::stream::iter(misses)
            .map(|(image_id, url)| async move {
                (image_id, self.sync_one(image_id, &url, extractor).await)
            })
            .buffer_unordered(self.workers);
        while let Some((image_id, result)) = results.next().await {
            match result {
                Ok(()) => {
                    debug!("已缓存 image_id={}", image_id);
                    report.extracted += 1;
                }
                Err(e) => {
                    warn!("跳过 image_id={}: {}", image_id, e);
                    report.failed += 1;
                }
            }
        }
        drop(results);

        // 所有写入完成后才开始堆叠矩阵
        let mut vectors = self
            .cache
            .get_all()?
            .into_iter()
            .map(|v| (v.image_id, v.embedding))
            .collect::<HashMap<_, _>>();
        let rows = catalog
            .iter()
            .filter_map(|r| vectors.remove(&r.image_id).map(|v| ((*r).clone(), v)))
            .collect::<Vec<_>>();
        let index = FeatureIndex::build(self.cache.dim(), rows);
        report.indexed = index.len();

        Ok((report, index))
    }

    async fn sync_one(
        &self,
        image_id: i64,
        url: &str,
        extractor: &Arc<dyn FeatureExtractor>,
    ) -> Result<(), SyncError> {
        let bytes = self.fetcher.fetch(url, self.fetch_timeout).await?;
        let extractor = extractor.clone();
        let vector = spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| ExtractionError::ModelFailure(e.to_string()))??;
        self.cache.upsert(image_id, &vector)?;
        Ok(())
    }
}
