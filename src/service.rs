use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use serde::Serialize;
use tokio::task::spawn_blocking;
use utoipa::ToSchema;

use crate::cache::FeatureCache;
use crate::db::ImageRecord;
use crate::error::{ReloadError, SearchError};
use crate::extractor::FeatureExtractor;
use crate::fetcher::{HttpFetcher, ImageFetcher};
use crate::index::MatchResult;
use crate::loader::{IndexLoader, IndexSnapshot, IndexState, ReloadReport};
use crate::matcher::MatchPolicy;
use crate::{metrics, utils};

/// 一次搜索的响应
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 上传图片的 blake3 哈希
    pub image_hash: String,
    /// 搜索类型：`exact_image_match` 或 `top_k`
    pub search_type: String,
    /// 使用的相似度阈值
    pub threshold: f32,
    pub total_results: usize,
    pub results: Vec<MatchResult>,
}

/// 以图搜商品服务，启动时创建一次，所有请求共享
pub struct SearchService<F = HttpFetcher> {
    /// 启动时模型加载失败则为 None，此时服务不可用
    extractor: Option<Arc<dyn FeatureExtractor>>,
    loader: IndexLoader<F>,
    policy: MatchPolicy,
}

impl<F: ImageFetcher> SearchService<F> {
    pub fn new(
        extractor: Option<Arc<dyn FeatureExtractor>>,
        loader: IndexLoader<F>,
        policy: MatchPolicy,
    ) -> Self {
        Self { extractor, loader, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn state(&self) -> IndexState {
        self.loader.state()
    }

    pub fn cache(&self) -> &FeatureCache {
        self.loader.cache()
    }

    pub fn loader(&self) -> &IndexLoader<F> {
        &self.loader
    }

    /// 模型是否已加载
    pub fn is_available(&self) -> bool {
        self.extractor.is_some()
    }

    /// 使用新的目录快照重载索引
    pub async fn reload(&self, catalog: &[ImageRecord]) -> Result<ReloadReport, ReloadError> {
        let extractor = self.extractor.as_ref().ok_or(ReloadError::ModelUnavailable)?;
        Ok(self.loader.reload(catalog, extractor).await?)
    }

    /// 搜索与上传图片相似的商品
    ///
    /// `file_name` 为上传时声明的文件名，用于校验图片类型
    pub async fn search(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<SearchResponse, SearchError> {
        if !utils::allowed_file(file_name) {
            return Err(SearchError::InvalidImage(format!("不支持的文件类型: {}", file_name)));
        }
        // 模型从未加载时服务不会启动，查询方看到的是索引不可用
        let extractor = self.extractor.clone().ok_or(SearchError::IndexUnavailable)?;

        let start = Instant::now();
        let image_hash = blake3::hash(&bytes).to_hex().to_string();
        let query = spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| SearchError::ModelUnavailable(e.to_string()))??;

        let snapshot = self.loader.snapshot();
        let results = match &*snapshot {
            IndexSnapshot::Empty => return Err(SearchError::IndexUnavailable),
            IndexSnapshot::LoadFailed => {
                debug!("索引加载失败，返回空结果");
                vec![]
            }
            IndexSnapshot::Loaded(index) => {
                if index.dim() != query.len() {
                    return Err(SearchError::ModelUnavailable(format!(
                        "查询向量维度 {} 与索引维度 {} 不一致",
                        query.len(),
                        index.dim()
                    )));
                }
                // 打分使用 rayon 并行，不占用异步运行时的线程
                let snapshot = snapshot.clone();
                let policy = self.policy;
                spawn_blocking(move || match &*snapshot {
                    IndexSnapshot::Loaded(index) => index.search(&query, &policy),
                    _ => vec![],
                })
                .await
                .map_err(|e| SearchError::ModelUnavailable(e.to_string()))?
            }
        };

        let search_type = self.policy.search_type();
        let elapsed = start.elapsed().as_secs_f32();
        metrics::observe_search(search_type, elapsed, results.first().map(|r| r.score));
        info!("搜索完成 {}: {} 个结果，耗时 {:.3}s", image_hash, results.len(), elapsed);

        Ok(SearchResponse {
            image_hash,
            search_type: search_type.to_string(),
            threshold: self.policy.min_score(),
            total_results: results.len(),
            results,
        })
    }
}
