mod clean;
mod reload;
mod search;
pub mod server;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use log::{debug, error};

pub use clean::*;
pub use reload::*;
pub use search::*;
pub use server::*;

use crate::SearchService;
use crate::cache::FeatureCache;
use crate::config::{ConfDir, FetchOptions, MatchOptions, ModelOptions, Opts};
use crate::db::{self, ImageRecord};
use crate::extractor::{DnnExtractor, FeatureExtractor};
use crate::fetcher::HttpFetcher;
use crate::loader::IndexLoader;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// 创建搜索服务
///
/// `require_model` 为 false 时模型加载失败只记录错误，服务以不可用状态启动
pub(crate) fn open_service(
    conf_dir: &ConfDir,
    model: &ModelOptions,
    fetch: &FetchOptions,
    matching: &MatchOptions,
    require_model: bool,
) -> anyhow::Result<SearchService> {
    let cache = FeatureCache::open(conf_dir.features(), model.dim)
        .with_context(|| format!("无法打开特征缓存: {}", conf_dir.features().display()))?;

    let model_path = model.model.clone().unwrap_or_else(|| conf_dir.model());
    let extractor = match DnnExtractor::load(&model_path, model.clone()) {
        Ok(extractor) => Some(Arc::new(extractor) as Arc<dyn FeatureExtractor>),
        Err(e) if require_model => return Err(e).context("模型加载失败"),
        Err(e) => {
            error!("模型加载失败，搜索服务不可用: {}", e);
            None
        }
    };

    let fetcher = HttpFetcher::new(&fetch.user_agent)?;
    let loader = IndexLoader::new(cache, fetcher, fetch.timeout(), fetch.workers);
    Ok(SearchService::new(extractor, loader, matching.policy()))
}

/// 读取商品目录快照
pub(crate) async fn load_catalog(catalog: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let pool = db::open_catalog(catalog).await?;
    let records = db::crud::get_catalog(&pool).await?;
    let total = db::crud::count_images(&pool).await?;
    debug!("目录共 {} 条图片记录，其中 {} 张可用", total, records.len());
    pool.close().await;
    Ok(records)
}
