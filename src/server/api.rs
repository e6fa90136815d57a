use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;

use super::error::{AppError, Result};
use super::state::AppState;
use super::types::*;
use crate::SearchResponse;
use crate::cli::load_catalog;
use crate::error::SearchError;
use crate::loader::ReloadReport;

/// 上传一张图片，搜索相似的商品
#[utoipa::path(
    post,
    path = "/image-search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "文件类型不支持或图片无法解码"),
        (status = 503, description = "模型或索引不可用"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    TypedMultipart(data): TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let file_name = data
        .file
        .metadata
        .file_name
        .ok_or_else(|| SearchError::InvalidImage("没有上传文件".to_string()))?;

    info!("正在搜索上传图片: {}", file_name);

    let response = state.service.search(&file_name, data.file.contents.to_vec()).await?;
    Ok(Json(response))
}

/// 重新读取商品目录并重载索引
#[utoipa::path(
    post,
    path = "/reload",
    responses(
        (status = 200, body = ReloadReport),
    )
)]
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<ReloadReport>> {
    if token != state.token {
        return Err(AppError::Unauthorized);
    }
    let catalog = load_catalog(&state.catalog).await?;
    let report = state.service.reload(&catalog).await?;
    Ok(Json(report))
}

/// 获取服务状态
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, body = StatusResponse),
    )
)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>> {
    let cached_vectors = state.service.cache().len().map_err(anyhow::Error::from)?;
    Ok(Json(StatusResponse {
        state: state.service.state(),
        model_loaded: state.service.is_available(),
        cached_vectors,
        policy: state.service.policy(),
    }))
}
