use axum::body::Bytes;
use axum_typed_multipart::{FieldData, TryFromMultipart};
use serde::Serialize;
use utoipa::ToSchema;

use crate::loader::IndexState;
use crate::matcher::MatchPolicy;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: FieldData<Bytes>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件，支持 png、jpg、jpeg、gif、bmp
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 服务状态
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    /// 索引加载状态
    pub state: IndexState,
    /// 模型是否可用
    pub model_loaded: bool,
    /// 特征缓存中的向量数量
    pub cached_vectors: u64,
    /// 当前匹配策略
    #[schema(value_type = Object)]
    pub policy: MatchPolicy,
}
