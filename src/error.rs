use thiserror::Error;

/// 下载图片时的错误
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("下载超时: {0}")]
    Timeout(String),
    #[error("下载失败 {url}: {reason}")]
    Http { url: String, reason: String },
    #[error("无效的图片: {0}")]
    InvalidImage(String),
}

/// 提取特征向量时的错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("无法解码图片")]
    DecodeFailure,
    #[error("模型推理失败: {0}")]
    ModelFailure(String),
}

impl From<opencv::Error> for ExtractionError {
    fn from(err: opencv::Error) -> Self {
        Self::ModelFailure(err.to_string())
    }
}

/// 特征缓存读写错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("lmdb 错误: {0}")]
    Lmdb(#[from] heed::Error),
    #[error("io 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("向量维度不匹配: 期望 {expected}，实际 {found}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// 查询接口对外暴露的错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("无效的图片: {0}")]
    InvalidImage(String),
    #[error("模型不可用: {0}")]
    ModelUnavailable(String),
    #[error("索引尚未加载")]
    IndexUnavailable,
}

impl From<ExtractionError> for SearchError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::DecodeFailure => Self::InvalidImage("无法解码上传的图片".to_string()),
            ExtractionError::ModelFailure(reason) => Self::ModelUnavailable(reason),
        }
    }
}

/// 重载索引失败的原因
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("模型未加载，无法重载索引")]
    ModelUnavailable,
    #[error(transparent)]
    Cache(#[from] CacheError),
}
