use std::path::PathBuf;
use std::sync::Arc;

use crate::SearchService;

/// 应用状态
pub struct AppState {
    /// 搜索服务
    pub service: SearchService,
    /// 商品目录数据库路径，每次重载时重新读取
    pub catalog: PathBuf,
    /// 鉴权 token
    pub token: String,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(service: SearchService, catalog: PathBuf, token: String) -> Arc<Self> {
        Arc::new(AppState { service, catalog, token })
    }
}
