use std::path::Path;

use log::info;
use sqlx::{SqlitePool, sqlite::*};

pub mod crud;
pub mod model;

pub use model::*;

pub type Database = SqlitePool;

/// 以只读方式打开商品目录数据库
pub async fn open_catalog(filename: impl AsRef<Path>) -> Result<Database, sqlx::Error> {
    let filename = filename.as_ref();
    info!("打开商品目录: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .filename(filename)
        .read_only(true)
        .create_if_missing(false);

    SqlitePool::connect_with(options).await
}
