use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

const SCHEMA: &str = r#"
CREATE TABLE product (
    product_id INTEGER PRIMARY KEY,
    name TEXT,
    description TEXT,
    price REAL,
    c_category TEXT,
    c_manufacturer TEXT,
    c_type TEXT,
    sku_name TEXT,
    inactive INTEGER NOT NULL DEFAULT 0,
    show_in_store INTEGER NOT NULL DEFAULT 1,
    if_sellable INTEGER NOT NULL DEFAULT 1
);
CREATE TABLE product_image (
    image_id INTEGER PRIMARY KEY,
    product_id INTEGER NOT NULL,
    image_path TEXT,
    image_name TEXT,
    image_sort INTEGER
);
"#;

/// 创建一个测试用的商品目录
///
/// 200 号商品已下架，300 号商品不可售，它们的图片都不应出现在目录快照中
pub async fn create_catalog(path: &Path) -> sqlx::Result<()> {
    let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    sqlx::raw_sql(
        r#"
        INSERT INTO product (product_id, name, description, price, c_category, c_manufacturer, c_type, sku_name)
        VALUES
            (100, 'Red Mug', 'ceramic mug', 12.5, 'Kitchen', 'Acme', 'mug', 'MUG-RED'),
            (101, NULL, NULL, NULL, NULL, NULL, NULL, NULL);
        INSERT INTO product (product_id, name, inactive) VALUES (200, 'Retired', 1);
        INSERT INTO product (product_id, name, if_sellable) VALUES (300, 'Sample', 0);
        INSERT INTO product_image (image_id, product_id, image_path, image_name, image_sort)
        VALUES
            (2, 100, 'http://shop/2.jpg', '2.jpg', 2),
            (1, 100, '  http://shop/1.jpg  ', '1.jpg', 1),
            (3, 101, 'http://shop/3.jpg', NULL, NULL),
            (4, 101, '   ', '4.jpg', 2),
            (5, 101, NULL, '5.jpg', 3),
            (6, 200, 'http://shop/6.jpg', '6.jpg', 1),
            (7, 300, 'http://shop/7.jpg', '7.jpg', 1);
        "#,
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
