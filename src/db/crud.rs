use sqlx::{Result, SqlitePool};

use super::{CatalogRow, ImageRecord};

/// 获取目录快照：所有上架商品的图片，按商品 ID 和图片排序排列
///
/// 只返回图片地址非空、未下架、可售且在商店展示的商品
pub async fn get_catalog(executor: &SqlitePool) -> Result<Vec<ImageRecord>> {
    let rows = sqlx::query_as::<_, CatalogRow>(
        r#"
        SELECT
            p.product_id AS product_id,
            p.name AS product_name,
            p.description AS description,
            p.price AS price,
            p.c_category AS category,
            p.c_manufacturer AS brand,
            p.c_type AS product_type,
            p.sku_name AS sku_name,
            pi.image_id AS image_id,
            pi.image_path AS image_path,
            pi.image_name AS image_name,
            pi.image_sort AS image_sort
        FROM product p
        INNER JOIN product_image pi ON p.product_id = pi.product_id
        WHERE pi.image_path IS NOT NULL
          AND TRIM(pi.image_path) != ''
          AND p.inactive = 0
          AND p.show_in_store = 1
          AND p.if_sellable = 1
        ORDER BY p.product_id, pi.image_sort
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().filter_map(CatalogRow::into_record).collect())
}

/// 查询目录中的图片数量
pub async fn count_images(executor: &SqlitePool) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM product_image")
        .fetch_one(executor)
        .await?;
    Ok(count)
}
