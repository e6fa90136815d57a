use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// 商品的展示信息
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ProductInfo {
    /// 商品名称
    pub name: String,
    /// 商品描述
    pub description: String,
    /// 品牌
    pub brand: String,
    /// 分类
    pub category: String,
    /// 商品类型
    pub product_type: String,
    /// SKU 名称
    pub sku_name: String,
    /// 价格
    pub price: f64,
}

/// 目录中的一张商品图片
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ImageRecord {
    /// 图片 ID，同时也是特征缓存的键
    pub image_id: i64,
    /// 所属商品 ID
    pub product_id: i64,
    /// 图片地址
    pub image_url: String,
    /// 图片文件名
    pub image_name: String,
    /// 图片在商品中的排序
    pub image_sort: i64,
    pub product: ProductInfo,
}

/// 目录查询返回的原始行，所有展示字段都可能为空
#[derive(Debug, FromRow)]
pub struct CatalogRow {
    pub product_id: i64,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub product_type: Option<String>,
    pub sku_name: Option<String>,
    pub image_id: i64,
    pub image_path: Option<String>,
    pub image_name: Option<String>,
    pub image_sort: Option<i64>,
}

impl CatalogRow {
    /// 转换为 ImageRecord，图片地址为空时返回 None
    pub fn into_record(self) -> Option<ImageRecord> {
        let image_url = self.image_path?.trim().to_string();
        if image_url.is_empty() {
            return None;
        }
        Some(ImageRecord {
            image_id: self.image_id,
            product_id: self.product_id,
            image_url,
            image_name: self.image_name.unwrap_or_default(),
            image_sort: self.image_sort.unwrap_or(0),
            product: ProductInfo {
                name: or_unknown(self.product_name),
                description: self.description.unwrap_or_default(),
                brand: or_unknown(self.brand),
                category: or_unknown(self.category),
                product_type: self.product_type.unwrap_or_default(),
                sku_name: self.sku_name.unwrap_or_default(),
                price: self.price.filter(|p| p.is_finite()).unwrap_or(0.),
            },
        })
    }
}

fn or_unknown(value: Option<String>) -> String {
    match value.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "Unknown".to_string(),
    }
}
