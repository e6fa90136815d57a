use ndarray::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::{ImageRecord, ProductInfo};
use crate::matcher::{MatchPolicy, cosine_from_parts};
use crate::utils::round_score;

/// 一条匹配结果，每次查询时生成
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MatchResult {
    pub product_id: i64,
    /// 相似度，范围 [0, 1]，保留三位小数
    pub score: f32,
    pub image_id: i64,
    pub image_url: String,
    pub image_name: String,
    pub product: ProductInfo,
}

/// 内存中的特征索引
///
/// `matrix` 的第 i 行总是对应 `records[i]`，索引只会整体重建，不会原地修改。
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureIndex {
    matrix: Array2<f32>,
    norms: Vec<f32>,
    records: Vec<ImageRecord>,
    product_ids: Vec<i64>,
}

impl FeatureIndex {
    /// 按给定顺序堆叠向量，维度不为 `dim` 的行会被丢弃
    pub fn build(dim: usize, rows: Vec<(ImageRecord, Vec<f32>)>) -> Self {
        let rows = rows.into_iter().filter(|(_, v)| v.len() == dim).collect::<Vec<_>>();
        let mut matrix = Array2::zeros((rows.len(), dim));
        let mut records = Vec::with_capacity(rows.len());
        for (i, (record, vector)) in rows.into_iter().enumerate() {
            matrix.row_mut(i).assign(&ArrayView1::from(&vector[..]));
            records.push(record);
        }
        let norms = matrix.outer_iter().map(|row| row.dot(&row).sqrt()).collect();
        let product_ids = records.iter().map(|r| r.product_id).collect();
        Self { matrix, norms, records, product_ids }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> ArrayView2<'_, f32> {
        self.matrix.view()
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// 计算查询向量与每一行的相似度，负数截断为 0
    pub fn scores(&self, query: &[f32]) -> Vec<f32> {
        if query.len() != self.dim() {
            return vec![0.; self.len()];
        }
        let query = ArrayView1::from(query);
        let qnorm = query.dot(&query).sqrt();
        (0..self.len())
            .into_par_iter()
            .map(|i| {
                let dot = self.matrix.row(i).dot(&query);
                cosine_from_parts(dot, qnorm, self.norms[i]).max(0.)
            })
            .collect()
    }

    /// 使用指定策略搜索，空索引返回空列表
    pub fn search(&self, query: &[f32], policy: &MatchPolicy) -> Vec<MatchResult> {
        if self.is_empty() {
            return vec![];
        }
        let scores = self.scores(query);
        policy
            .select(&scores, &self.product_ids)
            .into_iter()
            .map(|(i, score)| {
                let record = &self.records[i];
                MatchResult {
                    product_id: record.product_id,
                    score: round_score(score),
                    image_id: record.image_id,
                    image_url: record.image_url.clone(),
                    image_name: record.image_name.clone(),
                    product: record.product.clone(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(image_id: i64, product_id: i64) -> ImageRecord {
        ImageRecord {
            image_id,
            product_id,
            image_url: format!("http://shop/{}.jpg", image_id),
            image_name: format!("{}.jpg", image_id),
            image_sort: 0,
            product: ProductInfo {
                name: format!("product {}", product_id),
                description: String::new(),
                brand: "Unknown".to_string(),
                category: "Unknown".to_string(),
                product_type: String::new(),
                sku_name: String::new(),
                price: 9.9,
            },
        }
    }

    #[test]
    fn test_single_exact_match() {
        let index = FeatureIndex::build(4, vec![(record(1, 100), vec![1., 0., 0., 0.])]);
        let result = index.search(&[1., 0., 0., 0.], &MatchPolicy::ExactDedup { min_score: 0.8 });
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].product_id, 100);
        assert_eq!(result[0].image_id, 1);
        assert_eq!(result[0].score, 1.0);
        assert_eq!(result[0].product.name, "product 100");
    }

    #[test]
    fn test_dedup_returns_best_image() {
        // 与查询向量的余弦分别约为 0.90 和 0.85
        let a = vec![0.9, (1f32 - 0.81).sqrt()];
        let b = vec![0.85, (1f32 - 0.7225).sqrt()];
        let index = FeatureIndex::build(2, vec![(record(1, 100), b), (record(2, 100), a)]);

        let result = index.search(&[1., 0.], &MatchPolicy::ExactDedup { min_score: 0.8 });
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].product_id, 100);
        assert_eq!(result[0].image_id, 2);
        assert_eq!(result[0].score, 0.9);
    }

    #[test]
    fn test_degenerate_rows_excluded() {
        let index = FeatureIndex::build(
            2,
            vec![
                (record(1, 1), vec![0., 0.]),
                (record(2, 2), vec![f32::NAN, 1.]),
                (record(3, 3), vec![-1., 0.]),
                (record(4, 4), vec![2., 0.]),
            ],
        );
        let scores = index.scores(&[1., 0.]);
        assert_eq!(scores, vec![0., 0., 0., 1.]);

        let result = index.search(&[1., 0.], &MatchPolicy::TopK { k: 6, min_score: 0.1 });
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].product_id, 4);
    }

    #[test]
    fn test_wrong_dimension_rows_dropped() {
        let index = FeatureIndex::build(
            3,
            vec![(record(1, 1), vec![1., 0., 0.]), (record(2, 2), vec![1., 0.])],
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.records()[0].image_id, 1);
        assert_eq!(index.matrix().shape(), &[1, 3]);
    }

    #[test]
    fn test_empty_index() {
        let index = FeatureIndex::build(4, vec![]);
        assert!(index.is_empty());
        let result = index.search(&[1., 0., 0., 0.], &MatchPolicy::TopK { k: 6, min_score: 0.1 });
        assert!(result.is_empty());
    }
}
