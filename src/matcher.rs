use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

/// 余弦相似度，零向量或包含 NaN 时返回 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.;
    }
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    cosine_from_parts(dot, na.sqrt(), nb.sqrt())
}

/// 由点积和两个范数计算余弦相似度
pub(crate) fn cosine_from_parts(dot: f32, norm_a: f32, norm_b: f32) -> f32 {
    let denom = norm_a * norm_b;
    if !denom.is_normal() || !dot.is_finite() {
        return 0.;
    }
    (dot / denom).clamp(-1., 1.)
}

/// 匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchPolicy {
    /// 按相似度降序返回前 k 个高于阈值的结果
    TopK { k: usize, min_score: f32 },
    /// 每个商品只保留相似度最高的一行，不限制数量
    ExactDedup { min_score: f32 },
}

impl MatchPolicy {
    pub fn min_score(&self) -> f32 {
        match *self {
            Self::TopK { min_score, .. } | Self::ExactDedup { min_score } => min_score,
        }
    }

    /// 返回给调用方的搜索类型名称
    pub fn search_type(&self) -> &'static str {
        match self {
            Self::TopK { .. } => "top_k",
            Self::ExactDedup { .. } => "exact_image_match",
        }
    }

    /// 根据每一行的分数和所属商品选择结果，返回 `(行号, 分数)`，按分数降序
    ///
    /// 分数相同时行号小的在前。`product_ids[i]` 必须对应 `scores[i]`。
    pub fn select(&self, scores: &[f32], product_ids: &[i64]) -> Vec<(usize, f32)> {
        debug_assert_eq!(scores.len(), product_ids.len());
        match *self {
            Self::TopK { k, min_score } => {
                let mut hits = scores
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| **s > min_score)
                    .map(|(i, s)| (i, *s))
                    .collect::<Vec<_>>();
                // 稳定排序，保证同分时按原始顺序
                hits.sort_by(|a, b| b.1.total_cmp(&a.1));
                hits.truncate(k);
                hits
            }
            Self::ExactDedup { min_score } => {
                let mut best: Vec<(usize, f32)> = Vec::new();
                let mut position: HashMap<i64, usize> = HashMap::new();
                for (i, &score) in scores.iter().enumerate() {
                    if score <= min_score {
                        continue;
                    }
                    match position.get(&product_ids[i]) {
                        Some(&pos) => {
                            if score > best[pos].1 {
                                best[pos] = (i, score);
                            }
                        }
                        None => {
                            position.insert(product_ids[i], best.len());
                            best.push((i, score));
                        }
                    }
                }
                best.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
                best
            }
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopK { k, min_score } => write!(f, "top-k(k={}, min_score={})", k, min_score),
            Self::ExactDedup { min_score } => write!(f, "exact-dedup(min_score={})", min_score),
        }
    }
}
