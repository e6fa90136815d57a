use std::collections::HashSet;
use std::fs;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use chrono::{DateTime, Utc};
use heed::types::{Bytes, I64, Str, U32};
use heed::{Database, Env, EnvOpenOptions, WithTls};
use log::{info, warn};

use crate::error::CacheError;

/// 缓存中保存的一条特征向量
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub image_id: i64,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// 持久化的特征缓存：image_id => 特征向量
///
/// 向量以 D 个小端 f32 连续存储，没有长度前缀，写入时间单独存放。
/// 同一个 image_id 重复写入时直接覆盖。
#[derive(Clone)]
pub struct FeatureCache {
    env: Env<WithTls>,
    dim: usize,
    db_features: Database<I64<BigEndian>, Bytes>,
    db_created: Database<I64<BigEndian>, I64<BigEndian>>,
}

impl FeatureCache {
    /// 打开或创建缓存，维度与已有数据不一致时报错
    pub fn open<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self, CacheError> {
        let path = path.as_ref();
        fs::create_dir_all(path)?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(1 << 36) // 64GiB，只是地址空间，不会实际占用
                .max_dbs(3)
                .open(path)?
        };

        let mut txn = env.write_txn()?;
        let db_meta = env.create_database::<Str, U32<BigEndian>>(&mut txn, Some("meta"))?;
        let db_features = env.create_database(&mut txn, Some("features"))?;
        let db_created = env.create_database(&mut txn, Some("created_at"))?;
        let stored = db_meta.get(&txn, "dim")?;
        match stored {
            Some(found) if found as usize != dim => {
                return Err(CacheError::DimensionMismatch { expected: dim, found: found as usize });
            }
            Some(_) => {}
            None => db_meta.put(&mut txn, "dim", &(dim as u32))?,
        }
        txn.commit()?;

        info!("打开特征缓存: {}，维度 {}", path.display(), dim);
        Ok(Self { env, dim, db_features, db_created })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// 写入或覆盖一条特征
    pub fn upsert(&self, image_id: i64, embedding: &[f32]) -> Result<(), CacheError> {
        if embedding.len() != self.dim {
            return Err(CacheError::DimensionMismatch {
                expected: self.dim,
                found: embedding.len(),
            });
        }
        let mut bytes = vec![0u8; self.dim * 4];
        LittleEndian::write_f32_into(embedding, &mut bytes);

        let mut txn = self.env.write_txn()?;
        self.db_features.put(&mut txn, &image_id, &bytes)?;
        self.db_created.put(&mut txn, &image_id, &Utc::now().timestamp_millis())?;
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, image_id: i64) -> Result<Option<FeatureVector>, CacheError> {
        let txn = self.env.read_txn()?;
        let Some(bytes) = self.db_features.get(&txn, &image_id)? else {
            return Ok(None);
        };
        let created = self.db_created.get(&txn, &image_id)?;
        Ok(self.decode(image_id, bytes, created))
    }

    /// 按 image_id 顺序返回所有特征，长度不正确的记录会被跳过
    pub fn get_all(&self) -> Result<Vec<FeatureVector>, CacheError> {
        let txn = self.env.read_txn()?;
        let mut result = Vec::new();
        for item in self.db_features.iter(&txn)? {
            let (image_id, bytes) = item?;
            let created = self.db_created.get(&txn, &image_id)?;
            if let Some(vector) = self.decode(image_id, bytes, created) {
                result.push(vector);
            }
        }
        Ok(result)
    }

    /// 返回所有已缓存的 image_id
    pub fn ids(&self) -> Result<HashSet<i64>, CacheError> {
        let txn = self.env.read_txn()?;
        let mut ids = HashSet::new();
        for item in self.db_features.iter(&txn)? {
            let (image_id, bytes) = item?;
            if bytes.len() == self.dim * 4 {
                ids.insert(image_id);
            }
        }
        Ok(ids)
    }

    pub fn len(&self) -> Result<u64, CacheError> {
        let txn = self.env.read_txn()?;
        Ok(self.db_features.len(&txn)?)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    /// 删除不在 `keep` 中的特征，返回删除数量
    pub fn retain(&self, keep: &HashSet<i64>) -> Result<usize, CacheError> {
        let mut txn = self.env.write_txn()?;
        let stale = self
            .db_features
            .iter(&txn)?
            .map(|item| item.map(|(id, _)| id))
            .filter(|id| !matches!(id, Ok(id) if keep.contains(id)))
            .collect::<Result<Vec<_>, _>>()?;
        for id in &stale {
            self.db_features.delete(&mut txn, id)?;
            self.db_created.delete(&mut txn, id)?;
        }
        txn.commit()?;
        Ok(stale.len())
    }

    fn decode(&self, image_id: i64, bytes: &[u8], created: Option<i64>) -> Option<FeatureVector> {
        if bytes.len() != self.dim * 4 {
            warn!("特征长度错误，跳过 image_id={}: {} 字节", image_id, bytes.len());
            return None;
        }
        let mut embedding = vec![0f32; self.dim];
        LittleEndian::read_f32_into(bytes, &mut embedding);
        let created_at = created.and_then(DateTime::<Utc>::from_timestamp_millis).unwrap_or_default();
        Some(FeatureVector { image_id, embedding, created_at })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_upsert_and_get_all() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 4).unwrap();
        assert!(cache.is_empty().unwrap());

        let v = [0.25f32, -1.5, 3.0e-7, 42.0];
        cache.upsert(7, &v).unwrap();
        cache.upsert(3, &[1., 0., 0., 0.]).unwrap();

        let all = cache.get_all().unwrap();
        assert_eq!(all.len(), 2);
        // 按 image_id 升序
        assert_eq!(all[0].image_id, 3);
        assert_eq!(all[1].image_id, 7);
        assert_eq!(all[1].embedding, v);
        assert!(all[1].created_at.timestamp() > 0);
    }

    #[test]
    fn test_upsert_overwrites() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 2).unwrap();

        cache.upsert(1, &[1., 2.]).unwrap();
        cache.upsert(1, &[3., 4.]).unwrap();

        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.get(1).unwrap().unwrap().embedding, vec![3., 4.]);
        assert!(cache.get(2).unwrap().is_none());
    }

    #[test]
    fn test_little_endian_layout() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 2).unwrap();
        cache.upsert(1, &[1.0, -2.0]).unwrap();

        let txn = cache.env.read_txn().unwrap();
        let bytes = cache.db_features.get(&txn, &1).unwrap().unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-2.0f32).to_le_bytes());
    }

    #[test]
    fn test_dimension_mismatch() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 4).unwrap();

        let err = cache.upsert(1, &[1., 2., 3.]).unwrap_err();
        assert!(matches!(err, CacheError::DimensionMismatch { expected: 4, found: 3 }));
        assert!(cache.get(1).unwrap().is_none());
    }

    #[test]
    fn test_reopen_with_other_dim() {
        let temp_dir = tempdir().unwrap();
        {
            let cache = FeatureCache::open(temp_dir.path(), 4).unwrap();
            cache.upsert(1, &[1., 2., 3., 4.]).unwrap();
        }
        let err = FeatureCache::open(temp_dir.path(), 8).err().unwrap();
        assert!(matches!(err, CacheError::DimensionMismatch { expected: 8, found: 4 }));
    }

    #[test]
    fn test_persistence() {
        let temp_dir = tempdir().unwrap();
        {
            let cache = FeatureCache::open(temp_dir.path(), 3).unwrap();
            cache.upsert(10, &[0.1, 0.2, 0.3]).unwrap();
        }
        let cache = FeatureCache::open(temp_dir.path(), 3).unwrap();
        let all = cache.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].embedding, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_corrupt_record_skipped() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 2).unwrap();
        cache.upsert(1, &[1., 1.]).unwrap();
        {
            let mut txn = cache.env.write_txn().unwrap();
            cache.db_features.put(&mut txn, &2, &[0u8; 3]).unwrap();
            txn.commit().unwrap();
        }

        let all = cache.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].image_id, 1);
        assert_eq!(cache.ids().unwrap(), HashSet::from([1]));
    }

    #[test]
    fn test_retain() {
        let temp_dir = tempdir().unwrap();
        let cache = FeatureCache::open(temp_dir.path(), 1).unwrap();
        for id in 1..=5 {
            cache.upsert(id, &[id as f32]).unwrap();
        }

        let removed = cache.retain(&HashSet::from([2, 4])).unwrap();
        assert_eq!(removed, 3);
        assert_eq!(cache.ids().unwrap(), HashSet::from([2, 4]));
    }
}
