// ==========================================
// 收获记录导入系统 - 去重导入引擎
// ==========================================
// 职责: 校验通过的记录 → 仅追加存储中尚不存在身份的记录
// 身份: (收获日, 企业名, 作物名, round(kg, 3))
// 红线:
// - Engine 不拼 SQL，存储协作方负责单事务 insert-if-absent
// - 幂等: 同一批次重复导入第二次新增为 0
// - 批内重复身份只保留首条，其余计为跳过
// ==========================================

use crate::domain::harvest::{HarvestRecord, RecordIdentity};
use crate::repository::error::RepositoryResult;
use crate::repository::harvest_store::HarvestStore;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// 引擎结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupResult {
    pub inserted: usize,
    pub skipped_as_duplicate: usize,
}

/// 身份差集的划分结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupPartition {
    pub fresh: Vec<HarvestRecord>,      // 存储与批内均未出现过的身份
    pub duplicates: Vec<HarvestRecord>, // 已存在于存储或批内先前行
}

// ==========================================
// DedupIngestEngine
// ==========================================
// 无状态引擎
pub struct DedupIngestEngine;

impl Default for DedupIngestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupIngestEngine {
    pub fn new() -> Self {
        Self
    }

    /// 按身份划分批次（纯函数）
    pub fn partition(
        &self,
        batch: &[HarvestRecord],
        existing: &HashSet<RecordIdentity>,
    ) -> DedupPartition {
        let mut seen: HashSet<RecordIdentity> = HashSet::with_capacity(batch.len());
        let mut partition = DedupPartition::default();

        for record in batch {
            let identity = record.identity();
            if existing.contains(&identity) || !seen.insert(identity) {
                partition.duplicates.push(record.clone());
            } else {
                partition.fresh.push(record.clone());
            }
        }
        partition
    }

    /// 读取批次日期区间内的已有身份
    pub fn existing_for<S: HarvestStore + ?Sized>(
        &self,
        store: &S,
        batch: &[HarvestRecord],
    ) -> RepositoryResult<HashSet<RecordIdentity>> {
        let min = batch.iter().map(|r| r.harvest_date).min();
        let max = batch.iter().map(|r| r.harvest_date).max();
        match (min, max) {
            (Some(from), Some(to)) => store.existing_identities(from, to),
            _ => Ok(HashSet::new()),
        }
    }

    /// 去重导入
    ///
    /// # 返回
    /// - inserted: 存储实际新增的记录数
    /// - skipped_as_duplicate: batch.len() - inserted
    ///
    /// 并发写者在差集计算与写入之间插入了相同身份时，
    /// 存储的 insert-if-absent 兜底，此类行同样计为跳过
    pub fn ingest<S: HarvestStore + ?Sized>(
        &self,
        store: &S,
        batch: &[HarvestRecord],
    ) -> RepositoryResult<DedupResult> {
        if batch.is_empty() {
            return Ok(DedupResult::default());
        }

        let existing = self.existing_for(store, batch)?;
        let partition = self.partition(batch, &existing);

        let inserted = store.insert_new(&partition.fresh)?;
        if inserted < partition.fresh.len() {
            warn!(
                expected = partition.fresh.len(),
                inserted,
                "部分记录已被并发写入，按重复跳过"
            );
        }

        let result = DedupResult {
            inserted,
            skipped_as_duplicate: batch.len() - inserted,
        };
        info!(
            batch = batch.len(),
            inserted = result.inserted,
            skipped = result.skipped_as_duplicate,
            "去重导入完成"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::repository::harvest_store_impl::SqliteHarvestStore;
    use chrono::NaiveDate;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    fn memory_store() -> SqliteHarvestStore {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        SqliteHarvestStore::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_partition_keeps_first_in_batch_duplicate() {
        let engine = DedupIngestEngine::new();
        let batch = vec![
            HarvestRecord::new(d(17), "A社", "トマト", 1.5),
            HarvestRecord::new(d(17), "A社", "トマト", 1.5004),
            HarvestRecord::new(d(17), "A社", "トマト", 1.6),
        ];
        let partition = engine.partition(&batch, &HashSet::new());
        assert_eq!(partition.fresh.len(), 2);
        assert_eq!(partition.duplicates.len(), 1);
        assert_eq!(partition.duplicates[0].amount_kg, 1.5004);
    }

    #[test]
    fn test_partition_against_existing() {
        let engine = DedupIngestEngine::new();
        let existing: HashSet<RecordIdentity> =
            [HarvestRecord::new(d(17), "A社", "トマト", 1.5).identity()]
                .into_iter()
                .collect();
        let batch = vec![
            HarvestRecord::new(d(17), "A社", "トマト", 1.5),
            HarvestRecord::new(d(17), "B社", "トマト", 1.5),
        ];
        let partition = engine.partition(&batch, &existing);
        assert_eq!(partition.fresh[0].company, "B社");
        assert_eq!(partition.duplicates.len(), 1);
    }

    #[test]
    fn test_ingest_is_idempotent() {
        let engine = DedupIngestEngine::new();
        let store = memory_store();
        let batch = vec![
            HarvestRecord::new(d(17), "A社", "トマト", 1.5),
            HarvestRecord::new(d(18), "A社", "ナス", 0.75),
        ];

        let first = engine.ingest(&store, &batch).unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped_as_duplicate, 0);

        let second = engine.ingest(&store, &batch).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped_as_duplicate, 2);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_ingest_empty_batch() {
        let store = memory_store();
        let result = DedupIngestEngine::new().ingest(&store, &[]).unwrap();
        assert_eq!(result, DedupResult::default());
    }
}
