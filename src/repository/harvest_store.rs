// ==========================================
// 收获记录导入系统 - 收获事实存储 Trait
// ==========================================
// 职责: 定义导入核心所需的存储协作方接口（不包含业务逻辑）
// 红线: insert_new 必须在单个事务内完成，身份已存在的行跳过
// ==========================================

use crate::domain::harvest::{HarvestFilter, HarvestRecord, RecordIdentity};
use crate::repository::error::RepositoryResult;
use chrono::NaiveDate;
use std::collections::HashSet;

// ==========================================
// HarvestStore Trait
// ==========================================
// 用途: 去重导入引擎与查询视图的存储句柄
// 实现者: SqliteHarvestStore（使用 rusqlite）
pub trait HarvestStore: Send + Sync {
    /// 批量插入，身份已存在的记录忽略
    ///
    /// # 返回
    /// - Ok(usize): 实际新增的记录数
    /// - Err: 数据库错误（整个事务回滚，不可见任何部分结果）
    fn insert_new(&self, records: &[HarvestRecord]) -> RepositoryResult<usize>;

    /// 按条件查询（按 日期/企业/作物 排序）
    fn query(&self, filter: &HarvestFilter) -> RepositoryResult<Vec<HarvestRecord>>;

    /// 查询日期区间（两端包含）内已存在的去重身份
    fn existing_identities(
        &self,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> RepositoryResult<HashSet<RecordIdentity>>;

    /// 记录总数
    fn count(&self) -> RepositoryResult<usize>;

    /// 最早 / 最晚收获日（空表返回 None）
    fn date_bounds(&self) -> RepositoryResult<Option<(NaiveDate, NaiveDate)>>;

    /// 已登记的企业名（升序去重）
    fn distinct_companies(&self) -> RepositoryResult<Vec<String>>;

    /// 已登记的作物名（升序去重）
    fn distinct_crops(&self) -> RepositoryResult<Vec<String>>;
}
