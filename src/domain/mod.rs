// ==========================================
// 收获记录导入系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含导入逻辑
// ==========================================

pub mod harvest;
pub mod types;

// 重导出核心类型
pub use harvest::{
    amount_key, DailyTotal, HarvestFilter, HarvestRecord, HarvestSummary, ImportBatch,
    IngestOutcome, RankingEntry, RecordIdentity, RowRejection, AMOUNT_DECIMALS, MAX_AMOUNT_KG,
};
pub use types::{CanonicalHeader, FutureDatePolicy, MassUnit, RejectReason};
