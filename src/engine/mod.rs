// ==========================================
// 收获记录导入系统 - 引擎层
// ==========================================
// 职责: 去重导入与汇总规则
// 红线: Engine 不拼 SQL，存储访问经由 HarvestStore
// ==========================================

pub mod dedup_ingest;
pub mod harvest_summary;

// 重导出核心引擎
pub use dedup_ingest::{DedupIngestEngine, DedupPartition, DedupResult};
pub use harvest_summary::HarvestSummaryEngine;
