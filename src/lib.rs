// ==========================================
// 收获记录导入系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 收获记录 CSV/Excel 规范化与去重导入
// 管道: 编码判定 → 表头归一化 → 字段转换 → 行校验 → 去重导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 去重与汇总规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{CanonicalHeader, FutureDatePolicy, MassUnit, RejectReason};

// 领域实体
pub use domain::{
    HarvestFilter, HarvestRecord, HarvestSummary, ImportBatch, IngestOutcome, RecordIdentity,
};

// 导入管道
pub use importer::{HarvestImporter, HarvestImporterImpl, ImportError, ImportResult};

// 引擎
pub use engine::{DedupIngestEngine, HarvestSummaryEngine};

// 存储
pub use repository::{HarvestStore, SqliteHarvestStore};

// API
pub use api::{HarvestApi, ImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "収穫記録取込";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
