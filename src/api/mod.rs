// ==========================================
// 收获记录导入系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口，供命令行前端调用
// ==========================================

pub mod error;
pub mod harvest_api;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use harvest_api::{records_to_csv, FilterOptions, HarvestApi};
pub use import_api::{DryRunResponse, FileImportResponse, ImportApi, ImportApiResponse};
