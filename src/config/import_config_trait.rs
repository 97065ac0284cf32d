// ==========================================
// 收获记录导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::FutureDatePolicy;
use crate::importer::error::ImportResult;

// ==========================================
// IngestConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait IngestConfigReader: Send + Sync {
    /// 未来日处理策略
    ///
    /// # 默认值
    /// - EXCLUDE
    fn get_future_date_policy(&self) -> ImportResult<FutureDatePolicy>;

    /// 电子表格序列日区间（两端包含）
    ///
    /// # 默认值
    /// - (30000, 60000)
    fn get_serial_date_range(&self) -> ImportResult<(i64, i64)>;

    /// 预览行数
    ///
    /// # 默认值
    /// - 20
    fn get_preview_rows(&self) -> ImportResult<usize>;

    /// 文件导入时是否跳过已导入路径
    ///
    /// # 默认值
    /// - true
    fn get_skip_imported_files(&self) -> ImportResult<bool>;
}
