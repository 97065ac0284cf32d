// ==========================================
// 收获记录导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分类:
// - 文件级致命错误: DecodeFailure / HeaderDetectionFailure / FutureDatedRows
// - 行级剔除不是错误（见 RejectReason），只计数
// - 存储失败: 整批作为一次导入失败向上传递
// ==========================================

use crate::domain::types::CanonicalHeader;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 单个编码候选的失败记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeAttempt {
    pub label: String,
    pub message: String,
}

fn format_attempts(attempts: &[DecodeAttempt]) -> String {
    attempts
        .iter()
        .map(|a| format!("[{}] {}", a.label, a.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .csv/.xlsx）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 文件级致命错误 =====
    #[error("所有编码候选均无法解析为表格: {}", format_attempts(.attempts))]
    DecodeFailure { attempts: Vec<DecodeAttempt> },

    #[error("必需列缺失 {missing:?}，检测到的表头: {headers:?}")]
    HeaderDetectionFailure {
        headers: Vec<String>,
        missing: Vec<CanonicalHeader>,
    },

    #[error("存在 {count} 行未来日数据（晚于 {today}），按策略整文件拒绝")]
    FutureDatedRows { count: usize, today: NaiveDate },

    // ===== 存储错误 =====
    #[error("存储失败: {0}")]
    Storage(#[from] RepositoryError),

    // ===== 配置错误 =====
    #[error("配置读取失败 (key: {key}): {message}")]
    ConfigError { key: String, message: String },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::XlsxError>
impl From<calamine::XlsxError> for ImportError {
    fn from(err: calamine::XlsxError) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 存储层的 rusqlite 错误统一经由 RepositoryError
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::Storage(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
