// ==========================================
// 收获记录导入系统 - 导入配置快照
// ==========================================
// 职责: 一次导入所用的不可变配置（由 IngestConfigReader 解析而来）
// ==========================================

use crate::config::import_config_trait::IngestConfigReader;
use crate::domain::types::FutureDatePolicy;
use crate::importer::error::ImportResult;
use crate::importer::field_coercer::{DEFAULT_SERIAL_DATE_MAX, DEFAULT_SERIAL_DATE_MIN};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PREVIEW_ROWS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub future_date_policy: FutureDatePolicy,
    pub serial_date_min: i64,
    pub serial_date_max: i64,
    pub preview_rows: usize,
    pub skip_imported_files: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            future_date_policy: FutureDatePolicy::Exclude,
            serial_date_min: DEFAULT_SERIAL_DATE_MIN,
            serial_date_max: DEFAULT_SERIAL_DATE_MAX,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            skip_imported_files: true,
        }
    }
}

impl IngestConfig {
    /// 从配置读取器解析快照
    pub fn load(reader: &dyn IngestConfigReader) -> ImportResult<Self> {
        let (serial_date_min, serial_date_max) = reader.get_serial_date_range()?;
        Ok(Self {
            future_date_policy: reader.get_future_date_policy()?,
            serial_date_min,
            serial_date_max,
            preview_rows: reader.get_preview_rows()?,
            skip_imported_files: reader.get_skip_imported_files()?,
        })
    }

    pub fn with_future_date_policy(mut self, policy: FutureDatePolicy) -> Self {
        self.future_date_policy = policy;
        self
    }
}
