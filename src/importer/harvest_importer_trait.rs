// ==========================================
// 收获记录导入系统 - 导入接口定义
// ==========================================
// 职责: 定义导入管道主接口与阶段产物（不包含实现）
// 流程: 编码判定 → 表头归一化 → 字段转换 → 行校验 → 去重导入
// ==========================================

use crate::domain::harvest::{HarvestRecord, IngestOutcome, RowRejection};
use crate::importer::error::ImportResult;
use crate::importer::header_normalizer::HeaderMapping;
use crate::importer::record_validator::CleansedBatch;
use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

// ==========================================
// PreparedBatch - 纯阶段产物（尚未落库）
// ==========================================
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub batch_id: String,
    pub source_file: Option<String>,
    pub encoding: String,
    pub mapping: HeaderMapping,
    pub cleansed: CleansedBatch,
    pub preview_rows: usize,
    pub started_at: Instant,
}

impl PreparedBatch {
    /// 前 preview_rows 条有效记录
    pub fn preview(&self) -> &[HarvestRecord] {
        let n = self.preview_rows.min(self.cleansed.records.len());
        &self.cleansed.records[..n]
    }

    pub fn attempted(&self) -> usize {
        self.cleansed.attempted
    }
}

// ==========================================
// IngestReport - 单次导入报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub batch_id: String,
    pub source_file: Option<String>,
    pub encoding: String,
    pub outcome: IngestOutcome,
    pub rejections: Vec<RowRejection>,
    pub preview: Vec<HarvestRecord>,
    pub elapsed_ms: u64,
}

/// 文件导入状态
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileImportStatus {
    Imported(IngestReport),
    Skipped { source_path: String },
}

// ==========================================
// HarvestImporter Trait
// ==========================================
// 实现者: HarvestImporterImpl
pub trait HarvestImporter: Send + Sync {
    /// 执行所有纯阶段（不写存储）
    ///
    /// # 参数
    /// - bytes: 文件原始字节（CSV 任意候选编码，或 xlsx）
    /// - source_file: 来源标识（记录在每条记录上）
    /// - today: 未来日判定基准（调用方提供）
    ///
    /// # 返回
    /// - Err(DecodeFailure / HeaderDetectionFailure): 整个文件无法导入
    /// - Err(FutureDatedRows): FAIL_FILE 策略下存在未来日行
    fn prepare(
        &self,
        bytes: &[u8],
        source_file: Option<&str>,
        today: NaiveDate,
    ) -> ImportResult<PreparedBatch>;

    /// 已存在于存储或批内重复的记录（提交前预览）
    fn preview_duplicates(&self, prepared: &PreparedBatch) -> ImportResult<Vec<HarvestRecord>>;

    /// 去重落库
    ///
    /// # 参数
    /// - source_path: 文件导入时的绝对路径（写入导入日志）
    fn commit(&self, prepared: &PreparedBatch, source_path: Option<&str>)
        -> ImportResult<IngestReport>;

    /// prepare + commit
    fn ingest(
        &self,
        bytes: &[u8],
        source_file: Option<&str>,
        today: NaiveDate,
    ) -> ImportResult<IngestReport> {
        let prepared = self.prepare(bytes, source_file, today)?;
        self.commit(&prepared, None)
    }

    /// 导入单个文件（.csv / .xlsx）
    ///
    /// # 说明
    /// - 已记录在导入日志中的路径按配置跳过，force=true 时强制导入
    fn import_file(&self, path: &Path, today: NaiveDate, force: bool)
        -> ImportResult<FileImportStatus>;

    /// 顺序导入多个文件（单写者）
    ///
    /// # 说明
    /// - 每个文件的导入相互独立，某个文件失败不影响其他文件
    fn batch_import(
        &self,
        paths: &[PathBuf],
        today: NaiveDate,
        force: bool,
    ) -> Vec<(PathBuf, ImportResult<FileImportStatus>)>;
}
