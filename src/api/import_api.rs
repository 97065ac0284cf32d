// ==========================================
// 收获记录导入 API
// ==========================================
// 职责: 封装导入管道（配置加载、导入日志、文件展开）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, IngestConfig};
use crate::domain::harvest::{HarvestRecord, ImportBatch, RowRejection};
use crate::domain::types::RejectReason;
use crate::importer::{
    collect_input_files, FileImportStatus, HarvestImporter, HarvestImporterImpl, IngestReport,
};
use crate::repository::{ImportLogRepository, SqliteHarvestStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// 导入API响应（单次字节导入）
pub type ImportApiResponse = IngestReport;

/// 单个文件的导入结果
#[derive(Debug, Clone, Serialize)]
pub struct FileImportResponse {
    pub path: String,
    /// imported / skipped / failed
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 试导入结果（不落库）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryRunResponse {
    pub path: String,
    pub encoding: String,
    pub attempted: usize,
    pub valid: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub rejections: Vec<RowRejection>,
    /// 已存在于存储或批内重复的记录数
    pub duplicates: usize,
    pub preview: Vec<HarvestRecord>,
}

/// 导入API
pub struct ImportApi {
    db_path: String,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    /// 读取导入配置（config_kv，缺失键取默认值）
    pub fn load_config(&self) -> ApiResult<IngestConfig> {
        let manager = ConfigManager::new(&self.db_path)?;
        Ok(IngestConfig::load(&manager)?)
    }

    fn create_importer(&self) -> ApiResult<HarvestImporterImpl<SqliteHarvestStore>> {
        let config = self.load_config()?;
        let store = SqliteHarvestStore::new(&self.db_path)?;
        let import_log = ImportLogRepository::new(&self.db_path)?;
        Ok(HarvestImporterImpl::new(store, config).with_import_log(import_log))
    }

    /// 导入内存中的文件内容
    ///
    /// # 参数
    /// - bytes: 文件原始字节
    /// - source_file: 来源标识
    /// - today: 未来日判定基准
    pub fn import_bytes(
        &self,
        bytes: &[u8],
        source_file: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<ImportApiResponse> {
        if bytes.is_empty() {
            return Err(ApiError::InvalidInput("文件内容为空".to_string()));
        }
        let importer = self.create_importer()?;
        Ok(importer.ingest(bytes, source_file, today)?)
    }

    /// 导入文件或目录（目录内 *.csv / *.xlsx 按文件名顺序）
    ///
    /// # 说明
    /// - 顺序执行（单写者），单个文件失败不影响其他文件
    pub fn import_paths(
        &self,
        inputs: &[PathBuf],
        today: NaiveDate,
        force: bool,
    ) -> ApiResult<Vec<FileImportResponse>> {
        let files = collect_input_files(inputs)?;
        if files.is_empty() {
            return Err(ApiError::InvalidInput("没有可导入的文件".to_string()));
        }

        let importer = self.create_importer()?;
        let responses: Vec<FileImportResponse> = importer
            .batch_import(&files, today, force)
            .into_iter()
            .map(|(path, result)| {
                let path = path.display().to_string();
                match result {
                    Ok(FileImportStatus::Imported(report)) => FileImportResponse {
                        path,
                        status: "imported".to_string(),
                        report: Some(report),
                        error: None,
                    },
                    Ok(FileImportStatus::Skipped { .. }) => FileImportResponse {
                        path,
                        status: "skipped".to_string(),
                        report: None,
                        error: None,
                    },
                    Err(e) => FileImportResponse {
                        path,
                        status: "failed".to_string(),
                        report: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();

        info!(
            files = responses.len(),
            imported = responses.iter().filter(|r| r.status == "imported").count(),
            "文件导入结束"
        );
        Ok(responses)
    }

    /// 试导入单个文件: 执行全部纯阶段并预览重复，不写存储
    pub fn dry_run(&self, path: &Path, today: NaiveDate) -> ApiResult<DryRunResponse> {
        if !path.is_file() {
            return Err(ApiError::NotFound(format!("文件 {}", path.display())));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| ApiError::ImportError(format!("文件读取失败: {}", e)))?;
        let file_name = path.file_name().map(|n| n.to_string_lossy().to_string());

        let importer = self.create_importer()?;
        let prepared = importer.prepare(&bytes, file_name.as_deref(), today)?;
        let duplicates = importer.preview_duplicates(&prepared)?;

        Ok(DryRunResponse {
            path: path.display().to_string(),
            encoding: prepared.encoding.clone(),
            attempted: prepared.attempted(),
            valid: prepared.cleansed.records.len(),
            rejected: prepared.cleansed.rejected.clone(),
            rejections: prepared.cleansed.rejections.clone(),
            duplicates: duplicates.len(),
            preview: prepared.preview().to_vec(),
        })
    }

    /// 试导入文件或目录（与 import_paths 相同的展开规则）
    pub fn dry_run_paths(
        &self,
        inputs: &[PathBuf],
        today: NaiveDate,
    ) -> ApiResult<Vec<DryRunResponse>> {
        let files = collect_input_files(inputs)?;
        if files.is_empty() {
            return Err(ApiError::InvalidInput("没有可导入的文件".to_string()));
        }
        files.iter().map(|path| self.dry_run(path, today)).collect()
    }

    /// 最近的导入批次
    pub fn recent_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        let repo = ImportLogRepository::new(&self.db_path)?;
        Ok(repo.recent(limit.clamp(1, 1000))?)
    }
}
