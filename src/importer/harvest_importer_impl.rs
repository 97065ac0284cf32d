// ==========================================
// 收获记录导入系统 - 导入管道实现
// ==========================================
// 职责: 串联 编码判定 → 表头归一化 → 字段转换 → 行校验 → 去重导入
// 红线:
// - 文件级失败（解码/表头/未来日策略）不写存储
// - 存储失败整批回滚，作为一次导入失败返回
// - 批内行级剔除只计数
// ==========================================

use crate::config::ingest_config::IngestConfig;
use crate::domain::harvest::{HarvestRecord, ImportBatch, IngestOutcome};
use crate::domain::types::{FutureDatePolicy, RejectReason};
use crate::engine::dedup_ingest::DedupIngestEngine;
use crate::importer::encoding_resolver::EncodingResolver;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_coercer::FieldCoercer;
use crate::importer::harvest_importer_trait::{
    FileImportStatus, HarvestImporter, IngestReport, PreparedBatch,
};
use crate::importer::header_normalizer::HeaderNormalizer;
use crate::importer::record_validator::RecordValidator;
use crate::repository::harvest_store::HarvestStore;
use crate::repository::import_log_repo::ImportLogRepository;
use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 可导入的文件扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["csv", "xlsx"];

// ==========================================
// HarvestImporterImpl
// ==========================================
pub struct HarvestImporterImpl<S: HarvestStore> {
    store: S,
    import_log: Option<ImportLogRepository>,
    config: IngestConfig,
    resolver: EncodingResolver,
    normalizer: HeaderNormalizer,
    validator: RecordValidator,
    engine: DedupIngestEngine,
}

impl<S: HarvestStore> HarvestImporterImpl<S> {
    /// 创建导入管道
    ///
    /// # 参数
    /// - store: 存储协作方
    /// - config: 导入配置快照
    pub fn new(store: S, config: IngestConfig) -> Self {
        let coercer = FieldCoercer::new(config.serial_date_min, config.serial_date_max);
        Self {
            store,
            import_log: None,
            config,
            resolver: EncodingResolver::new(),
            normalizer: HeaderNormalizer::new(),
            validator: RecordValidator::new(coercer),
            engine: DedupIngestEngine::new(),
        }
    }

    /// 启用导入日志（文件导入的跳过判定与批次记录）
    pub fn with_import_log(mut self, import_log: ImportLogRepository) -> Self {
        self.import_log = Some(import_log);
        self
    }

    pub fn with_normalizer(mut self, normalizer: HeaderNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    fn record_batch(&self, report: &IngestReport, source_path: Option<&str>) {
        let Some(log) = &self.import_log else {
            return;
        };

        let batch = ImportBatch {
            batch_id: report.batch_id.clone(),
            source_path: source_path.map(str::to_string),
            file_name: report.source_file.clone(),
            encoding: report.encoding.clone(),
            attempted: report.outcome.attempted,
            inserted: report.outcome.inserted,
            skipped: report.outcome.skipped_as_duplicate,
            rejected: report.outcome.rejected.clone(),
            imported_at: Utc::now(),
        };

        // 数据已提交，日志写入失败只告警
        if let Err(e) = log.insert(&batch) {
            warn!(batch_id = %batch.batch_id, error = %e, "导入日志写入失败");
        }
    }
}

impl<S: HarvestStore> HarvestImporter for HarvestImporterImpl<S> {
    #[instrument(skip(self, bytes), fields(batch_id, bytes = bytes.len()))]
    fn prepare(
        &self,
        bytes: &[u8],
        source_file: Option<&str>,
        today: NaiveDate,
    ) -> ImportResult<PreparedBatch> {
        let started_at = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());

        // === 步骤 1+2: 编码判定 + 表头检测（联合选择） ===
        debug!("步骤 1: 编码判定与表头检测");
        let (decoded, mapping) = match self
            .resolver
            .resolve_with(bytes, |table| self.normalizer.detect(&table.headers))
        {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(error = %e, "文件无法解析");
                return Err(e);
            }
        };
        info!(
            encoding = %decoded.encoding,
            rows = decoded.table.row_count(),
            amount_unit = ?mapping.amount_unit,
            "表头检测完成"
        );

        // === 步骤 3+4: 字段转换 + 行校验 ===
        debug!("步骤 2: 字段转换与行校验");
        let cleansed = self
            .validator
            .cleanse(&decoded.table, &mapping, today, source_file);

        let future_rows = cleansed.rejected_count(RejectReason::FutureDate);
        if future_rows > 0 && self.config.future_date_policy == FutureDatePolicy::FailFile {
            warn!(count = future_rows, %today, "存在未来日行，整文件拒绝");
            return Err(ImportError::FutureDatedRows {
                count: future_rows,
                today,
            });
        }

        info!(
            attempted = cleansed.attempted,
            valid = cleansed.records.len(),
            rejected = ?cleansed.rejected,
            "行校验完成"
        );

        Ok(PreparedBatch {
            batch_id,
            source_file: source_file.map(str::to_string),
            encoding: decoded.encoding,
            mapping,
            cleansed,
            preview_rows: self.config.preview_rows,
            started_at,
        })
    }

    fn preview_duplicates(&self, prepared: &PreparedBatch) -> ImportResult<Vec<HarvestRecord>> {
        let records = &prepared.cleansed.records;
        let existing = self.engine.existing_for(&self.store, records)?;
        Ok(self.engine.partition(records, &existing).duplicates)
    }

    #[instrument(skip(self, prepared), fields(batch_id = %prepared.batch_id))]
    fn commit(
        &self,
        prepared: &PreparedBatch,
        source_path: Option<&str>,
    ) -> ImportResult<IngestReport> {
        // === 步骤 5: 去重导入（单事务） ===
        let result = match self.engine.ingest(&self.store, &prepared.cleansed.records) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "落库失败，整批回滚");
                return Err(ImportError::Storage(e));
            }
        };

        let outcome = IngestOutcome {
            attempted: prepared.cleansed.attempted,
            inserted: result.inserted,
            skipped_as_duplicate: result.skipped_as_duplicate,
            rejected: prepared.cleansed.rejected.clone(),
        };

        let report = IngestReport {
            batch_id: prepared.batch_id.clone(),
            source_file: prepared.source_file.clone(),
            encoding: prepared.encoding.clone(),
            outcome,
            rejections: prepared.cleansed.rejections.clone(),
            preview: prepared.preview().to_vec(),
            elapsed_ms: prepared.started_at.elapsed().as_millis() as u64,
        };

        self.record_batch(&report, source_path);

        info!(
            encoding = %report.encoding,
            attempted = report.outcome.attempted,
            inserted = report.outcome.inserted,
            skipped = report.outcome.skipped_as_duplicate,
            rejected = report.outcome.rejected_total(),
            elapsed_ms = report.elapsed_ms,
            "收获记录导入完成"
        );
        Ok(report)
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    fn import_file(
        &self,
        path: &Path,
        today: NaiveDate,
        force: bool,
    ) -> ImportResult<FileImportStatus> {
        if !path.is_file() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        if !is_supported_file(path) {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_default();
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let source_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();

        if self.config.skip_imported_files && !force {
            if let Some(log) = &self.import_log {
                if log.has_been_imported(&source_path)? {
                    info!(source_path = %source_path, "已导入过，跳过");
                    return Ok(FileImportStatus::Skipped { source_path });
                }
            }
        }

        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string());

        let prepared = self.prepare(&bytes, file_name.as_deref(), today)?;
        let report = self.commit(&prepared, Some(&source_path))?;
        Ok(FileImportStatus::Imported(report))
    }

    fn batch_import(
        &self,
        paths: &[PathBuf],
        today: NaiveDate,
        force: bool,
    ) -> Vec<(PathBuf, ImportResult<FileImportStatus>)> {
        info!(count = paths.len(), "开始批量导入文件");

        let results: Vec<(PathBuf, ImportResult<FileImportStatus>)> = paths
            .iter()
            .map(|path| {
                let result = self.import_file(path, today, force);
                if let Err(e) = &result {
                    error!(file = %path.display(), error = %e, "文件导入失败");
                }
                (path.clone(), result)
            })
            .collect();

        info!(
            total = results.len(),
            failed = results.iter().filter(|(_, r)| r.is_err()).count(),
            "批量导入完成"
        );
        results
    }
}

/// 扩展名是否受支持（大小写不敏感）
pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let ext = e.to_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// 展开输入路径: 文件原样保留，目录取其中受支持的文件（按文件名排序，不递归）
pub fn collect_input_files(inputs: &[PathBuf]) -> ImportResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_file(p))
                .collect();
            entries.sort();
            files.extend(entries);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::types::CanonicalHeader;
    use crate::repository::harvest_store_impl::SqliteHarvestStore;
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn importer(config: IngestConfig) -> HarvestImporterImpl<SqliteHarvestStore> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        HarvestImporterImpl::new(SqliteHarvestStore::from_connection(conn.clone()), config)
            .with_import_log(ImportLogRepository::from_connection(conn))
    }

    const CSV: &str = "収穫日,企業名,収穫野菜名,収穫量（ｇ）\n\
                       2025/8/17,A社,トマト,1500\n\
                       2025/8/17,A社,トマト,1500\n\
                       2025/8/30,B社,ナス,800\n\
                       2025/8/18,,ナス,800\n";

    #[test]
    fn test_ingest_counts_balance() {
        let importer = importer(IngestConfig::default());
        let report = importer
            .ingest(CSV.as_bytes(), Some("a.csv"), d(2025, 8, 20))
            .unwrap();

        let outcome = &report.outcome;
        assert_eq!(report.encoding, "utf-8-sig");
        assert_eq!(outcome.attempted, 4);
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped_as_duplicate, 1);
        assert_eq!(outcome.rejected_count(RejectReason::FutureDate), 1);
        assert_eq!(outcome.rejected_count(RejectReason::MissingRequiredField), 1);
        assert!(outcome.is_balanced());
        assert_eq!(report.rejections.len(), 2);
    }

    #[test]
    fn test_fail_file_policy_persists_nothing() {
        let config = IngestConfig::default().with_future_date_policy(FutureDatePolicy::FailFile);
        let importer = importer(config);
        let err = importer
            .ingest(CSV.as_bytes(), None, d(2025, 8, 20))
            .unwrap_err();
        assert!(matches!(err, ImportError::FutureDatedRows { count: 1, .. }));
        assert_eq!(importer.store().count().unwrap(), 0);
    }

    #[test]
    fn test_preview_duplicates_before_commit() {
        let importer = importer(IngestConfig::default());
        importer
            .ingest(CSV.as_bytes(), None, d(2025, 8, 20))
            .unwrap();

        let prepared = importer
            .prepare(CSV.as_bytes(), None, d(2025, 8, 31))
            .unwrap();
        assert_eq!(prepared.cleansed.records.len(), 3);
        let dups = importer.preview_duplicates(&prepared).unwrap();
        assert_eq!(dups.len(), 2);
        assert_eq!(prepared.preview().len(), 3);
    }

    #[test]
    fn test_header_failure_writes_nothing() {
        let importer = importer(IngestConfig::default());
        let err = importer
            .ingest("収穫日,企業名,収穫量\n2025/8/17,A社,1500\n".as_bytes(), None, d(2025, 8, 20))
            .unwrap_err();
        assert!(matches!(err, ImportError::HeaderDetectionFailure { .. }));
        assert_eq!(importer.store().count().unwrap(), 0);
    }

    #[test]
    fn test_custom_header_synonym() {
        let body = "収穫日,企業名,品種,収穫量（ｇ）\n2025/8/17,A社,トマト,1500\n";

        let plain = importer(IngestConfig::default());
        assert!(matches!(
            plain.ingest(body.as_bytes(), None, d(2025, 8, 20)),
            Err(ImportError::HeaderDetectionFailure { .. })
        ));

        let custom = importer(IngestConfig::default()).with_normalizer(
            HeaderNormalizer::new().with_synonym(CanonicalHeader::Crop, "品種"),
        );
        let report = custom
            .ingest(body.as_bytes(), None, d(2025, 8, 20))
            .unwrap();
        assert_eq!(report.outcome.inserted, 1);
    }

    #[test]
    fn test_serial_range_reaches_validator() {
        let config = IngestConfig {
            serial_date_min: 44000,
            serial_date_max: 44500,
            ..IngestConfig::default()
        };
        let importer = importer(config);
        let coercer = importer.validator.coercer();
        assert_eq!(coercer.serial_date_min, 44000);
        assert_eq!(coercer.serial_date_max, 44500);
    }

    #[test]
    fn test_is_supported_file() {
        assert!(is_supported_file(Path::new("2025_08_17.CSV")));
        assert!(is_supported_file(Path::new("book.xlsx")));
        assert!(!is_supported_file(Path::new("notes.txt")));
        assert!(!is_supported_file(Path::new("noext")));
    }
}
