// ==========================================
// 收获记录导入系统 - 导入层
// ==========================================
// 职责: 外部收获文件 → 规范化收获记录
// 支持: CSV (utf-8-sig / utf-8 / cp932 / utf-16le), Excel (.xlsx)
// ==========================================

// 模块声明
pub mod encoding_resolver;
pub mod error;
pub mod field_coercer;
pub mod file_parser;
pub mod harvest_importer_impl;
pub mod harvest_importer_trait;
pub mod header_normalizer;
pub mod record_validator;

// 重导出核心类型
pub use encoding_resolver::{DecodedTable, EncodingCandidate, EncodingResolver, DEFAULT_CANDIDATES};
pub use error::{DecodeAttempt, ImportError, ImportResult};
pub use field_coercer::{normalize_width, FieldCoercer};
pub use file_parser::RawTable;
pub use harvest_importer_impl::{collect_input_files, is_supported_file, HarvestImporterImpl};
pub use header_normalizer::{normalize_header, HeaderMapping, HeaderNormalizer};
pub use record_validator::{CleansedBatch, RecordValidator};

// 重导出 Trait 接口
pub use harvest_importer_trait::{FileImportStatus, HarvestImporter, IngestReport, PreparedBatch};
