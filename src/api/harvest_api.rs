// ==========================================
// 收获记录导入系统 - 收获数据 API
// ==========================================
// 职责: 条件查询、汇总、筛选项、CSV 导出
// 导出: UTF-8 (带 BOM)，表头 harvest_date,company,crop,amount_kg,source_file
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::harvest::{HarvestFilter, HarvestRecord, HarvestSummary};
use crate::engine::harvest_summary::HarvestSummaryEngine;
use crate::repository::{HarvestStore, SqliteHarvestStore};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 导出 CSV 表头
pub const EXPORT_HEADERS: [&str; 5] = ["harvest_date", "company", "crop", "amount_kg", "source_file"];

/// 筛选项（日期范围 + 可选企业 / 作物）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub companies: Vec<String>,
    pub crops: Vec<String>,
}

// ==========================================
// HarvestApi
// ==========================================
pub struct HarvestApi {
    store: Arc<dyn HarvestStore>,
    summary_engine: HarvestSummaryEngine,
}

impl HarvestApi {
    pub fn new(store: Arc<dyn HarvestStore>) -> Self {
        Self {
            store,
            summary_engine: HarvestSummaryEngine::new(),
        }
    }

    /// 按数据库路径打开
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let store = SqliteHarvestStore::new(db_path)?;
        Ok(Self::new(Arc::new(store)))
    }

    fn validate_filter(filter: &HarvestFilter) -> ApiResult<()> {
        if let (Some(from), Some(to)) = (filter.date_from, filter.date_to) {
            if from > to {
                return Err(ApiError::InvalidInput(format!(
                    "开始日期 {} 晚于结束日期 {}",
                    from, to
                )));
            }
        }
        Ok(())
    }

    /// 条件查询（日期 / 企业 / 作物 排序）
    pub fn search(&self, filter: &HarvestFilter) -> ApiResult<Vec<HarvestRecord>> {
        Self::validate_filter(filter)?;
        let records = self.store.query(filter)?;
        debug!(count = records.len(), "收获记录查询完成");
        Ok(records)
    }

    /// 条件汇总
    pub fn summary(&self, filter: &HarvestFilter) -> ApiResult<HarvestSummary> {
        let records = self.search(filter)?;
        Ok(self.summary_engine.summarize(&records))
    }

    /// 筛选项（空库时日期为 None）
    pub fn filter_options(&self) -> ApiResult<FilterOptions> {
        let bounds = self.store.date_bounds()?;
        Ok(FilterOptions {
            date_from: bounds.map(|(min, _)| min),
            date_to: bounds.map(|(_, max)| max),
            companies: self.store.distinct_companies()?,
            crops: self.store.distinct_crops()?,
        })
    }

    /// 导出为 CSV 字节
    pub fn export_csv(&self, filter: &HarvestFilter) -> ApiResult<Vec<u8>> {
        let records = self.search(filter)?;
        records_to_csv(&records)
    }

    /// 导出到文件，返回导出行数
    pub fn export_csv_to(&self, filter: &HarvestFilter, path: &Path) -> ApiResult<usize> {
        let records = self.search(filter)?;
        let bytes = records_to_csv(&records)?;
        std::fs::write(path, bytes)
            .map_err(|e| ApiError::InternalError(format!("写入 {} 失败: {}", path.display(), e)))?;
        info!(path = %path.display(), rows = records.len(), "CSV 导出完成");
        Ok(records.len())
    }
}

/// 记录 → UTF-8 (BOM) CSV
pub fn records_to_csv(records: &[HarvestRecord]) -> ApiResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    let to_api = |e: csv::Error| ApiError::InternalError(format!("CSV 写入失败: {}", e));

    writer.write_record(EXPORT_HEADERS).map_err(to_api)?;
    for record in records {
        writer
            .write_record([
                record.harvest_date.format("%Y-%m-%d").to_string(),
                record.company.clone(),
                record.crop.clone(),
                record.amount_kg.to_string(),
                record.source_file.clone().unwrap_or_default(),
            ])
            .map_err(to_api)?;
    }

    writer
        .into_inner()
        .map_err(|e| ApiError::InternalError(format!("CSV 写入失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_to_csv_has_bom_and_headers() {
        let records = vec![HarvestRecord::new(
            NaiveDate::from_ymd_opt(2025, 8, 17).unwrap(),
            "A社",
            "トマト",
            1.5,
        )
        .with_source(Some("2025_08_17.csv".to_string()))];

        let bytes = records_to_csv(&records).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("harvest_date,company,crop,amount_kg,source_file"));
        assert_eq!(lines.next(), Some("2025-08-17,A社,トマト,1.5,2025_08_17.csv"));
    }

    #[test]
    fn test_records_to_csv_empty_source() {
        let records = vec![HarvestRecord::new(
            NaiveDate::from_ymd_opt(2025, 8, 17).unwrap(),
            "A社",
            "ナス",
            2.0,
        )];
        let bytes = records_to_csv(&records).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.contains("2025-08-17,A社,ナス,2,\n"));
    }
}
