// ==========================================
// 收获记录导入系统 - 收获事实领域模型
// ==========================================
// 职责: HarvestRecord / 去重身份 / 导入结果 / 查询条件 / 汇总视图
// 红线: 去重身份 = (harvest_date, company, crop, amount_kg 三位小数)
//       source_file 只是元数据，不参与身份
// ==========================================

use crate::domain::types::RejectReason;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 比较用的数量精度（小数位）
pub const AMOUNT_DECIMALS: u32 = 3;

/// 可导入的最大数量（kg），保证去重键不溢出 i64
pub const MAX_AMOUNT_KG: f64 = 9.0e15;

/// 将 kg 数量换算为去重比较用的整数键（1 = 0.001kg）
///
/// 只在比较时取整，落库保留原始精度。
pub fn amount_key(amount_kg: f64) -> i64 {
    (amount_kg * 10f64.powi(AMOUNT_DECIMALS as i32)).round() as i64
}

// ==========================================
// HarvestRecord - 收获事实
// ==========================================
// 生命周期: 导入管道根据一行有效输入生成，之后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestRecord {
    pub harvest_date: NaiveDate,     // 收获日
    pub company: String,             // 企业名（已 trim，非空）
    pub crop: String,                // 作物名（已 trim，非空）
    pub amount_kg: f64,              // 收获量（kg，非负，全精度）
    pub source_file: Option<String>, // 来源文件（元数据）
}

impl HarvestRecord {
    pub fn new(
        harvest_date: NaiveDate,
        company: impl Into<String>,
        crop: impl Into<String>,
        amount_kg: f64,
    ) -> Self {
        Self {
            harvest_date,
            company: company.into(),
            crop: crop.into(),
            amount_kg,
            source_file: None,
        }
    }

    pub fn with_source(mut self, source_file: Option<String>) -> Self {
        self.source_file = source_file;
        self
    }

    /// 去重身份
    pub fn identity(&self) -> RecordIdentity {
        RecordIdentity {
            harvest_date: self.harvest_date,
            company: self.company.clone(),
            crop: self.crop.clone(),
            amount_key: amount_key(self.amount_kg),
        }
    }
}

// ==========================================
// RecordIdentity - 去重身份四元组
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIdentity {
    pub harvest_date: NaiveDate,
    pub company: String,
    pub crop: String,
    pub amount_key: i64,
}

// ==========================================
// RowRejection - 行级剔除明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRejection {
    pub row_number: usize, // 数据行号（从 1 开始，不含表头）
    pub reason: RejectReason,
}

// ==========================================
// IngestOutcome - 单次导入结果
// ==========================================
// 不落库，返回调用方用于展示
// 不变式: attempted = inserted + skipped_as_duplicate + Σ rejected
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub attempted: usize,
    pub inserted: usize,
    pub skipped_as_duplicate: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
}

impl IngestOutcome {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }

    /// 每一行都必须落在某个计数里
    pub fn is_balanced(&self) -> bool {
        self.attempted == self.inserted + self.skipped_as_duplicate + self.rejected_total()
    }
}

// ==========================================
// ImportBatch - 导入日志条目
// ==========================================
// 对齐: harvest_import_log 表
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,                // 批次 ID（UUID）
    pub source_path: Option<String>,     // 源文件路径（文件导入时）
    pub file_name: Option<String>,       // 源文件名 / 来源标识
    pub encoding: String,                // 采用的编码候选
    pub attempted: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub rejected: BTreeMap<RejectReason, usize>,
    pub imported_at: DateTime<Utc>,
}

// ==========================================
// HarvestFilter - 查询条件
// ==========================================
// 空集合 = 不过滤；日期区间两端包含
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub companies: Vec<String>,
    pub crops: Vec<String>,
}

impl HarvestFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(date_from: NaiveDate, date_to: NaiveDate) -> Self {
        Self {
            date_from: Some(date_from),
            date_to: Some(date_to),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &HarvestRecord) -> bool {
        if let Some(from) = self.date_from {
            if record.harvest_date < from {
                return false;
            }
        }
        if let Some(to) = self.date_to {
            if record.harvest_date > to {
                return false;
            }
        }
        if !self.companies.is_empty() && !self.companies.contains(&record.company) {
            return false;
        }
        if !self.crops.is_empty() && !self.crops.contains(&record.crop) {
            return false;
        }
        true
    }
}

// ==========================================
// 汇总视图
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub key: String,
    pub amount_kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotal {
    pub harvest_date: NaiveDate,
    pub amount_kg: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub record_count: usize,
    pub total_kg: f64,
    pub harvest_days: usize,
    pub avg_kg_per_day: f64,
    pub company_count: usize,
    pub crop_count: usize,
    pub company_ranking: Vec<RankingEntry>, // kg 降序
    pub crop_ranking: Vec<RankingEntry>,    // kg 降序
    pub daily_totals: Vec<DailyTotal>,      // 日期升序
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_amount_key_absorbs_float_noise() {
        assert_eq!(amount_key(1.234), 1234);
        assert_eq!(amount_key(1.2340000000001), 1234);
        assert_eq!(amount_key(0.1 + 0.2), 300);
        assert_eq!(amount_key(0.0), 0);
    }

    #[test]
    fn test_amount_key_distinct_at_max_amount() {
        assert!(amount_key(MAX_AMOUNT_KG) < i64::MAX);
        assert_ne!(amount_key(MAX_AMOUNT_KG), amount_key(MAX_AMOUNT_KG - 1.0));
    }

    #[test]
    fn test_identity_ignores_source_file() {
        let a = HarvestRecord::new(d(2025, 8, 18), "A社", "トマト", 1.2)
            .with_source(Some("a.csv".to_string()));
        let b = HarvestRecord::new(d(2025, 8, 18), "A社", "トマト", 1.2)
            .with_source(Some("b.csv".to_string()));
        assert_ne!(a, b);
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_outcome_balance() {
        let mut outcome = IngestOutcome {
            attempted: 10,
            inserted: 5,
            skipped_as_duplicate: 2,
            ..Default::default()
        };
        outcome.rejected.insert(RejectReason::FutureDate, 3);
        assert!(outcome.is_balanced());
        assert_eq!(outcome.rejected_count(RejectReason::FutureDate), 3);
        assert_eq!(outcome.rejected_count(RejectReason::NegativeAmount), 0);
    }

    #[test]
    fn test_filter_matches() {
        let record = HarvestRecord::new(d(2025, 8, 18), "A社", "トマト", 1.2);

        assert!(HarvestFilter::all().matches(&record));
        assert!(HarvestFilter::between(d(2025, 8, 18), d(2025, 8, 18)).matches(&record));
        assert!(!HarvestFilter::between(d(2025, 8, 19), d(2025, 8, 31)).matches(&record));

        let filter = HarvestFilter {
            companies: vec!["B社".to_string()],
            ..Default::default()
        };
        assert!(!filter.matches(&record));
    }
}
