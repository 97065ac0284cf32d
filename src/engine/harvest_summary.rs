// ==========================================
// 收获记录导入系统 - 收获汇总引擎
// ==========================================
// 职责: 查询结果 → 汇总指标（合计 / 日均 / 企业与作物排行 / 日别合计）
// 红线: 无状态引擎，纯函数，不访问存储
// ==========================================

use crate::domain::harvest::{DailyTotal, HarvestRecord, HarvestSummary, RankingEntry};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct HarvestSummaryEngine;

impl Default for HarvestSummaryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestSummaryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 计算汇总
    pub fn summarize(&self, records: &[HarvestRecord]) -> HarvestSummary {
        if records.is_empty() {
            return HarvestSummary::default();
        }

        let mut by_company: BTreeMap<&str, f64> = BTreeMap::new();
        let mut by_crop: BTreeMap<&str, f64> = BTreeMap::new();
        let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        let mut total_kg = 0.0;

        for record in records {
            total_kg += record.amount_kg;
            *by_company.entry(record.company.as_str()).or_insert(0.0) += record.amount_kg;
            *by_crop.entry(record.crop.as_str()).or_insert(0.0) += record.amount_kg;
            *by_day.entry(record.harvest_date).or_insert(0.0) += record.amount_kg;
        }

        let harvest_days = by_day.len();
        HarvestSummary {
            record_count: records.len(),
            total_kg,
            harvest_days,
            avg_kg_per_day: total_kg / harvest_days as f64,
            company_count: by_company.len(),
            crop_count: by_crop.len(),
            company_ranking: ranking(&by_company),
            crop_ranking: ranking(&by_crop),
            daily_totals: by_day
                .into_iter()
                .map(|(harvest_date, amount_kg)| DailyTotal {
                    harvest_date,
                    amount_kg,
                })
                .collect(),
        }
    }
}

/// kg 降序，同量按名称升序
fn ranking(totals: &BTreeMap<&str, f64>) -> Vec<RankingEntry> {
    let mut entries: Vec<RankingEntry> = totals
        .iter()
        .map(|(key, amount_kg)| RankingEntry {
            key: key.to_string(),
            amount_kg: *amount_kg,
        })
        .collect();
    entries.sort_by(|a, b| {
        b.amount_kg
            .total_cmp(&a.amount_kg)
            .then_with(|| a.key.cmp(&b.key))
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, day).unwrap()
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            HarvestRecord::new(d(17), "A社", "トマト", 1.5),
            HarvestRecord::new(d(17), "B社", "ナス", 3.0),
            HarvestRecord::new(d(18), "A社", "ナス", 0.5),
        ];
        let summary = HarvestSummaryEngine::new().summarize(&records);

        assert_eq!(summary.record_count, 3);
        assert_eq!(summary.total_kg, 5.0);
        assert_eq!(summary.harvest_days, 2);
        assert_eq!(summary.avg_kg_per_day, 2.5);
        assert_eq!(summary.company_count, 2);
        assert_eq!(summary.crop_ranking[0].key, "ナス");
        assert_eq!(summary.crop_ranking[0].amount_kg, 3.5);
        assert_eq!(summary.company_ranking[0].key, "B社");
        assert_eq!(summary.daily_totals[0].harvest_date, d(17));
        assert_eq!(summary.daily_totals[0].amount_kg, 4.5);
    }

    #[test]
    fn test_ranking_ties_break_by_name() {
        let records = vec![
            HarvestRecord::new(d(17), "B社", "トマト", 1.0),
            HarvestRecord::new(d(17), "A社", "トマト", 1.0),
        ];
        let summary = HarvestSummaryEngine::new().summarize(&records);
        assert_eq!(summary.company_ranking[0].key, "A社");
    }

    #[test]
    fn test_summarize_empty() {
        let summary = HarvestSummaryEngine::new().summarize(&[]);
        assert_eq!(summary.record_count, 0);
        assert_eq!(summary.avg_kg_per_day, 0.0);
    }
}
