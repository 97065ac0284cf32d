// ==========================================
// 收获记录导入系统 - 记录校验器
// ==========================================
// 职责: 原始行 → HarvestRecord 或剔除原因
// 校验顺序（命中即停）:
// 1. 任一必需字段缺失或无法转换 → MissingRequiredField
// 2. 收获日晚于今天              → FutureDate
// 3. 收获量为负                  → NegativeAmount
// 红线: 行级剔除只计数，不中断批次；"今天"由调用方传入
// ==========================================

use crate::domain::harvest::{HarvestRecord, RowRejection};
use crate::domain::types::{CanonicalHeader, RejectReason};
use crate::importer::field_coercer::FieldCoercer;
use crate::importer::file_parser::RawTable;
use crate::importer::header_normalizer::HeaderMapping;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

// ==========================================
// CleansedBatch - 校验结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleansedBatch {
    pub attempted: usize,                        // 读取的数据行数
    pub records: Vec<HarvestRecord>,             // 通过校验的记录（文件行顺序）
    pub rejected: BTreeMap<RejectReason, usize>, // 剔除计数
    pub rejections: Vec<RowRejection>,           // 剔除明细
}

impl CleansedBatch {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn rejected_count(&self, reason: RejectReason) -> usize {
        self.rejected.get(&reason).copied().unwrap_or(0)
    }
}

// ==========================================
// RecordValidator
// ==========================================
pub struct RecordValidator {
    coercer: FieldCoercer,
}

impl RecordValidator {
    pub fn new(coercer: FieldCoercer) -> Self {
        Self { coercer }
    }

    pub fn coercer(&self) -> &FieldCoercer {
        &self.coercer
    }

    /// 校验单行
    pub fn validate_row(
        &self,
        row: &[String],
        mapping: &HeaderMapping,
        today: NaiveDate,
        source_file: Option<&str>,
    ) -> Result<HarvestRecord, RejectReason> {
        let cell = |tag: CanonicalHeader| -> &str {
            mapping
                .column(tag)
                .and_then(|c| row.get(c))
                .map(String::as_str)
                .unwrap_or("")
        };

        let harvest_date = self.coercer.coerce_date(cell(CanonicalHeader::HarvestDate));
        let company = self.coercer.coerce_text(cell(CanonicalHeader::Company));
        let crop = self.coercer.coerce_text(cell(CanonicalHeader::Crop));
        let amount_kg = self
            .coercer
            .coerce_amount_kg(cell(CanonicalHeader::AmountMass), mapping.amount_unit);

        let (harvest_date, company, crop, amount_kg) = match (harvest_date, company, crop, amount_kg)
        {
            (Some(d), Some(c), Some(v), Some(a)) => (d, c, v, a),
            _ => return Err(RejectReason::MissingRequiredField),
        };

        if harvest_date > today {
            return Err(RejectReason::FutureDate);
        }
        if amount_kg < 0.0 {
            return Err(RejectReason::NegativeAmount);
        }

        Ok(HarvestRecord::new(harvest_date, company, crop, amount_kg)
            .with_source(source_file.map(str::to_string)))
    }

    /// 校验整张表
    pub fn cleanse(
        &self,
        table: &RawTable,
        mapping: &HeaderMapping,
        today: NaiveDate,
        source_file: Option<&str>,
    ) -> CleansedBatch {
        let mut batch = CleansedBatch {
            attempted: table.row_count(),
            ..Default::default()
        };

        for (idx, row) in table.rows.iter().enumerate() {
            match self.validate_row(row, mapping, today, source_file) {
                Ok(record) => batch.records.push(record),
                Err(reason) => {
                    *batch.rejected.entry(reason).or_insert(0) += 1;
                    batch.rejections.push(RowRejection {
                        row_number: idx + 1,
                        reason,
                    });
                }
            }
        }

        debug!(
            attempted = batch.attempted,
            valid = batch.records.len(),
            rejected = batch.rejected_total(),
            "行校验完成"
        );
        batch
    }
}

impl Default for RecordValidator {
    fn default() -> Self {
        Self::new(FieldCoercer::default())
    }
}
