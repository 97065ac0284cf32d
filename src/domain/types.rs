// ==========================================
// 收获记录导入系统 - 领域类型定义
// ==========================================
// 职责: 规范列标签、质量单位、剔除原因、未来日策略
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CanonicalHeader - 规范列标签
// ==========================================
// 用途: 原始表头（日文/全角/BOM 污染）经归一化后映射到的语义角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CanonicalHeader {
    HarvestDate, // 收获日
    Company,     // 企业名
    Crop,        // 作物名
    AmountMass,  // 收获量（g 或 kg）
}

impl CanonicalHeader {
    /// 四个必需标签（固定顺序，也是同一表头命中多个标签时的优先顺序）
    pub const REQUIRED: [CanonicalHeader; 4] = [
        CanonicalHeader::HarvestDate,
        CanonicalHeader::Company,
        CanonicalHeader::Crop,
        CanonicalHeader::AmountMass,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalHeader::HarvestDate => "harvest_date",
            CanonicalHeader::Company => "company",
            CanonicalHeader::Crop => "crop",
            CanonicalHeader::AmountMass => "amount",
        }
    }
}

impl fmt::Display for CanonicalHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// MassUnit - 质量单位提示
// ==========================================
// 来源: 数量列表头（如「収穫量（ｇ）」「収量(㎏)」）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MassUnit {
    Grams,
    Kilograms,
    #[default]
    Unknown,
}

// ==========================================
// RejectReason - 行级剔除原因
// ==========================================
// 红线: 剔除不致命，只计数，不中断批次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RejectReason {
    MissingRequiredField, // 必填字段缺失或无法转换
    FutureDate,           // 收获日晚于今天
    NegativeAmount,       // 收获量为负
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingRequiredField => "MissingRequiredField",
            RejectReason::FutureDate => "FutureDate",
            RejectReason::NegativeAmount => "NegativeAmount",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// FutureDatePolicy - 未来日处理策略
// ==========================================
// Exclude: 剔除并计数（默认）
// FailFile: 整个文件失败，不落库
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FutureDatePolicy {
    #[default]
    Exclude,
    FailFile,
}

impl FutureDatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FutureDatePolicy::Exclude => "EXCLUDE",
            FutureDatePolicy::FailFile => "FAIL_FILE",
        }
    }

    /// 从配置值解析（大小写不敏感）
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "EXCLUDE" => Some(FutureDatePolicy::Exclude),
            "FAIL_FILE" | "FAIL" => Some(FutureDatePolicy::FailFile),
            _ => None,
        }
    }
}
