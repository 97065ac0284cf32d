// ==========================================
// 收获记录导入系统 - 字段转换器
// ==========================================
// 职责: 原始单元格文本 → 类型化值（日期 / kg 数量 / 文本）
// 约束: 纯函数，无法转换时返回 None，从不 panic
// ==========================================

use crate::domain::harvest::MAX_AMOUNT_KG;
use crate::domain::types::MassUnit;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// 数值提取（取第一个匹配）
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("数值正则必须合法"));

/// 电子表格序列日默认区间（约 1982 ~ 2064 年）
pub const DEFAULT_SERIAL_DATE_MIN: i64 = 30_000;
pub const DEFAULT_SERIAL_DATE_MAX: i64 = 60_000;

/// 序列日可配置的上限（9999-12-31）
pub const SERIAL_DATE_LIMIT: i64 = 2_958_465;

/// 显式日期格式（宽度归一化之后按顺序尝试）
const EXPLICIT_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];
const EXPLICIT_DATETIME_FORMATS: [&str; 4] = [
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M",
];

/// 宽松兜底格式
const LENIENT_DATE_FORMATS: [&str; 4] = ["%Y年%m月%d日", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y"];
const LENIENT_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];

// ==========================================
// 宽度归一化
// ==========================================

/// 全角 ASCII → 半角，全角空格 → 空格，㎏ → kg
pub fn normalize_width(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\u{FF01}'..='\u{FF5E}' => {
                // 全角区与 ASCII 可见字符一一对应
                match char::from_u32(c as u32 - 0xFEE0) {
                    Some(half) => out.push(half),
                    None => out.push(c),
                }
            }
            '\u{3000}' => out.push(' '),
            '㎏' => out.push_str("kg"),
            _ => out.push(c),
        }
    }
    out
}

/// 序列日 0 点（1899-12-30，兼容 1900 闰年缺陷）
fn spreadsheet_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

// ==========================================
// FieldCoercer
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldCoercer {
    pub serial_date_min: i64,
    pub serial_date_max: i64,
}

impl Default for FieldCoercer {
    fn default() -> Self {
        Self {
            serial_date_min: DEFAULT_SERIAL_DATE_MIN,
            serial_date_max: DEFAULT_SERIAL_DATE_MAX,
        }
    }
}

impl FieldCoercer {
    pub fn new(serial_date_min: i64, serial_date_max: i64) -> Self {
        Self {
            serial_date_min,
            serial_date_max,
        }
    }

    /// 日期转换
    ///
    /// 顺序:
    /// 1. （宽度归一化后）纯数字且在序列日区间内 → 1899-12-30 + n 日
    /// 2. 宽度归一化后按显式格式解析（含时刻的取日期部分）
    /// 3. 宽松格式兜底（年月日汉字、点分、紧凑、美式、ISO、RFC 3339）
    pub fn coerce_date(&self, raw: &str) -> Option<NaiveDate> {
        let normalized = normalize_width(raw.trim());
        let normalized = normalized.trim();
        if normalized.is_empty() {
            return None;
        }

        if normalized.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(n) = normalized.parse::<i64>() {
                if (self.serial_date_min..=self.serial_date_max).contains(&n) {
                    return serial_to_date(n);
                }
            }
        }

        parse_explicit(normalized)
            .or_else(|| parse_lenient(normalized))
            .or_else(|| strip_weekday(normalized).and_then(parse_explicit))
    }

    /// 数量转换（结果单位 kg）
    ///
    /// 文本中的单位标记优先于表头提示；无任何单位信息时按克处理
    pub fn coerce_amount_kg(&self, raw: &str, hint: MassUnit) -> Option<f64> {
        // 全角 ．，已在宽度归一化中转为半角
        let normalized: String = normalize_width(raw)
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        let value: f64 = NUMBER_RE.find(&normalized)?.as_str().parse().ok()?;

        let text_kg = normalized.contains("kg") || normalized.contains("キロ");
        let text_g = !text_kg && (normalized.contains('g') || normalized.contains("グラム"));

        let kg = if text_kg {
            value
        } else if text_g {
            value / 1000.0
        } else {
            match hint {
                MassUnit::Kilograms => value,
                MassUnit::Grams | MassUnit::Unknown => value / 1000.0,
            }
        };

        // 超出去重键可表示范围的数量视为无法转换
        if !kg.is_finite() || kg.abs() > MAX_AMOUNT_KG {
            return None;
        }
        Some(kg)
    }

    /// 文本转换: trim 后为空视为缺失
    pub fn coerce_text(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// 序列日 → 日期（溢出返回 None）
fn serial_to_date(n: i64) -> Option<NaiveDate> {
    let epoch = spreadsheet_epoch()?;
    if n >= 0 {
        epoch.checked_add_days(Days::new(n.unsigned_abs()))
    } else {
        epoch.checked_sub_days(Days::new(n.unsigned_abs()))
    }
}

fn parse_explicit(value: &str) -> Option<NaiveDate> {
    EXPLICIT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            EXPLICIT_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_lenient(value: &str) -> Option<NaiveDate> {
    LENIENT_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            LENIENT_DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// 去掉末尾的星期标注，如 "2025/8/18(月)"
fn strip_weekday(value: &str) -> Option<&str> {
    let open = value.rfind('(')?;
    if !value.ends_with(')') || open == 0 {
        return None;
    }
    Some(value[..open].trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_normalize_width() {
        assert_eq!(normalize_width("１，２３４．５"), "1,234.5");
        assert_eq!(normalize_width("ＡＢＣ\u{3000}ｇ"), "ABC g");
        assert_eq!(normalize_width("3㎏"), "3kg");
        assert_eq!(normalize_width("トマト"), "トマト");
    }

    #[test]
    fn test_coerce_date_explicit_formats() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_date("2025/8/18"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date(" 2025-08-18 "), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("2025/08/18 09:30"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("2025-08-18 09:30:15"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("２０２５／８／１８"), Some(d(2025, 8, 18)));
    }

    #[test]
    fn test_coerce_date_serial() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_date("45000"), Some(d(2023, 3, 15)));
        // 区间外的纯数字不当作序列日
        assert_eq!(c.coerce_date("20250818"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("12"), None);

        let narrow = FieldCoercer::new(44_000, 44_500);
        assert_eq!(narrow.coerce_date("45000"), None);
    }

    #[test]
    fn test_coerce_date_fullwidth_serial() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_date("４５０００"), Some(d(2023, 3, 15)));
        assert_eq!(c.coerce_date(" ４５０００ "), Some(d(2023, 3, 15)));
    }

    #[test]
    fn test_coerce_date_serial_overflow_is_absent() {
        let wide = FieldCoercer::new(0, i64::MAX);
        assert_eq!(wide.coerce_date("200000000000000"), None);
        assert_eq!(wide.coerce_date("9223372036854775807"), None);
        assert_eq!(wide.coerce_date("45000"), Some(d(2023, 3, 15)));

        let negative = FieldCoercer::new(i64::MIN, i64::MAX);
        assert_eq!(negative.coerce_date("0"), Some(d(1899, 12, 30)));
    }

    #[test]
    fn test_coerce_date_lenient() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_date("2025年8月18日"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("2025.8.18"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("08/18/2025"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("2025-08-18T06:00:00+09:00"), Some(d(2025, 8, 18)));
        assert_eq!(c.coerce_date("2025/8/18(月)"), Some(d(2025, 8, 18)));
    }

    #[test]
    fn test_coerce_date_failures() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_date("not-a-date"), None);
        assert_eq!(c.coerce_date(""), None);
        assert_eq!(c.coerce_date("2025/13/40"), None);
    }

    #[test]
    fn test_coerce_amount_with_header_hint() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_amount_kg("1,234", MassUnit::Grams), Some(1.234));
        assert_eq!(c.coerce_amount_kg("2.5", MassUnit::Kilograms), Some(2.5));
        assert_eq!(c.coerce_amount_kg("1500", MassUnit::Unknown), Some(1.5));
        assert_eq!(c.coerce_amount_kg("１，５００", MassUnit::Grams), Some(1.5));
        assert_eq!(c.coerce_amount_kg("1 500", MassUnit::Grams), Some(1.5));
    }

    #[test]
    fn test_coerce_amount_text_unit_wins() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_amount_kg("1.2kg", MassUnit::Grams), Some(1.2));
        assert_eq!(c.coerce_amount_kg("1.2ｋｇ", MassUnit::Unknown), Some(1.2));
        assert_eq!(c.coerce_amount_kg("3㎏", MassUnit::Grams), Some(3.0));
        assert_eq!(c.coerce_amount_kg("800g", MassUnit::Kilograms), Some(0.8));
        assert_eq!(c.coerce_amount_kg("500グラム", MassUnit::Kilograms), Some(0.5));
    }

    #[test]
    fn test_coerce_amount_negative_and_invalid() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_amount_kg("-500", MassUnit::Grams), Some(-0.5));
        assert_eq!(c.coerce_amount_kg("abc", MassUnit::Grams), None);
        assert_eq!(c.coerce_amount_kg("", MassUnit::Kilograms), None);
    }

    #[test]
    fn test_coerce_amount_out_of_identity_range() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_amount_kg("99999999999999999999999", MassUnit::Grams), None);
        assert_eq!(c.coerce_amount_kg(&"9".repeat(400), MassUnit::Kilograms), None);
        assert_eq!(c.coerce_amount_kg("9000000000000", MassUnit::Kilograms), Some(9.0e12));
    }

    #[test]
    fn test_coerce_text() {
        let c = FieldCoercer::default();
        assert_eq!(c.coerce_text("  A社 "), Some("A社".to_string()));
        assert_eq!(c.coerce_text(" \u{3000}"), None);
    }
}
