// ==========================================
// 收获记录导入系统 - 表头归一化
// ==========================================
// 职责: 原始表头 → 规范列标签 + 数量列单位提示
// 匹配: 归一化后按同义词做子串包含匹配
// 规则:
// - 单个表头最多映射一个标签（按 REQUIRED 顺序取第一个命中）
// - 多列命中同一标签时取最右列
// - 四个标签缺一即整文件失败（HeaderDetectionFailure）
// ==========================================

use crate::domain::types::{CanonicalHeader, MassUnit};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_coercer::normalize_width;
use serde::Serialize;
use std::collections::BTreeMap;

/// 默认同义词表（归一化后小写形式）
fn default_synonyms() -> Vec<(CanonicalHeader, Vec<&'static str>)> {
    vec![
        (
            CanonicalHeader::HarvestDate,
            vec!["収穫日", "収穫日付", "日付", "harvest_date", "harvest date", "date"],
        ),
        (
            CanonicalHeader::Company,
            vec!["企業名", "会社名", "企業", "生産者", "company"],
        ),
        (
            CanonicalHeader::Crop,
            vec!["収穫野菜名", "野菜名", "作物名", "作物", "品目", "crop"],
        ),
        (
            CanonicalHeader::AmountMass,
            vec!["収穫量", "収量", "重量", "amount", "weight", "quantity"],
        ),
    ]
}

/// 表头文本归一化: 去 BOM 残留 → 宽度归一化 → 空白折叠 → 小写
pub fn normalize_header(raw: &str) -> String {
    let stripped = raw
        .replace('\u{FEFF}', "")
        .replace('\u{FFFE}', "")
        .replace("ï»¿", "");
    normalize_width(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ==========================================
// HeaderMapping - 检测结果
// ==========================================

/// 单个命中的表头
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderMatch {
    pub column: usize,
    pub raw: String,
    pub tag: CanonicalHeader,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeaderMapping {
    /// 所有命中（文件列顺序，含被右侧列覆盖的命中）
    pub matches: Vec<HeaderMatch>,
    columns: BTreeMap<CanonicalHeader, usize>,
    pub amount_unit: MassUnit,
}

impl HeaderMapping {
    /// 标签对应的生效列
    pub fn column(&self, tag: CanonicalHeader) -> Option<usize> {
        self.columns.get(&tag).copied()
    }

    /// 标签对应生效列的原始表头
    pub fn raw_header(&self, tag: CanonicalHeader) -> Option<&str> {
        let column = self.column(tag)?;
        self.matches
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.raw.as_str())
    }
}

// ==========================================
// HeaderNormalizer
// ==========================================
pub struct HeaderNormalizer {
    synonyms: Vec<(CanonicalHeader, Vec<String>)>,
}

impl Default for HeaderNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl HeaderNormalizer {
    pub fn new() -> Self {
        let synonyms = default_synonyms()
            .into_iter()
            .map(|(tag, words)| {
                (
                    tag,
                    words.into_iter().map(normalize_header).collect::<Vec<_>>(),
                )
            })
            .collect();
        Self { synonyms }
    }

    /// 追加同义词（归一化后存储）
    pub fn with_synonym(mut self, tag: CanonicalHeader, synonym: &str) -> Self {
        let word = normalize_header(synonym);
        if let Some((_, words)) = self.synonyms.iter_mut().find(|(t, _)| *t == tag) {
            words.push(word);
        }
        self
    }

    /// 单个表头 → 标签（按 REQUIRED 顺序第一个命中）
    pub fn classify(&self, raw: &str) -> Option<CanonicalHeader> {
        let normalized = normalize_header(raw);
        if normalized.is_empty() {
            return None;
        }
        CanonicalHeader::REQUIRED.iter().copied().find(|tag| {
            self.words_for(*tag)
                .iter()
                .any(|w| normalized.contains(w.as_str()))
        })
    }

    /// 数量列表头 → 单位提示
    ///
    /// 先去掉数量同义词本身（避免 "weight" 中的 g 被误判），再找 kg / g 标记
    pub fn mass_unit(&self, raw: &str) -> MassUnit {
        let mut rest = normalize_header(raw);
        for word in self.words_for(CanonicalHeader::AmountMass) {
            rest = rest.replace(word.as_str(), "");
        }

        if rest.contains("kg") || rest.contains("キロ") {
            MassUnit::Kilograms
        } else if rest.contains('g') || rest.contains("グラム") {
            MassUnit::Grams
        } else {
            MassUnit::Unknown
        }
    }

    /// 检测整行表头
    pub fn detect(&self, headers: &[String]) -> ImportResult<HeaderMapping> {
        let mut matches = Vec::new();
        let mut columns = BTreeMap::new();

        for (column, raw) in headers.iter().enumerate() {
            if let Some(tag) = self.classify(raw) {
                // 后出现的列覆盖前面的列
                columns.insert(tag, column);
                matches.push(HeaderMatch {
                    column,
                    raw: raw.clone(),
                    tag,
                });
            }
        }

        let missing: Vec<CanonicalHeader> = CanonicalHeader::REQUIRED
            .iter()
            .copied()
            .filter(|tag| !columns.contains_key(tag))
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::HeaderDetectionFailure {
                headers: headers.to_vec(),
                missing,
            });
        }

        let amount_unit = columns
            .get(&CanonicalHeader::AmountMass)
            .and_then(|c| headers.get(*c))
            .map(|raw| self.mass_unit(raw))
            .unwrap_or_default();

        Ok(HeaderMapping {
            matches,
            columns,
            amount_unit,
        })
    }

    fn words_for(&self, tag: CanonicalHeader) -> &[String] {
        self.synonyms
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, words)| words.as_slice())
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_header_strips_bom_and_width() {
        assert_eq!(normalize_header("\u{FEFF}収穫日"), "収穫日");
        assert_eq!(normalize_header("ï»¿Date"), "date");
        assert_eq!(normalize_header(" 収穫量（ｇ）\u{3000}"), "収穫量(g)");
        assert_eq!(normalize_header("Harvest   Date"), "harvest date");
    }

    #[test]
    fn test_detect_japanese_headers() {
        let normalizer = HeaderNormalizer::new();
        let mapping = normalizer
            .detect(&headers(&["収穫日", "企業名", "収穫野菜名", "収穫量（ｇ）"]))
            .unwrap();
        assert_eq!(mapping.column(CanonicalHeader::HarvestDate), Some(0));
        assert_eq!(mapping.column(CanonicalHeader::Company), Some(1));
        assert_eq!(mapping.column(CanonicalHeader::Crop), Some(2));
        assert_eq!(mapping.column(CanonicalHeader::AmountMass), Some(3));
        assert_eq!(mapping.amount_unit, MassUnit::Grams);
        assert_eq!(
            mapping.raw_header(CanonicalHeader::AmountMass),
            Some("収穫量（ｇ）")
        );
    }

    #[test]
    fn test_detect_english_headers_with_bom() {
        let normalizer = HeaderNormalizer::new();
        let mapping = normalizer
            .detect(&headers(&["\u{FEFF}Date", "Company", "Crop", "Amount (kg)"]))
            .unwrap();
        assert_eq!(mapping.column(CanonicalHeader::HarvestDate), Some(0));
        assert_eq!(mapping.amount_unit, MassUnit::Kilograms);
    }

    #[test]
    fn test_rightmost_duplicate_column_wins() {
        let normalizer = HeaderNormalizer::new();
        let mapping = normalizer
            .detect(&headers(&["日付", "企業名", "作物", "収量", "備考", "収穫日"]))
            .unwrap();
        assert_eq!(mapping.column(CanonicalHeader::HarvestDate), Some(5));
        assert_eq!(mapping.matches.len(), 5);
    }

    #[test]
    fn test_missing_tag_fails_with_detected_headers() {
        let normalizer = HeaderNormalizer::new();
        let raw = headers(&["収穫日", "企業名", "収穫量"]);
        match normalizer.detect(&raw) {
            Err(ImportError::HeaderDetectionFailure { headers, missing }) => {
                assert_eq!(headers, raw);
                assert_eq!(missing, vec![CanonicalHeader::Crop]);
            }
            other => panic!("意外结果: {:?}", other),
        }
    }

    #[test]
    fn test_mass_unit_detection() {
        let normalizer = HeaderNormalizer::new();
        assert_eq!(normalizer.mass_unit("収量(㎏)"), MassUnit::Kilograms);
        assert_eq!(normalizer.mass_unit("収穫量（キロ）"), MassUnit::Kilograms);
        assert_eq!(normalizer.mass_unit("収穫量[グラム]"), MassUnit::Grams);
        assert_eq!(normalizer.mass_unit("weight"), MassUnit::Unknown);
        assert_eq!(normalizer.mass_unit("weight_g"), MassUnit::Grams);
        assert_eq!(normalizer.mass_unit("収穫量"), MassUnit::Unknown);
    }

    #[test]
    fn test_with_synonym() {
        let normalizer = HeaderNormalizer::new().with_synonym(CanonicalHeader::Company, "農園");
        assert_eq!(normalizer.classify("農園名"), Some(CanonicalHeader::Company));
    }
}
