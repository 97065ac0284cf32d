// ==========================================
// 收获记录导入系统 - 编码判定
// ==========================================
// 职责: 原始字节 → 已解码表格 + 采用的编码标签
// 顺序: utf-8-sig → utf-8 → cp932 → cp932_auto(分隔符嗅探) → utf-16le
// 规则:
// - 解码严格（遇到非法序列即该候选失败，不做替换）
// - cp932 候选同样剥离 UTF-8 BOM（BOM + Shift_JIS 正文）
// - 候选须同时通过 accept 回调（表头检测）才算成功
// - 有候选解析成功但表头均不合格 → 返回最高优先级候选的表头失败
// - 全部无法解析 → DecodeFailure，列出每个候选的失败原因
// - zip 文件头 → 按 xlsx 解析，标签 "xlsx"
// ==========================================

use crate::importer::error::{DecodeAttempt, ImportError, ImportResult};
use crate::importer::file_parser::{is_xlsx, parse_delimited, parse_xlsx, sniff_delimiter, RawTable};
use encoding_rs::{Encoding, SHIFT_JIS, UTF_16LE, UTF_8};
use tracing::{debug, info};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const UTF16LE_BOM: [u8; 2] = [0xFF, 0xFE];

/// 解码方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8Sig,
    Utf8,
    Cp932,
    Utf16Le,
}

/// 分隔符选择
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelimiterMode {
    Fixed(u8),
    Sniff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingCandidate {
    pub label: &'static str,
    pub encoding: TextEncoding,
    pub delimiter: DelimiterMode,
}

/// 默认候选（优先顺序）
pub const DEFAULT_CANDIDATES: [EncodingCandidate; 5] = [
    EncodingCandidate {
        label: "utf-8-sig",
        encoding: TextEncoding::Utf8Sig,
        delimiter: DelimiterMode::Fixed(b','),
    },
    EncodingCandidate {
        label: "utf-8",
        encoding: TextEncoding::Utf8,
        delimiter: DelimiterMode::Fixed(b','),
    },
    EncodingCandidate {
        label: "cp932",
        encoding: TextEncoding::Cp932,
        delimiter: DelimiterMode::Fixed(b','),
    },
    EncodingCandidate {
        label: "cp932_auto",
        encoding: TextEncoding::Cp932,
        delimiter: DelimiterMode::Sniff,
    },
    EncodingCandidate {
        label: "utf-16le",
        encoding: TextEncoding::Utf16Le,
        delimiter: DelimiterMode::Sniff,
    },
];

/// 判定结果
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedTable {
    pub encoding: String,
    pub table: RawTable,
}

// ==========================================
// EncodingResolver
// ==========================================
pub struct EncodingResolver {
    candidates: Vec<EncodingCandidate>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingResolver {
    pub fn new() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.to_vec(),
        }
    }

    pub fn with_candidates(candidates: Vec<EncodingCandidate>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[EncodingCandidate] {
        &self.candidates
    }

    /// 严格解码
    pub fn decode(encoding: TextEncoding, bytes: &[u8]) -> Result<String, String> {
        let (codec, body): (&'static Encoding, &[u8]) = match encoding {
            TextEncoding::Utf8Sig => (UTF_8, bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes)),
            TextEncoding::Utf8 => (UTF_8, bytes),
            // 部分导出工具会在 Shift_JIS 正文前写入 UTF-8 BOM
            TextEncoding::Cp932 => (SHIFT_JIS, bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes)),
            TextEncoding::Utf16Le => (
                UTF_16LE,
                bytes.strip_prefix(&UTF16LE_BOM).unwrap_or(bytes),
            ),
        };

        codec
            .decode_without_bom_handling_and_without_replacement(body)
            .map(|text| text.into_owned())
            .ok_or_else(|| format!("{} 解码遇到非法字节序列", codec.name()))
    }

    /// 单个候选: 解码 + 解析
    fn parse_candidate(candidate: &EncodingCandidate, bytes: &[u8]) -> ImportResult<RawTable> {
        let text = Self::decode(candidate.encoding, bytes).map_err(|message| {
            ImportError::DecodeFailure {
                attempts: vec![DecodeAttempt {
                    label: candidate.label.to_string(),
                    message,
                }],
            }
        })?;

        let delimiter = match candidate.delimiter {
            DelimiterMode::Fixed(d) => d,
            DelimiterMode::Sniff => sniff_delimiter(&text),
        };
        parse_delimited(&text, delimiter)
    }

    /// 取第一个能解析为表格的候选
    pub fn resolve(&self, bytes: &[u8]) -> ImportResult<DecodedTable> {
        self.resolve_with(bytes, |_| Ok(()))
            .map(|(decoded, _)| decoded)
    }

    /// 取第一个能解析为表格且通过 accept 的候选
    pub fn resolve_with<T, F>(&self, bytes: &[u8], mut accept: F) -> ImportResult<(DecodedTable, T)>
    where
        F: FnMut(&RawTable) -> ImportResult<T>,
    {
        if is_xlsx(bytes) {
            let table = parse_xlsx(bytes).map_err(|e| ImportError::DecodeFailure {
                attempts: vec![DecodeAttempt {
                    label: "xlsx".to_string(),
                    message: e.to_string(),
                }],
            })?;
            let accepted = accept(&table)?;
            info!(encoding = "xlsx", rows = table.row_count(), "编码判定完成");
            return Ok((
                DecodedTable {
                    encoding: "xlsx".to_string(),
                    table,
                },
                accepted,
            ));
        }

        let mut attempts: Vec<DecodeAttempt> = Vec::new();
        let mut first_rejection: Option<ImportError> = None;

        for candidate in &self.candidates {
            let table = match Self::parse_candidate(candidate, bytes) {
                Ok(table) => table,
                Err(err) => {
                    let message = match err {
                        ImportError::DecodeFailure { attempts: mut inner } if !inner.is_empty() => {
                            inner.remove(0).message
                        }
                        other => other.to_string(),
                    };
                    debug!(candidate = candidate.label, %message, "编码候选解析失败");
                    attempts.push(DecodeAttempt {
                        label: candidate.label.to_string(),
                        message,
                    });
                    continue;
                }
            };

            match accept(&table) {
                Ok(accepted) => {
                    info!(
                        encoding = candidate.label,
                        rows = table.row_count(),
                        rejected_candidates = attempts.len(),
                        "编码判定完成"
                    );
                    return Ok((
                        DecodedTable {
                            encoding: candidate.label.to_string(),
                            table,
                        },
                        accepted,
                    ));
                }
                Err(err) => {
                    debug!(candidate = candidate.label, error = %err, "编码候选未通过表头检测");
                    attempts.push(DecodeAttempt {
                        label: candidate.label.to_string(),
                        message: err.to_string(),
                    });
                    if first_rejection.is_none() {
                        first_rejection = Some(err);
                    }
                }
            }
        }

        Err(first_rejection.unwrap_or(ImportError::DecodeFailure { attempts }))
    }
}
