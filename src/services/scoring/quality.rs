// 结构质量评分：标题、表格分隔行与按格式的偏置。
use super::{clamp_score, first_table_is_well_formed, ScoreFormat};
use crate::core::config::QualityRules;
use crate::services::doc2md::MarkdownDocument;
use serde::Serialize;

pub const ISSUE_EMPTY: &str = "Empty content";
pub const ISSUE_NO_HEADERS: &str = "No headers found";
pub const ISSUE_POOR_TABLES: &str = "Poorly formatted tables";
pub const ISSUE_SHORT_PDF: &str = "Short PDF content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityResult {
    pub score: u8,
    pub issues: Vec<String>,
}

pub fn assess(doc: &MarkdownDocument, format: ScoreFormat, rules: &QualityRules) -> QualityResult {
    if doc.is_blank() {
        return QualityResult {
            score: 0,
            issues: vec![ISSUE_EMPTY.to_string()],
        };
    }

    let mut score: i32 = 100;
    let mut issues = Vec::new();

    let has_headers = doc.lines.iter().any(|line| line.trim_start().starts_with('#'));
    if !has_headers && format != ScoreFormat::Xlsx {
        score -= rules.missing_headers_penalty;
        issues.push(ISSUE_NO_HEADERS.to_string());
    }

    let table = first_table_is_well_formed(&doc.lines);
    if table == Some(false) {
        score -= rules.poor_table_penalty;
        issues.push(ISSUE_POOR_TABLES.to_string());
    }

    match format {
        ScoreFormat::Pdf => score = (score + rules.pdf_bias).min(100),
        ScoreFormat::Docx => score = (score + rules.docx_bias).min(100),
        ScoreFormat::Xlsx => {
            if table == Some(true) {
                score = 100;
                issues.clear();
            }
        }
    }

    // 短 PDF 的扣分放在偏置之后，保证问题项不会被封顶清空。
    if format == ScoreFormat::Pdf && doc.text().chars().count() < rules.short_pdf_chars {
        score -= rules.short_pdf_penalty;
        issues.push(ISSUE_SHORT_PDF.to_string());
    }

    let score = clamp_score(score);
    if score == 100 {
        issues.clear();
    }
    QualityResult { score, issues }
}
