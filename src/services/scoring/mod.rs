// 启发式评分：结构质量与训练适用性，两者互相独立、均为纯函数。
mod quality;
mod training;

pub use quality::{assess, QualityResult};
pub use training::{assess_training, Feedback, Tone, TrainingResult};

use crate::services::doc2md::table::is_separator_line;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreFormat {
    Docx,
    Pdf,
    Xlsx,
}

pub(crate) fn clamp_score(score: i32) -> u8 {
    score.clamp(0, 100) as u8
}

/// 找到第一处含 `|` 的行；下一行是分隔行即为规范表格。没有表格返回 `None`。
pub(crate) fn first_table_is_well_formed(lines: &[String]) -> Option<bool> {
    let index = lines.iter().position(|line| line.contains('|'))?;
    Some(
        lines
            .get(index + 1)
            .map(|next| is_separator_line(next))
            .unwrap_or(false),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn separator_detection() {
        assert!(is_separator_line("|---|:---:|"));
        assert!(is_separator_line(" - | - "));
        assert!(!is_separator_line("| | |"));
        assert!(!is_separator_line("| a |"));
    }

    #[test]
    fn first_table_check() {
        assert_eq!(first_table_is_well_formed(&lines("no table here")), None);
        assert_eq!(first_table_is_well_formed(&lines("| a |\n|---|")), Some(true));
        assert_eq!(first_table_is_well_formed(&lines("| a |")), Some(false));
        assert_eq!(
            first_table_is_well_formed(&lines("| a |\n| b |\n| c |\n|---|")),
            Some(false)
        );
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_score(-40), 0);
        assert_eq!(clamp_score(140), 100);
        assert_eq!(clamp_score(63), 63);
    }
}
