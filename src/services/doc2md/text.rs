// 文本工具：空白归一化、表格行拼装与临时标识符识别。
use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

/// 生成型标识符的固定长度（UUID 带连字符的长度）。
pub const GENERATED_TOKEN_LEN: usize = 36;

pub fn normalize_text(text: &str) -> String {
    let mut output = String::new();
    let mut last_space = false;
    for ch in text.chars() {
        if ch == '\r' {
            continue;
        }
        if ch == '\n' {
            while output.ends_with(' ') {
                output.pop();
            }
            if !output.ends_with('\n') {
                output.push('\n');
            }
            last_space = false;
            continue;
        }
        if ch.is_whitespace() {
            if !last_space && !output.is_empty() && !output.ends_with('\n') {
                output.push(' ');
                last_space = true;
            }
            continue;
        }
        output.push(ch);
        last_space = false;
    }
    output.trim().to_string()
}

pub fn normalize_cell_text(text: &str) -> String {
    normalize_text(text).replace('\n', "<br>")
}

pub fn sanitize_table_cell(cell: &str) -> String {
    cell.trim().replace('|', "\\|")
}

/// 把二维单元格拼成管道分隔行，首行后附分隔行；列数取最宽行。
pub fn pipe_rows(rows: &[Vec<String>]) -> Vec<String> {
    let max_cols = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    if max_cols == 0 {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    for (index, row) in rows.iter().enumerate() {
        let mut line = String::from("|");
        for col in 0..max_cols {
            let cell = row.get(col).map(String::as_str).unwrap_or("");
            line.push(' ');
            line.push_str(&sanitize_table_cell(cell));
            line.push_str(" |");
        }
        lines.push(line);
        if index == 0 {
            lines.push(format!("|{}", " --- |".repeat(max_cols)));
        }
    }
    lines
}

pub fn is_heading_line(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// 标题行文本若是 36 位随机标识符，视为抽取噪声。
pub fn is_generated_heading(line: &str) -> bool {
    let trimmed = line.trim();
    if !trimmed.starts_with('#') {
        return false;
    }
    let text = trimmed.trim_start_matches('#').trim();
    is_generated_token(text)
}

pub fn is_generated_token(text: &str) -> bool {
    text.len() == GENERATED_TOKEN_LEN
        && text
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        && text.chars().any(|ch| ch.is_ascii_digit())
}

pub fn strip_generated_ids(text: &str) -> String {
    let cleaned = match generated_id_regex() {
        Some(regex) => regex.replace_all(text, " ").to_string(),
        None => text.to_string(),
    };
    let cleaned = cleaned
        .split_whitespace()
        .filter(|word| !is_generated_token(word))
        .collect::<Vec<_>>()
        .join(" ");
    cleaned
        .trim_matches(|ch: char| ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace())
        .to_string()
}

fn generated_id_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            compile_regex(
                r"(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}|\b[0-9a-f]{32}\b",
                "generated_id",
            )
        })
        .as_ref()
}

pub(crate) fn compile_regex(pattern: &str, label: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            error!("invalid doc2md regex {label}: {err}");
            None
        }
    }
}
