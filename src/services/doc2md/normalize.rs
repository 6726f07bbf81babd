// Markdown 规范化：去掉临时标识符标题，表格段交给格式化器，必要时补标题。
use super::table::format_table;
use super::text::{is_generated_heading, is_heading_line, strip_generated_ids};
use super::{ExtractedBlock, MarkdownDocument};
use crate::core::config::TableConfig;

const FALLBACK_TITLE: &str = "Document";

/// 没有任何正文时返回空文档，不补标题。
pub fn normalize(block: &ExtractedBlock, title_hint: &str, config: &TableConfig) -> MarkdownDocument {
    if !block.has_content() {
        return MarkdownDocument::default();
    }
    let kept = block
        .lines
        .iter()
        .filter(|line| !is_generated_heading(line))
        .collect::<Vec<_>>();

    let mut lines = Vec::with_capacity(kept.len() + 2);
    let mut index = 0;
    while index < kept.len() {
        let in_table = kept[index].contains('|');
        let start = index;
        while index < kept.len() && kept[index].contains('|') == in_table {
            index += 1;
        }
        let run = &kept[start..index];
        if in_table {
            let raw = run.iter().map(|line| line.to_string()).collect::<Vec<_>>();
            lines.extend(format_table(&raw, config));
            lines.push(String::new());
        } else {
            lines.extend(
                run.iter()
                    .filter(|line| !line.trim().is_empty())
                    .map(|line| line.trim_end().to_string()),
            );
        }
    }

    if !lines.iter().any(|line| is_heading_line(line)) {
        let title = block
            .title
            .as_deref()
            .map(strip_generated_ids)
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| resolve_title(title_hint));
        lines.insert(0, format!("# {title}"));
    }

    MarkdownDocument { lines }
}

fn resolve_title(hint: &str) -> String {
    let title = strip_generated_ids(hint);
    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}
