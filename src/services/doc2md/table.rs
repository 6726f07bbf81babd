// 表格格式化：按首行确定列数，所有行统一列宽与管道位置。
use crate::core::config::TableConfig;
use unicode_width::UnicodeWidthStr;

pub fn format_table(lines: &[String], config: &TableConfig) -> Vec<String> {
    let mut rows = lines.iter().filter(|line| !line.trim().is_empty());
    let Some(header_line) = rows.next() else {
        return Vec::new();
    };
    let header = split_cells(header_line);
    let columns = header.len();

    let body = rows
        .filter(|line| !is_separator_line(line))
        .map(|line| fit_columns(split_cells(line), columns))
        .collect::<Vec<_>>();

    let widths = (0..columns)
        .map(|col| {
            body.iter()
                .map(|row| row[col].width())
                .chain(std::iter::once(header[col].width()))
                .max()
                .unwrap_or(0)
                .max(config.field_width)
        })
        .collect::<Vec<_>>();

    let mut output = Vec::with_capacity(body.len() + 2);
    output.push(render_row(&header, &widths, Align::Center));
    output.push(render_separator(&widths));
    for row in &body {
        output.push(render_row(row, &widths, Align::Left));
    }
    output
}

/// 含 `-` 且仅由 `|`、`-`、`:` 与空白组成的行是已有分隔行。
pub fn is_separator_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('-')
        && trimmed
            .chars()
            .all(|ch| ch == '|' || ch == '-' || ch == ':' || ch.is_whitespace())
}

/// 按未转义的 `|` 切分单元格，去掉首尾管道产生的空字段。
pub fn split_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = match inner.strip_suffix('|') {
        Some(rest) if !rest.ends_with('\\') => rest,
        _ => inner,
    };

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'|') => {
                current.push('\\');
                if let Some(pipe) = chars.next() {
                    current.push(pipe);
                }
            }
            '|' => cells.push(std::mem::take(&mut current).trim().to_string()),
            _ => current.push(ch),
        }
    }
    cells.push(current.trim().to_string());
    cells
}

fn fit_columns(mut cells: Vec<String>, columns: usize) -> Vec<String> {
    cells.resize(columns, String::new());
    cells
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Center,
}

fn render_row(cells: &[String], widths: &[usize], align: Align) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.width());
        let (left, right) = match align {
            Align::Left => (0, pad),
            Align::Center => (pad / 2, pad - pad / 2),
        };
        line.push(' ');
        line.push_str(&" ".repeat(left));
        line.push_str(cell);
        line.push_str(&" ".repeat(right));
        line.push_str(" |");
    }
    line
}

fn render_separator(widths: &[usize]) -> String {
    let mut line = String::from("|");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('|');
    }
    line
}
