use super::text::{normalize_cell_text, pipe_rows};
use super::{ConvertError, ExtractedBlock, Extractor};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use tracing::warn;

pub struct SpreadsheetExtractor;

impl Extractor for SpreadsheetExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedBlock, ConvertError> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(data.to_vec()))
            .map_err(|err| ConvertError::extraction(format!("spreadsheet open failed: {err}")))?;
        let sheet_names = workbook.sheet_names().to_owned();
        let mut block = ExtractedBlock::default();
        for name in sheet_names {
            let range = match workbook.worksheet_range(&name) {
                Ok(range) => range,
                Err(err) => {
                    warn!("skip unreadable sheet {name}: {err}");
                    continue;
                }
            };
            let rows = range_to_rows(&range);
            if rows.is_empty() {
                continue;
            }
            if !block.lines.is_empty() {
                block.lines.push(String::new());
            }
            block.lines.push(format!("# {}", name.trim().replace('|', "/")));
            block.lines.extend(pipe_rows(&rows));
            block.headings += 1;
            block.sheet_names.push(name);
        }
        Ok(block)
    }
}

/// 去掉每行末尾空单元格与整行空白，之后补齐到最宽行。
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut max_cols = 0;
    for row in range.rows() {
        let mut values = row.iter().map(cell_to_string).collect::<Vec<_>>();
        let Some(last) = values.iter().rposition(|value| !value.is_empty()) else {
            continue;
        };
        values.truncate(last + 1);
        max_cols = max_cols.max(values.len());
        rows.push(values);
    }
    for row in rows.iter_mut() {
        row.resize(max_cols, String::new());
    }
    rows
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(text) => normalize_cell_text(text),
        _ => cell.to_string().trim().to_string(),
    }
}
