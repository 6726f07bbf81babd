use super::text::{normalize_cell_text, normalize_text, pipe_rows, strip_generated_ids};
use super::{read_zip_entry, ConvertError, ExtractedBlock, Extractor};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedBlock, ConvertError> {
        let xml = read_zip_entry(data, "word/document.xml")?
            .ok_or_else(|| ConvertError::extraction("word/document.xml not found in archive"))?;
        let mut block = parse_document_xml(&xml)?;
        // core.xml 缺失或损坏都不影响正文。
        block.title = read_zip_entry(data, "docProps/core.xml")
            .ok()
            .flatten()
            .and_then(|xml| parse_core_title(&xml))
            .map(|title| strip_generated_ids(&title))
            .filter(|title| !title.is_empty());
        Ok(block)
    }
}

#[derive(Default)]
struct ParagraphState {
    text: String,
    style: Option<String>,
    numbered: bool,
}

fn parse_document_xml(xml: &str) -> Result<ExtractedBlock, ConvertError> {
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(false);
    let mut buf = Vec::new();
    let mut block = ExtractedBlock::default();

    let mut in_paragraph = false;
    let mut in_text = false;
    let mut table_depth = 0usize;
    let mut in_cell = false;

    let mut para = ParagraphState::default();
    let mut current_cell = String::new();
    let mut current_row: Vec<String> = Vec::new();
    let mut table_rows: Vec<Vec<String>> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"p" => {
                        if in_cell {
                            if !current_cell.is_empty() && !current_cell.ends_with('\n') {
                                current_cell.push('\n');
                            }
                        } else {
                            in_paragraph = true;
                            para = ParagraphState::default();
                        }
                    }
                    b"tbl" => {
                        table_depth += 1;
                        if table_depth == 1 {
                            table_rows.clear();
                        }
                    }
                    b"tr" if table_depth == 1 => current_row = Vec::new(),
                    b"tc" if table_depth == 1 => {
                        in_cell = true;
                        current_cell.clear();
                    }
                    b"pStyle" => read_style(&reader, e, in_paragraph && !in_cell, &mut para),
                    b"numPr" => {
                        if in_paragraph && !in_cell {
                            para.numbered = true;
                        }
                    }
                    b"t" => in_text = true,
                    b"tab" => append_text(&mut para.text, &mut current_cell, in_cell, "\t"),
                    b"br" => append_text(&mut para.text, &mut current_cell, in_cell, "\n"),
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"pStyle" => read_style(&reader, e, in_paragraph && !in_cell, &mut para),
                    b"tab" => append_text(&mut para.text, &mut current_cell, in_cell, "\t"),
                    b"br" => append_text(&mut para.text, &mut current_cell, in_cell, "\n"),
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    // 单个文本节点转义失败时丢弃该节点，不中断整篇抽取。
                    if let Ok(text) = e.unescape() {
                        append_text(&mut para.text, &mut current_cell, in_cell, text.as_ref());
                    }
                }
            }
            Ok(Event::End(ref e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"t" => in_text = false,
                    b"p" => {
                        if in_cell {
                            if !current_cell.ends_with('\n') {
                                current_cell.push('\n');
                            }
                        } else if in_paragraph {
                            push_paragraph(&mut block, &para);
                            in_paragraph = false;
                            para = ParagraphState::default();
                        }
                    }
                    b"tc" if table_depth == 1 && in_cell => {
                        in_cell = false;
                        current_row.push(normalize_cell_text(&current_cell));
                    }
                    b"tr" if table_depth == 1 => {
                        if !current_row.is_empty() {
                            table_rows.push(std::mem::take(&mut current_row));
                        }
                    }
                    b"tbl" => {
                        if table_depth == 1 && !table_rows.is_empty() {
                            block.lines.push(String::new());
                            block.lines.extend(pipe_rows(&table_rows));
                            block.lines.push(String::new());
                            table_rows.clear();
                        }
                        table_depth = table_depth.saturating_sub(1);
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(ConvertError::extraction(format!(
                    "docx parse failed at byte {}: {err}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(block)
}

fn push_paragraph(block: &mut ExtractedBlock, para: &ParagraphState) {
    let text = normalize_text(&para.text);
    if text.is_empty() {
        return;
    }
    let style = para.style.as_deref();
    if let Some(level) = heading_level_from_style(style) {
        block.headings += 1;
        // 含 `|` 的行会被当成表格行，标题里换成 `/`。
        let text = text.replace('\n', " ").replace('|', "/");
        block.lines.push(format!("{} {text}", "#".repeat(level)));
    } else if para.numbered || is_list_style(style) {
        block.lines.push(format!("- {}", text.replace('\n', " ")));
    } else {
        block.lines.extend(text.lines().map(str::to_string));
    }
}

fn read_style<B: std::io::BufRead>(
    reader: &XmlReader<B>,
    element: &BytesStart,
    applies: bool,
    para: &mut ParagraphState,
) {
    if !applies {
        return;
    }
    if let Some(value) = attr_value(reader, element, b"val") {
        para.style = Some(value);
    }
}

fn append_text(current_para: &mut String, current_cell: &mut String, in_cell: bool, text: &str) {
    if in_cell {
        current_cell.push_str(text);
    } else {
        current_para.push_str(text);
    }
}

fn heading_level_from_style(style: Option<&str>) -> Option<usize> {
    let style = style?.trim();
    if style.is_empty() {
        return None;
    }
    let lowered = style.to_lowercase();
    if lowered.starts_with("heading") || lowered.starts_with("title") {
        let digits: String = lowered.chars().filter(|ch| ch.is_ascii_digit()).collect();
        if let Ok(value) = digits.parse::<usize>() {
            return Some(value.clamp(1, 6));
        }
        return Some(1);
    }
    None
}

fn is_list_style(style: Option<&str>) -> bool {
    style
        .map(|style| {
            let lowered = style.to_lowercase();
            lowered.starts_with("listparagraph") || lowered.starts_with("listbullet")
        })
        .unwrap_or(false)
}

/// 读取 docProps/core.xml 中的 dc:title。
fn parse_core_title(xml: &str) -> Option<String> {
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_title = false;
    let mut title = String::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                let (prefix, local) = split_tag_name(name.as_ref());
                in_title = prefix == Some(b"dc") && local == b"title";
            }
            Ok(Event::Text(e)) if in_title => {
                if let Ok(text) = e.unescape() {
                    title.push_str(text.as_ref());
                }
            }
            Ok(Event::End(_)) => in_title = false,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    let title = normalize_text(&title);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

fn split_tag_name(name: &[u8]) -> (Option<&[u8]>, &[u8]) {
    if let Some(idx) = name.iter().position(|b| *b == b':') {
        (Some(&name[..idx]), &name[idx + 1..])
    } else {
        (None, name)
    }
}

fn local_name(name: &[u8]) -> &[u8] {
    split_tag_name(name).1
}

fn attr_value<B: std::io::BufRead>(
    reader: &XmlReader<B>,
    element: &BytesStart,
    key: &[u8],
) -> Option<String> {
    for attr in element.attributes().with_checks(false) {
        let attr = attr.ok()?;
        let (_, local) = split_tag_name(attr.key.as_ref());
        if local == key {
            if let Ok(value) = attr.decode_and_unescape_value(reader) {
                return Some(value.into_owned());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    fn body(inner: &str) -> String {
        format!(r#"<?xml version="1.0"?><w:document {W}><w:body>{inner}</w:body></w:document>"#)
    }

    #[test]
    fn headings_lists_and_paragraphs() {
        let xml = body(concat!(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Scope</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t xml:space="preserve">First </w:t></w:r><w:r><w:t>line</w:t></w:r></w:p>"#,
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>A &amp; B</w:t><w:br/><w:t>next</w:t></w:r></w:p>"#,
        ));
        let block = parse_document_xml(&xml).expect("parse");
        assert_eq!(
            block.lines,
            vec!["## Scope", "First line", "- item", "A & B", "next"]
        );
        assert_eq!(block.headings, 1);
    }

    #[test]
    fn pipes_in_headings_do_not_start_a_table() {
        let xml = body(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:t>Inputs | Outputs</w:t></w:r></w:p>"#,
        );
        let block = parse_document_xml(&xml).expect("parse");
        assert_eq!(block.lines, vec!["# Inputs / Outputs"]);
    }

    #[test]
    fn tables_flatten_to_pipe_rows() {
        let xml = body(concat!(
            "<w:tbl>",
            "<w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>Qty</w:t></w:r></w:p></w:tc></w:tr>",
            "<w:tr><w:tc><w:p><w:r><w:t>a|b</w:t></w:r></w:p><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc></w:tr>",
            "</w:tbl>",
        ));
        let block = parse_document_xml(&xml).expect("parse");
        assert_eq!(
            block.lines,
            vec![
                "",
                "| Name | Qty |",
                "| --- | --- |",
                "| a\\|b<br>c |  |",
                "",
            ]
        );
    }

    #[test]
    fn malformed_xml_is_an_extraction_error() {
        let err = parse_document_xml("<w:document><w:body><w:p></w:body>").unwrap_err();
        assert_eq!(err.kind(), super::super::ErrorKind::ExtractionFailure);
    }

    #[test]
    fn core_title_is_read() {
        let xml = r#"<cp:coreProperties xmlns:cp="x" xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Plan 2024</dc:title><dc:creator>me</dc:creator></cp:coreProperties>"#;
        assert_eq!(parse_core_title(xml), Some("Plan 2024".to_string()));
        assert_eq!(parse_core_title("<cp:coreProperties/>"), None);
    }
}
