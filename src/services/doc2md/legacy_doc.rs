// Word 97-2003 二进制文档：读取 FIB 与 piece table，按段落还原文本。
use super::text::{normalize_text, pipe_rows};
use super::{ConvertError, ExtractedBlock, Extractor};
use encoding_rs::WINDOWS_1252;
use std::io::{Cursor, Read};

const WORD_MAGIC: u16 = 0xA5EC;
const FLAG_USE_TABLE1: u16 = 0x0200;
const FLAG_ENCRYPTED: u16 = 0x0100;
const CELL_MARK: char = '\u{7}';
const ROW_END: &str = "\u{7}\u{7}";

pub struct LegacyDocExtractor;

impl Extractor for LegacyDocExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedBlock, ConvertError> {
        let mut ole = cfb::CompoundFile::open(Cursor::new(data))
            .map_err(|err| ConvertError::extraction(format!("invalid .doc container: {err}")))?;
        let word_stream = read_stream(&mut ole, "/WordDocument")?;
        let fib = parse_fib(&word_stream)
            .ok_or_else(|| ConvertError::extraction("invalid or unsupported Word binary header"))?;
        if fib.encrypted {
            return Err(ConvertError::extraction(
                "document is password protected",
            ));
        }
        let table_name = if fib.use_table1 { "/1Table" } else { "/0Table" };
        let table_stream = read_stream(&mut ole, table_name).unwrap_or_default();
        let pieces = parse_text_pieces(&table_stream, fib.fc_clx, fib.lcb_clx);
        let raw = if pieces.is_empty() {
            decode_simple_range(&word_stream, fib.fc_min, fib.fc_mac)
        } else {
            decode_pieces(&word_stream, &pieces)
        };
        Ok(ExtractedBlock {
            lines: paragraphs_to_lines(&raw),
            ..ExtractedBlock::default()
        })
    }
}

fn read_stream<F: Read + std::io::Seek>(
    ole: &mut cfb::CompoundFile<F>,
    name: &str,
) -> Result<Vec<u8>, ConvertError> {
    let mut stream = ole
        .open_stream(name)
        .map_err(|err| ConvertError::extraction(format!("missing stream {name}: {err}")))?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|err| ConvertError::extraction(format!("cannot read stream {name}: {err}")))?;
    Ok(data)
}

#[derive(Debug, Clone)]
struct FibInfo {
    use_table1: bool,
    encrypted: bool,
    fc_min: u32,
    fc_mac: u32,
    fc_clx: u32,
    lcb_clx: u32,
}

#[derive(Debug, Clone)]
struct TextPiece {
    cp_start: u32,
    cp_end: u32,
    file_offset: u32,
    unicode: bool,
}

fn read_u16_le(data: &[u8], offset: usize) -> Option<u16> {
    data.get(offset..offset + 2)
        .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_u32_le(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4)
        .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_fib(word_stream: &[u8]) -> Option<FibInfo> {
    if word_stream.len() < 256 || read_u16_le(word_stream, 0)? != WORD_MAGIC {
        return None;
    }
    let flags = read_u16_le(word_stream, 0x0A)?;
    let fc_min = read_u32_le(word_stream, 0x18)?;
    let fc_mac = read_u32_le(word_stream, 0x1C)?;

    let mut pos = 32usize;
    let csw = read_u16_le(word_stream, pos)? as usize;
    pos += 2 + csw * 2;
    let cslw = read_u16_le(word_stream, pos)? as usize;
    pos += 2 + cslw * 4;
    let cb_rg_fc_lcb = read_u16_le(word_stream, pos)? as usize;
    pos += 2;
    if word_stream.len() < pos + cb_rg_fc_lcb * 8 {
        return None;
    }
    // fcClx/lcbClx 是 FibRgFcLcb97 的第 34 对。
    let clx_index = 33usize;
    let (fc_clx, lcb_clx) = if cb_rg_fc_lcb > clx_index {
        let offset = pos + clx_index * 8;
        (read_u32_le(word_stream, offset)?, read_u32_le(word_stream, offset + 4)?)
    } else {
        (0, 0)
    };
    Some(FibInfo {
        use_table1: flags & FLAG_USE_TABLE1 != 0,
        encrypted: flags & FLAG_ENCRYPTED != 0,
        fc_min,
        fc_mac,
        fc_clx,
        lcb_clx,
    })
}

fn parse_text_pieces(table_stream: &[u8], fc_clx: u32, lcb_clx: u32) -> Vec<TextPiece> {
    let start = fc_clx as usize;
    let end = start + lcb_clx as usize;
    if lcb_clx == 0 || end > table_stream.len() {
        return Vec::new();
    }
    let clx = &table_stream[start..end];
    let mut pos = 0usize;
    while pos < clx.len() {
        match clx[pos] {
            // Prc：跳过属性修订块。
            0x02 => {
                let Some(cb) = read_u16_le(clx, pos + 1) else {
                    break;
                };
                pos += 3 + cb as usize;
            }
            // Pcdt：piece table 本体。
            0x01 => {
                let Some(lcb) = read_u32_le(clx, pos + 1) else {
                    break;
                };
                let body_start = pos + 5;
                let lcb = lcb as usize;
                if lcb < 4 || body_start + lcb > clx.len() {
                    break;
                }
                return parse_plc_pcd(&clx[body_start..body_start + lcb]);
            }
            _ => break,
        }
    }
    Vec::new()
}

fn parse_plc_pcd(plc: &[u8]) -> Vec<TextPiece> {
    let piece_count = (plc.len() - 4) / 12;
    let mut cps = Vec::with_capacity(piece_count + 1);
    for i in 0..=piece_count {
        cps.push(read_u32_le(plc, i * 4).unwrap_or(0));
    }
    let pcd = &plc[(piece_count + 1) * 4..];
    let mut pieces = Vec::with_capacity(piece_count);
    for i in 0..piece_count {
        let fc = read_u32_le(pcd, i * 8 + 2).unwrap_or(0);
        let unicode = fc & 0x4000_0000 == 0;
        let file_offset = if unicode { fc } else { (fc & 0x3FFF_FFFF) / 2 };
        pieces.push(TextPiece {
            cp_start: cps[i],
            cp_end: cps[i + 1],
            file_offset,
            unicode,
        });
    }
    pieces
}

fn decode_pieces(word_stream: &[u8], pieces: &[TextPiece]) -> String {
    let mut out = String::new();
    for piece in pieces {
        if piece.cp_end <= piece.cp_start {
            continue;
        }
        let char_count = (piece.cp_end - piece.cp_start) as usize;
        let byte_count = if piece.unicode {
            char_count * 2
        } else {
            char_count
        };
        let start = piece.file_offset as usize;
        // 越界的 piece 直接跳过，保留其余内容。
        let Some(slice) = word_stream.get(start..start + byte_count) else {
            continue;
        };
        if piece.unicode {
            let units = slice
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect::<Vec<_>>();
            out.push_str(&String::from_utf16_lossy(&units));
        } else {
            let (decoded, _, _) = WINDOWS_1252.decode(slice);
            out.push_str(&decoded);
        }
    }
    out
}

fn decode_simple_range(word_stream: &[u8], fc_min: u32, fc_mac: u32) -> String {
    let start = fc_min as usize;
    let end = (fc_mac as usize).min(word_stream.len());
    if start >= end {
        return String::new();
    }
    let (decoded, _, _) = WINDOWS_1252.decode(&word_stream[start..end]);
    decoded.to_string()
}

/// `\r` 分段；单元格以 `\x07` 结尾，行尾再多一个 `\x07`。
fn paragraphs_to_lines(raw: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    for paragraph in raw.split(['\r', '\u{b}', '\u{c}']) {
        let cleaned = strip_field_codes(paragraph);
        let mut rest = cleaned.as_str();
        while let Some(idx) = rest.find(ROW_END) {
            push_row(&mut rows, &rest[..idx]);
            rest = &rest[idx + ROW_END.len()..];
        }
        if rest.contains(CELL_MARK) {
            push_row(&mut rows, rest);
            continue;
        }
        if !rows.is_empty() {
            lines.extend(pipe_rows(&std::mem::take(&mut rows)));
            lines.push(String::new());
        }
        let text = normalize_text(rest);
        if !text.is_empty() {
            lines.push(text);
        }
    }
    if !rows.is_empty() {
        lines.extend(pipe_rows(&rows));
    }
    lines
}

fn push_row(rows: &mut Vec<Vec<String>>, row: &str) {
    let cells = row
        .trim_end_matches(CELL_MARK)
        .split(CELL_MARK)
        .map(normalize_text)
        .collect::<Vec<_>>();
    if cells.iter().any(|cell| !cell.is_empty()) {
        rows.push(cells);
    }
}

/// 域代码形如 `\x13 指令 \x14 结果 \x15`，只保留结果部分。
fn strip_field_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    let mut showing_result = Vec::new();
    for ch in text.chars() {
        match ch {
            '\u{13}' => {
                depth += 1;
                showing_result.push(false);
            }
            '\u{14}' => {
                if let Some(last) = showing_result.last_mut() {
                    *last = true;
                }
            }
            '\u{15}' => {
                depth = depth.saturating_sub(1);
                showing_result.pop();
            }
            _ => {
                if depth == 0 || showing_result.iter().all(|value| *value) {
                    if ch == CELL_MARK || !ch.is_control() || ch == '\t' {
                        out.push(ch);
                    }
                }
            }
        }
    }
    out
}
