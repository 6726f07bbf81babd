// 文档转 Markdown：格式识别、抽取、规范化与评分。
mod docx;
mod error;
mod legacy_doc;
mod normalize;
mod pdf;
pub mod table;
pub(crate) mod text;
mod xlsx;

pub use docx::DocxExtractor;
pub use error::{ConvertError, ErrorKind};
pub use legacy_doc::LegacyDocExtractor;
pub use normalize::normalize;
pub use pdf::PdfExtractor;
pub use xlsx::SpreadsheetExtractor;

use crate::core::config::{ScoringConfig, TableConfig};
use crate::services::scoring::{assess, assess_training, QualityResult, ScoreFormat, TrainingResult};
use serde::Serialize;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{info, warn};
use zip::ZipArchive;

const SUPPORTED_EXTENSIONS: &[&str] = &[".doc", ".docx", ".pdf", ".xls", ".xlsx"];

pub fn supported_extensions() -> Vec<String> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Docx,
    Doc,
    Pdf,
    Xlsx,
    Xls,
}

impl DocumentFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match normalize_extension(extension).as_str() {
            ".docx" => Some(Self::Docx),
            ".doc" => Some(Self::Doc),
            ".pdf" => Some(Self::Pdf),
            ".xlsx" => Some(Self::Xlsx),
            ".xls" => Some(Self::Xls),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Doc => "doc",
            Self::Pdf => "pdf",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
        }
    }

    pub fn score_format(self) -> ScoreFormat {
        match self {
            Self::Docx | Self::Doc => ScoreFormat::Docx,
            Self::Pdf => ScoreFormat::Pdf,
            Self::Xlsx | Self::Xls => ScoreFormat::Xlsx,
        }
    }

    pub fn extractor(self) -> &'static dyn Extractor {
        match self {
            Self::Docx => &DocxExtractor,
            Self::Doc => &LegacyDocExtractor,
            Self::Pdf => &PdfExtractor,
            Self::Xlsx | Self::Xls => &SpreadsheetExtractor,
        }
    }
}

/// 抽取器的统一接口：字节流进，行序列与结构元数据出。
pub trait Extractor: Send + Sync {
    fn extract(&self, data: &[u8]) -> Result<ExtractedBlock, ConvertError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedBlock {
    pub lines: Vec<String>,
    pub title: Option<String>,
    pub headings: usize,
    pub sheet_names: Vec<String>,
    pub pages: Vec<String>,
}

impl ExtractedBlock {
    pub fn has_content(&self) -> bool {
        self.lines.iter().any(|line| !line.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownDocument {
    pub lines: Vec<String>,
}

impl MarkdownDocument {
    pub fn from_text(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        while text.ends_with('\n') {
            text.pop();
        }
        text
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|line| line.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConvertSettings {
    pub table: TableConfig,
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub markdown: String,
    pub quality: QualityResult,
    pub training: TrainingResult,
    pub format: DocumentFormat,
    pub output_filename: String,
    pub warnings: Vec<String>,
}

pub fn convert(
    data: &[u8],
    filename: &str,
    settings: &ConvertSettings,
) -> Result<ConversionReport, ConvertError> {
    let filename = filename.trim();
    if filename.is_empty() {
        return Err(ConvertError::empty_filename());
    }
    let extension = file_extension(filename);
    let declared =
        DocumentFormat::from_extension(&extension).ok_or_else(|| ConvertError::unsupported(&extension))?;
    let (format, mut warnings) = sniff_format(data, declared);

    let block = format.extractor().extract(data)?;
    if !block.has_content() {
        let message = "document contains no extractable text".to_string();
        warn!("{filename}: {message}");
        warnings.push(message);
    }
    let stem = file_stem(filename);
    let document = normalize(&block, &stem, &settings.table);

    let quality = assess(&document, format.score_format(), &settings.scoring.quality);
    let training = assess_training(&document, &settings.scoring.training);
    info!(
        "converted {filename} as {}: {} bytes, quality {}, ai {}",
        format.as_str(),
        data.len(),
        quality.score,
        training.score
    );
    Ok(ConversionReport {
        markdown: document.text(),
        quality,
        training,
        format,
        output_filename: output_filename(filename),
        warnings,
    })
}

pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

pub fn file_stem(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("document");
    let stem = sanitize_filename_stem(stem);
    if stem.trim().is_empty() {
        "document".to_string()
    } else {
        stem
    }
}

pub fn output_filename(filename: &str) -> String {
    format!("{}.md", file_stem(filename))
}

pub fn sanitize_filename_stem(name: &str) -> String {
    let cleaned = name
        .trim()
        .chars()
        .map(|ch| match ch {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect::<String>();
    let cleaned = cleaned.trim_matches(['.', ' '].as_ref()).to_string();
    cleaned.replace("..", "_")
}

fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{trimmed}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfficeContainer {
    Zip,
    Ole,
    Unknown,
}

/// 以文件头修正扩展名：docx/doc、xlsx/xls 互相误标时按真实容器处理。
fn sniff_format(data: &[u8], declared: DocumentFormat) -> (DocumentFormat, Vec<String>) {
    let mut warnings = Vec::new();
    let container = sniff_office_container(data);
    let effective = match (declared, container) {
        (DocumentFormat::Docx | DocumentFormat::Doc, OfficeContainer::Zip) => {
            match detect_zip_kind(data) {
                Some("xlsx") => DocumentFormat::Xlsx,
                _ => DocumentFormat::Docx,
            }
        }
        (DocumentFormat::Docx, OfficeContainer::Ole) => DocumentFormat::Doc,
        (DocumentFormat::Xls, OfficeContainer::Zip) => DocumentFormat::Xlsx,
        (DocumentFormat::Xlsx, OfficeContainer::Ole) => DocumentFormat::Xls,
        (declared, _) => declared,
    };
    if effective != declared {
        let message = format!(
            "file header indicates .{} container; overriding .{} extension",
            effective.as_str(),
            declared.as_str()
        );
        warn!("{message}");
        warnings.push(message);
    }
    (effective, warnings)
}

fn sniff_office_container(data: &[u8]) -> OfficeContainer {
    if data.len() >= 4
        && (data.starts_with(b"PK\x03\x04")
            || data.starts_with(b"PK\x05\x06")
            || data.starts_with(b"PK\x07\x08"))
    {
        return OfficeContainer::Zip;
    }
    if data.len() >= 8 && data[..8] == [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1] {
        return OfficeContainer::Ole;
    }
    OfficeContainer::Unknown
}

fn detect_zip_kind(data: &[u8]) -> Option<&'static str> {
    let mut archive = ZipArchive::new(Cursor::new(data)).ok()?;
    if archive.by_name("word/document.xml").is_ok() {
        return Some("docx");
    }
    if archive.by_name("xl/workbook.xml").is_ok() {
        return Some("xlsx");
    }
    None
}

pub(crate) fn read_zip_entry(data: &[u8], name: &str) -> Result<Option<String>, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|err| ConvertError::extraction(format!("invalid zip container: {err}")))?;
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => {
            return Err(ConvertError::extraction(format!(
                "cannot read {name}: {err}"
            )))
        }
    };
    let mut buffer = Vec::new();
    entry
        .read_to_end(&mut buffer)
        .map_err(|err| ConvertError::extraction(format!("cannot read {name}: {err}")))?;
    Ok(Some(String::from_utf8_lossy(&buffer).to_string()))
}
