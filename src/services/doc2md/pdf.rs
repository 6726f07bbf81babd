use super::text::normalize_text;
use super::{ConvertError, ExtractedBlock, Extractor};
use std::panic::{self, AssertUnwindSafe};

pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<ExtractedBlock, ConvertError> {
        let pages = extract_pages(data)?;
        Ok(pages_to_block(pages))
    }
}

fn extract_pages(data: &[u8]) -> Result<Vec<String>, ConvertError> {
    // pdf-extract 遇到畸形文件可能 panic，这里统一转成抽取错误。
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(data)
    }));
    match outcome {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(err)) => Err(ConvertError::extraction(format!("pdf parse failed: {err}"))),
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|message| message.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown error".to_string());
            Err(ConvertError::extraction(format!("pdf parse failed: {detail}")))
        }
    }
}

/// 按页序拼接纯文本，每页段落之间留空行；不做表格识别。
fn pages_to_block(pages: Vec<String>) -> ExtractedBlock {
    let mut block = ExtractedBlock::default();
    for page in pages {
        let text = normalize_text(&page);
        if text.is_empty() {
            block.pages.push(text);
            continue;
        }
        if !block.lines.is_empty() {
            block.lines.push(String::new());
        }
        block.lines.extend(text.lines().map(str::to_string));
        block.pages.push(text);
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_keep_order_and_separation() {
        let block = pages_to_block(vec![
            "First   page\n\nline two".to_string(),
            "   ".to_string(),
            "Second page".to_string(),
        ]);
        assert_eq!(block.lines, vec!["First page", "line two", "", "Second page"]);
        assert_eq!(block.pages.len(), 3);
        assert_eq!(block.headings, 0);
    }

    #[test]
    fn garbage_is_an_extraction_error() {
        let err = extract_pages(b"%PDF-1.4 this is not really a pdf").unwrap_err();
        assert_eq!(err.kind(), super::super::ErrorKind::ExtractionFailure);
    }
}
