mod common;

use anyhow::Result;
use common::{build_docx, build_pdf, build_xlsx, words, Para};
use doc2md_server::doc2md::{convert, ConvertSettings, DocumentFormat, ErrorKind};
use doc2md_server::scoring::Tone;

fn settings() -> ConvertSettings {
    ConvertSettings::default()
}

#[test]
fn xlsx_with_header_and_five_rows_scores_perfect_quality() -> Result<()> {
    let mut rows = vec![vec!["id", "name"]];
    rows.extend([
        vec!["1", "alpha"],
        vec!["2", "beta"],
        vec!["3", "gamma"],
        vec!["4", "delta"],
        vec!["5", "epsilon"],
    ]);
    let data = build_xlsx("Inventory", &rows)?;
    let report = convert(&data, "inventory.xlsx", &settings())?;

    assert_eq!(report.format, DocumentFormat::Xlsx);
    assert_eq!(report.quality.score, 100);
    assert!(report.quality.issues.is_empty());
    assert_eq!(report.output_filename, "inventory.md");

    let lines = report.markdown.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "# Inventory");
    let table = lines
        .iter()
        .filter(|line| line.starts_with('|'))
        .collect::<Vec<_>>();
    assert_eq!(table.len(), 7);
    let width = table[0].chars().count();
    assert!(table.iter().all(|line| line.chars().count() == width));
    assert!(table[1].chars().all(|ch| ch == '|' || ch == '-'));
    Ok(())
}

#[test]
fn short_docx_with_heading_reflects_length_penalty() -> Result<()> {
    let body = words(48);
    let data = build_docx(&[Para::Heading("Overview"), Para::Text(&body)])?;
    let report = convert(&data, "overview.docx", &settings())?;

    assert!(report.markdown.starts_with("# Overview\n"));
    assert_eq!(report.quality.score, 100);
    // 50 + 15 - 25 - 5 - 5 - 10 - 5
    assert_eq!(report.training.score, 15);
    let messages = report.training.messages();
    assert!(messages.contains(&"Document has clear section headings".to_string()));
    assert!(messages.contains(&"Content is too short (50 words)".to_string()));
    assert_eq!(report.training.feedback[0].tone, Tone::Negative);
    Ok(())
}

#[test]
fn generated_identifier_heading_is_replaced_by_filename_title() -> Result<()> {
    let data = build_docx(&[
        Para::Heading("0f8fad5b-d9cb-469f-a165-70867728950e"),
        Para::Text("Plain paragraph text."),
    ])?;
    let report = convert(
        &data,
        "minutes_0f8fad5b-d9cb-469f-a165-70867728950e.docx",
        &settings(),
    )?;
    assert!(report.markdown.starts_with("# minutes\n"));
    assert!(!report.markdown.contains("0f8fad5b"));
    Ok(())
}

#[test]
fn docx_without_heading_gets_one_injected() -> Result<()> {
    let data = build_docx(&[Para::Text("Just a sentence.")])?;
    let report = convert(&data, "field notes.docx", &settings())?;
    assert_eq!(report.markdown.lines().next(), Some("# field notes"));
    Ok(())
}

#[test]
fn ragged_spreadsheet_rows_are_padded() -> Result<()> {
    let rows = vec![vec!["a", "b", "c"], vec!["1"], vec!["2", "3"]];
    let data = build_xlsx("Sheet1", &rows)?;
    let report = convert(&data, "ragged.xlsx", &settings())?;
    let table = report
        .markdown
        .lines()
        .filter(|line| line.starts_with('|'))
        .collect::<Vec<_>>();
    assert_eq!(table.len(), 4);
    for line in &table {
        assert_eq!(line.matches('|').count(), 4, "{line}");
    }
    Ok(())
}

#[test]
fn spreadsheet_mislabelled_as_docx_is_rerouted() -> Result<()> {
    let data = build_xlsx("Data", &[vec!["k", "v"], vec!["x", "1"]])?;
    let report = convert(&data, "data.docx", &settings())?;
    assert_eq!(report.format, DocumentFormat::Xlsx);
    assert_eq!(report.warnings.len(), 1);
    Ok(())
}

#[test]
fn sheet_name_with_pipe_stays_a_heading() -> Result<()> {
    let data = build_xlsx("In|Out", &[vec!["k", "v"], vec!["x", "1"]])?;
    let report = convert(&data, "flows.xlsx", &settings())?;
    assert_eq!(report.markdown.lines().next(), Some("# In/Out"));
    assert_eq!(report.quality.score, 100);
    Ok(())
}

#[test]
fn short_pdf_gets_title_and_length_penalty() -> Result<()> {
    let data = build_pdf("Quarterly numbers are up.");
    let report = convert(&data, "summary.pdf", &settings())?;
    assert_eq!(report.format, DocumentFormat::Pdf);
    assert_eq!(report.markdown.lines().next(), Some("# summary"));
    assert!(report.markdown.contains("Quarterly"));
    // 100 + 20 (封顶 100) - 15
    assert_eq!(report.quality.score, 85);
    assert_eq!(report.quality.issues, vec!["Short PDF content".to_string()]);
    Ok(())
}

#[test]
fn documents_without_text_convert_to_empty_markdown() -> Result<()> {
    let cases = [
        (build_docx(&[])?, "blank.docx"),
        (build_xlsx("Empty", &[])?, "blank.xlsx"),
        (build_pdf(""), "blank.pdf"),
    ];
    for (data, filename) in cases {
        let report = convert(&data, filename, &settings())?;
        assert_eq!(report.markdown, "", "{filename}");
        assert_eq!(report.quality.score, 0, "{filename}");
        assert_eq!(report.quality.issues, vec!["Empty content".to_string()]);
        assert_eq!(report.training.score, 0, "{filename}");
        assert_eq!(report.training.messages(), vec!["Empty content".to_string()]);
        assert!(!report.warnings.is_empty(), "{filename}");
    }
    Ok(())
}

#[test]
fn unsupported_and_corrupt_inputs_fail_with_codes() {
    let err = convert(b"hello", "notes.txt", &settings()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(err.code(), "UNSUPPORTED_FORMAT");

    let err = convert(b"not really a pdf", "broken.pdf", &settings()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtractionFailure);

    let err = convert(b"", "   ", &settings()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyFilename);
}

#[test]
fn conversion_is_deterministic() -> Result<()> {
    let data = build_docx(&[Para::Heading("Intro"), Para::Text("The API is an interface.")])?;
    let first = convert(&data, "intro.docx", &settings())?;
    let second = convert(&data, "intro.docx", &settings())?;
    assert_eq!(first.markdown, second.markdown);
    assert_eq!(first.quality, second.quality);
    assert_eq!(first.training, second.training);
    Ok(())
}
