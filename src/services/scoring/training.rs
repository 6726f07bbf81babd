// 训练适用性评分：基准 50 分，按内容信号逐项加减。
use super::{clamp_score, first_table_is_well_formed};
use crate::core::config::TrainingRules;
use crate::services::doc2md::text::compile_regex;
use crate::services::doc2md::MarkdownDocument;
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

const EXAMPLE_MARKERS: &[&str] = &["example", "e.g.", "for instance", "such as"];
const EXPLANATORY_MARKERS: &[&str] = &[
    "explains",
    "means",
    "refers to",
    "is defined as",
    "in other words",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub tone: Tone,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainingResult {
    pub score: u8,
    pub feedback: Vec<Feedback>,
}

impl TrainingResult {
    pub fn messages(&self) -> Vec<String> {
        self.feedback.iter().map(|item| item.message.clone()).collect()
    }
}

struct Tally {
    score: i32,
    feedback: Vec<Feedback>,
}

impl Tally {
    fn add(&mut self, delta: i32, message: impl Into<String>) {
        self.score += delta;
        self.feedback.push(Feedback {
            tone: Tone::Positive,
            message: message.into(),
        });
    }

    fn sub(&mut self, delta: i32, message: impl Into<String>) {
        self.score -= delta;
        self.feedback.push(Feedback {
            tone: Tone::Negative,
            message: message.into(),
        });
    }
}

pub fn assess_training(doc: &MarkdownDocument, rules: &TrainingRules) -> TrainingResult {
    if doc.is_blank() {
        return TrainingResult {
            score: 0,
            feedback: vec![Feedback {
                tone: Tone::Negative,
                message: "Empty content".to_string(),
            }],
        };
    }

    let text = doc.text();
    let lowered = text.to_lowercase();
    let mut tally = Tally {
        score: rules.base_score,
        feedback: Vec::new(),
    };

    if doc.lines.iter().any(|line| is_markdown_heading(line)) {
        tally.add(rules.heading_delta, "Document has clear section headings");
    } else {
        tally.sub(rules.heading_delta, "No section headings found");
    }

    let words = text.split_whitespace().count();
    if words < rules.short_words {
        tally.sub(
            rules.short_penalty,
            format!("Content is too short ({words} words)"),
        );
    } else if words < rules.medium_words {
        tally.sub(
            rules.medium_penalty,
            format!("Content length is moderate ({words} words)"),
        );
    } else {
        tally.add(
            rules.long_bonus,
            format!("Substantial content length ({words} words)"),
        );
    }

    if EXAMPLE_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        tally.add(rules.examples_bonus, "Contains examples");
    } else {
        tally.sub(rules.examples_penalty, "No examples found");
    }

    let technical_hits = technical_term_count(&text);
    if technical_hits >= rules.technical_min_hits {
        tally.add(
            rules.technical_bonus,
            format!("Good technical depth ({technical_hits} technical terms)"),
        );
    } else {
        tally.sub(rules.technical_penalty, "Limited technical vocabulary");
    }

    if let Some(has_digit) = well_formed_table_digits(&doc.lines) {
        tally.add(rules.structured_bonus, "Contains structured tables");
        if has_digit {
            tally.add(rules.numeric_table_bonus, "Tables include numeric data");
        }
    } else if has_fenced_code(&doc.lines) {
        tally.add(rules.structured_bonus, "Contains code blocks");
    } else {
        tally.sub(
            rules.unstructured_penalty,
            "No structured content (tables or code blocks)",
        );
    }

    if doc.lines.iter().any(|line| is_bullet_line(line)) {
        tally.add(rules.list_bonus, "Uses lists to organize information");
    }

    if EXPLANATORY_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        tally.add(rules.explanatory_delta, "Contains explanatory language");
    } else {
        tally.sub(rules.explanatory_delta, "Lacks explanatory language");
    }

    let (mut negative, positive): (Vec<_>, Vec<_>) = tally
        .feedback
        .into_iter()
        .partition(|item| item.tone == Tone::Negative);
    negative.extend(positive);
    TrainingResult {
        score: clamp_score(tally.score),
        feedback: negative,
    }
}

fn is_markdown_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|ch| *ch == '#').count();
    (1..=6).contains(&hashes)
        && trimmed[hashes..]
            .chars()
            .next()
            .map(char::is_whitespace)
            .unwrap_or(false)
}

fn is_bullet_line(line: &str) -> bool {
    let mut chars = line.trim_start().chars();
    matches!(chars.next(), Some('-' | '*' | '+'))
        && chars.next().map(char::is_whitespace).unwrap_or(false)
}

fn technical_term_count(text: &str) -> usize {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| {
            compile_regex(
                r"(?i)\b(algorithm|function|method|api|interface|implementation|framework)s?\b",
                "technical_terms",
            )
        })
        .as_ref()
        .map(|regex| regex.find_iter(text).count())
        .unwrap_or(0)
}

/// 规范表格存在时返回表格区域是否含数字。
fn well_formed_table_digits(lines: &[String]) -> Option<bool> {
    if first_table_is_well_formed(lines) != Some(true) {
        return None;
    }
    let start = lines.iter().position(|line| line.contains('|'))?;
    let has_digit = lines[start..]
        .iter()
        .take_while(|line| line.contains('|'))
        .any(|line| line.chars().any(|ch| ch.is_ascii_digit()));
    Some(has_digit)
}

fn has_fenced_code(lines: &[String]) -> bool {
    let fences = lines
        .iter()
        .filter(|line| line.trim_start().starts_with("```"))
        .count();
    fences >= 2
}
