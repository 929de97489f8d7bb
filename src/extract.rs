// file: src/extract.rs
// description: title/abstract extraction and text cleanup for ingested papers
// reference: https://docs.rs/regex

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"[ \t]+").expect("WHITESPACE_RUN regex is valid");
    static ref PAGE_ARTIFACT: Regex =
        Regex::new(r"(?im)^\s*Page \d+\s*$").expect("PAGE_ARTIFACT regex is valid");
    static ref BLANK_RUN: Regex = Regex::new(r"\n{3,}").expect("BLANK_RUN regex is valid");
}

const TITLE_SKIP_MARKERS: &[&str] = &["page", "arxiv", "doi", "submitted", "accepted"];
const MAX_ABSTRACT_CHARS: usize = 1000;

/// Normalize extracted paper text before chunking: collapse whitespace runs,
/// strip page-number artifacts and undo common PDF ligature damage.
pub fn clean_text(text: &str) -> String {
    let text = text
        .replace('\u{fb01}', "fi")
        .replace('\u{fb02}', "fl")
        .replace('\u{fb00}', "ff")
        .replace('\u{fb03}', "ffi")
        .replace('\u{fb04}', "ffl");

    let text = PAGE_ARTIFACT.replace_all(&text, "");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = BLANK_RUN.replace_all(&text, "\n\n");

    text.trim().to_string()
}

/// Best-effort title extraction: first plausible line near the top of the
/// document, skipping preprint boilerplate.
pub fn extract_title(text: &str) -> String {
    for line in text.lines().take(20) {
        let line = line.trim();
        if line.len() > 10 && line.len() < 200 {
            let lower = line.to_lowercase();
            if !TITLE_SKIP_MARKERS.iter().any(|m| lower.contains(m)) {
                return line.to_string();
            }
        }
    }

    "Unknown Title".to_string()
}

/// Best-effort abstract extraction: the span between an "abstract" heading
/// and the next known section header, capped at 1000 characters.
pub fn extract_abstract(text: &str) -> String {
    lazy_static! {
        static ref ABSTRACT_HEADING: Regex =
            Regex::new(r"(?i)abstract").expect("ABSTRACT_HEADING regex is valid");
        static ref SECTION_HEADING: Regex =
            Regex::new(r"(?i)introduction|1\.\s*introduction|1\s+introduction|key\s?words")
                .expect("SECTION_HEADING regex is valid");
    }

    let Some(heading) = ABSTRACT_HEADING.find(text) else {
        return "Abstract not found".to_string();
    };

    let tail = &text[heading.end()..];
    let end = SECTION_HEADING.find(tail).map_or(tail.len(), |m| m.start());
    let abstract_text = tail[..end].trim();

    if abstract_text.chars().count() > MAX_ABSTRACT_CHARS {
        let truncated: String = abstract_text.chars().take(MAX_ABSTRACT_CHARS).collect();
        format!("{}...", truncated)
    } else {
        abstract_text.to_string()
    }
}
