// file: src/pipeline/summarize.rs
// description: structured paper summarization prompt and response parsing

use crate::models::Document;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Characters of body text included in the summarization prompt. Anything
/// longer is truncated; the head of a paper carries its contribution.
const SUMMARY_CONTENT_CHARS: usize = 8000;

/// Maximum line length still treated as a section header rather than body.
const MAX_HEADER_CHARS: usize = 60;

/// A structured summary of one ingested paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperSummary {
    pub document_id: Uuid,
    pub title: String,
    pub summary: String,
    pub contributions: String,
    pub methodology: String,
    pub findings: String,
    pub limitations: String,
    pub generated_at: DateTime<Utc>,
}

impl PaperSummary {
    pub fn from_response(document: &Document, response: &str) -> Self {
        let [summary, contributions, methodology, findings, limitations] =
            parse_sections(response);

        Self {
            document_id: document.id,
            title: document.title.clone(),
            summary,
            contributions,
            methodology,
            findings,
            limitations,
            generated_at: Utc::now(),
        }
    }
}

/// Render the summarization prompt for one document.
pub fn build_summary_prompt(document: &Document) -> String {
    let content: String = document
        .raw_text
        .chars()
        .take(SUMMARY_CONTENT_CHARS)
        .collect();
    let truncated = document.raw_text.chars().count() > SUMMARY_CONTENT_CHARS;

    format!(
        "Analyze this research paper and provide a structured summary:\n\n\
         Title: {}\n\
         Abstract: {}\n\
         Content: {}{}\n\n\
         Provide a comprehensive summary with these sections:\n\
         1. **MAIN SUMMARY** (2-3 sentences)\n\
         2. **KEY CONTRIBUTIONS** (3-5 bullet points)\n\
         3. **METHODOLOGY** (brief description)\n\
         4. **KEY FINDINGS** (3-5 bullet points)\n\
         5. **LIMITATIONS** (if mentioned)\n\n\
         Format your response clearly with section headers.",
        document.title,
        document.abstract_text,
        content,
        if truncated { "..." } else { "" },
    )
}

fn section_index(line: &str) -> Option<usize> {
    if line.chars().count() > MAX_HEADER_CHARS {
        return None;
    }

    let lower = line.to_lowercase();
    if lower.contains("main summary") {
        Some(0)
    } else if lower.contains("contribution") {
        Some(1)
    } else if lower.contains("methodolog") {
        Some(2)
    } else if lower.contains("finding") {
        Some(3)
    } else if lower.contains("limitation") {
        Some(4)
    } else {
        None
    }
}

/// Split the model's response into the five requested sections. Header lines
/// switch the active section and are not kept; body lines accumulate into
/// whichever section is active, starting with the main summary.
fn parse_sections(response: &str) -> [String; 5] {
    let mut sections: [String; 5] = Default::default();
    let mut current = 0usize;

    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(index) = section_index(line) {
            current = index;
            continue;
        }

        let body = line.trim_start_matches(['-', '*', '•']).trim();
        if body.is_empty() {
            continue;
        }
        if !sections[current].is_empty() {
            sections[current].push('\n');
        }
        sections[current].push_str(body);
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn document(text: &str) -> Document {
        Document::new(
            text.to_string(),
            "A Paper".to_string(),
            "An abstract.".to_string(),
            None,
            None,
        )
    }

    #[test]
    fn test_prompt_contains_metadata_and_sections() {
        let prompt = build_summary_prompt(&document("body text"));
        assert!(prompt.contains("Title: A Paper"));
        assert!(prompt.contains("Abstract: An abstract."));
        assert!(prompt.contains("Content: body text"));
        assert!(prompt.contains("**MAIN SUMMARY**"));
        assert!(prompt.contains("**LIMITATIONS**"));
        assert!(!prompt.contains("body text..."));
    }

    #[test]
    fn test_prompt_truncates_long_content() {
        let long = "x".repeat(SUMMARY_CONTENT_CHARS + 500);
        let prompt = build_summary_prompt(&document(&long));
        assert!(prompt.contains(&format!("{}...", "x".repeat(20))));
        assert!(!prompt.contains(&"x".repeat(SUMMARY_CONTENT_CHARS + 1)));
    }

    #[test]
    fn test_parse_sections_by_header() {
        let response = "\
**MAIN SUMMARY**\n\
The paper introduces a model.\n\
\n\
**KEY CONTRIBUTIONS**\n\
- a new attention scheme\n\
- state of the art results\n\
\n\
**METHODOLOGY**\n\
Encoder-decoder with attention.\n\
\n\
**KEY FINDINGS**\n\
- outperforms baselines\n\
\n\
**LIMITATIONS**\n\
Only evaluated on translation.";

        let [summary, contributions, methodology, findings, limitations] =
            parse_sections(response);
        assert_eq!(summary, "The paper introduces a model.");
        assert_eq!(contributions, "a new attention scheme\nstate of the art results");
        assert_eq!(methodology, "Encoder-decoder with attention.");
        assert_eq!(findings, "outperforms baselines");
        assert_eq!(limitations, "Only evaluated on translation.");
    }

    #[test]
    fn test_unstructured_response_lands_in_summary() {
        let [summary, contributions, ..] = parse_sections("Just a plain paragraph answer.");
        assert_eq!(summary, "Just a plain paragraph answer.");
        assert!(contributions.is_empty());
    }

    #[test]
    fn test_long_body_line_mentioning_findings_is_not_a_header() {
        let response = format!(
            "MAIN SUMMARY\n{} these findings generalize to other domains and tasks.",
            "The evaluation is extensive and".to_string()
        );
        let [summary, _, _, findings, _] = parse_sections(&response);
        assert!(summary.contains("generalize"));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_from_response_carries_document_identity() {
        let doc = document("body");
        let summary = PaperSummary::from_response(&doc, "MAIN SUMMARY\nShort.");
        assert_eq!(summary.document_id, doc.id);
        assert_eq!(summary.title, "A Paper");
        assert_eq!(summary.summary, "Short.");
    }
}
