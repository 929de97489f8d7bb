// file: src/context/mod.rs
// description: prompt assembly under a token budget with citation markers
// reference: greedy context packing, history truncation, budget split

use crate::config::ContextConfig;
use crate::error::{RagError, Result};
use crate::models::{QaExchange, estimate_tokens};
use crate::store::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

const SYSTEM_INSTRUCTIONS: &str = "You are a research assistant. Answer the question using the \
numbered sources when they are provided. After any claim a source supports, append its marker, \
for example [S1]. If no sources are given, answer from general knowledge and say so.";

/// Per-block token surcharge for the marker, title line and separators.
const BLOCK_OVERHEAD_TOKENS: usize = 8;
/// Scaffolding around the sections: headers, blank lines, final instruction.
const SCAFFOLD_TOKENS: usize = 32;

/// A retrieved chunk joined with its parent document's attribution fields.
#[derive(Debug, Clone)]
pub struct SourcedChunk {
    pub chunk: crate::models::Chunk,
    pub score: f32,
    pub title: String,
    pub source_uri: Option<String>,
}

impl SourcedChunk {
    pub fn new(scored: ScoredChunk, title: String, source_uri: Option<String>) -> Self {
        Self {
            chunk: scored.chunk,
            score: scored.score,
            title,
            source_uri,
        }
    }

    fn cost_tokens(&self) -> usize {
        self.chunk.token_count + estimate_tokens(&self.title) + BLOCK_OVERHEAD_TOKENS
    }
}

/// One context block included in the prompt, tagged with its marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBlock {
    pub marker: String,
    pub chunk_id: Uuid,
    pub document_id: Uuid,
    pub title: String,
    pub source_uri: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub context: Vec<ContextBlock>,
    /// Oldest-first, already truncated to fit the budget.
    pub history: Vec<QaExchange>,
    pub question: String,
}

impl Prompt {
    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }

    /// Marker -> chunk id, used by post-processing to resolve citations.
    pub fn marker_map(&self) -> HashMap<String, Uuid> {
        self.context
            .iter()
            .map(|block| (block.marker.clone(), block.chunk_id))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.system);
        out.push_str("\n\n");

        if !self.context.is_empty() {
            out.push_str("Sources:\n");
            for block in &self.context {
                out.push_str(&format!(
                    "{} ({}) {}\n",
                    block.marker, block.title, block.text
                ));
            }
            out.push('\n');
        }

        if !self.history.is_empty() {
            out.push_str("Conversation so far:\n");
            for exchange in &self.history {
                out.push_str(&format!("Q: {}\nA: {}\n", exchange.question, exchange.answer));
            }
            out.push('\n');
        }

        out.push_str(&format!("Question: {}\n", self.question));
        out
    }

    pub fn token_estimate(&self) -> usize {
        estimate_tokens(&self.render())
    }
}

pub struct ContextAssembler {
    token_budget: usize,
    max_history_exchanges: usize,
    /// Tokens withheld from the prompt for the model's response.
    response_reserve: usize,
}

impl ContextAssembler {
    pub fn new(config: &ContextConfig, response_reserve: usize) -> Self {
        Self {
            token_budget: config.token_budget,
            max_history_exchanges: config.max_history_exchanges,
            response_reserve,
        }
    }

    /// Pack retrieved chunks (score-descending) and then history
    /// (most-recent-first) into the budget. Context wins over history; the
    /// only fatal case is a budget too small for even the smallest chunk.
    pub fn assemble(
        &self,
        question: &str,
        retrieved: Vec<SourcedChunk>,
        history: &[QaExchange],
    ) -> Result<Prompt> {
        let base_cost =
            estimate_tokens(SYSTEM_INSTRUCTIONS) + estimate_tokens(question) + SCAFFOLD_TOKENS;

        // Even an empty prompt carries the system instructions, the question
        // and the response reserve; a budget below that can never be met.
        if base_cost + self.response_reserve > self.token_budget {
            return Err(RagError::ContextOverflow {
                budget_tokens: self.token_budget,
                minimal_tokens: base_cost + self.response_reserve,
            });
        }

        let available = self.token_budget - base_cost - self.response_reserve;

        let mut remaining = available;
        let mut context = Vec::new();

        for source in &retrieved {
            let cost = source.cost_tokens();
            if cost > remaining {
                break;
            }
            remaining -= cost;
            let marker = format!("[S{}]", context.len() + 1);
            context.push(ContextBlock {
                marker,
                chunk_id: source.chunk.id,
                document_id: source.chunk.document_id,
                title: source.title.clone(),
                source_uri: source.source_uri.clone(),
                text: source.chunk.text.clone(),
            });
        }

        if context.is_empty() && !retrieved.is_empty() {
            // Greedy inclusion stops at the first chunk that does not fit;
            // before failing, see whether any chunk at all would fit.
            let minimal = retrieved
                .iter()
                .min_by_key(|s| s.cost_tokens())
                .expect("retrieved is non-empty");

            let minimal_cost = minimal.cost_tokens();
            if minimal_cost > available {
                return Err(RagError::ContextOverflow {
                    budget_tokens: self.token_budget,
                    minimal_tokens: minimal_cost,
                });
            }

            remaining = available - minimal_cost;
            context.push(ContextBlock {
                marker: "[S1]".to_string(),
                chunk_id: minimal.chunk.id,
                document_id: minimal.chunk.document_id,
                title: minimal.title.clone(),
                source_uri: minimal.source_uri.clone(),
                text: minimal.chunk.text.clone(),
            });
        }

        // History most-recent-first until the leftover budget runs out,
        // rendered oldest-first afterwards.
        let mut included_history: Vec<QaExchange> = Vec::new();
        for exchange in history.iter().rev().take(self.max_history_exchanges) {
            let cost = estimate_tokens(&exchange.question)
                + estimate_tokens(&exchange.answer)
                + BLOCK_OVERHEAD_TOKENS;
            if cost > remaining {
                break;
            }
            remaining -= cost;
            included_history.push(exchange.clone());
        }
        included_history.reverse();

        debug!(
            context_blocks = context.len(),
            history_exchanges = included_history.len(),
            tokens_left = remaining,
            "Prompt assembled"
        );

        Ok(Prompt {
            system: SYSTEM_INSTRUCTIONS.to_string(),
            context,
            history: included_history,
            question: question.to_string(),
        })
    }
}
