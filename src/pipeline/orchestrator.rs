// file: src/pipeline/orchestrator.rs
// description: wires chunking, embedding, retrieval, assembly and generation
// reference: ingest and question/answer entry points

use crate::chunker::Chunker;
use crate::config::Config;
use crate::context::{ContextAssembler, ContextBlock, Prompt, SourcedChunk};
use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::extract;
use crate::llm::{CompletionApi, LlmGateway};
use crate::models::{Answer, Chunk, Citation, Document, QaExchange};
use crate::pipeline::readiness::ReadinessGate;
use crate::pipeline::stage::Stage;
use crate::pipeline::summarize::{self, PaperSummary};
use crate::retriever::Retriever;
use crate::store::{MemoryVectorStore, ScopeFilter, StoreStats};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

lazy_static! {
    static ref MARKER_RE: Regex = Regex::new(r"\[S\d+\]").expect("MARKER_RE regex is valid");
}

/// Caller-supplied fields accompanying a raw document at ingestion.
#[derive(Debug, Clone, Default)]
pub struct IngestMetadata {
    /// Overrides title extraction when set.
    pub title: Option<String>,
    pub source_uri: Option<String>,
    pub project_id: Option<String>,
}

/// What the caller gets back from a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestReceipt {
    pub document_id: Uuid,
    pub title: String,
    pub chunk_count: usize,
    /// True when an earlier copy of the same content was replaced.
    pub replaced: bool,
}

/// A grounded answer with its resolved source attributions.
#[derive(Debug, Clone)]
pub struct AskResponse {
    pub answer: Answer,
    pub citations: Vec<Citation>,
}

/// Owns every pipeline component and runs the two top-level operations:
/// `ingest` a document, `ask` a question. Cheap to share behind an `Arc`;
/// all methods take `&self`.
pub struct Orchestrator<E: Embedder, A: CompletionApi> {
    chunker: Chunker,
    embedder: Arc<E>,
    store: Arc<MemoryVectorStore>,
    retriever: Retriever<E>,
    assembler: ContextAssembler,
    gateway: LlmGateway<A>,
    readiness: ReadinessGate,
    last_failure: Mutex<Option<(Stage, String)>>,
}

impl<E: Embedder, A: CompletionApi> Orchestrator<E, A> {
    pub fn new(
        config: &Config,
        embedder: Arc<E>,
        store: Arc<MemoryVectorStore>,
        api: A,
    ) -> Result<Self> {
        let chunker = Chunker::new(&config.chunking)?;
        let retriever = Retriever::new(embedder.clone(), store.clone(), config.retrieval.clone());
        // The model's own output shares the context window with the prompt.
        let assembler = ContextAssembler::new(&config.context, config.llm.max_tokens);
        let gateway = LlmGateway::new(api, config.llm.clone());

        Ok(Self {
            chunker,
            embedder,
            store,
            retriever,
            assembler,
            gateway,
            readiness: ReadinessGate::new(),
            last_failure: Mutex::new(None),
        })
    }

    pub fn readiness(&self) -> &ReadinessGate {
        &self.readiness
    }

    /// The stage and message of the most recent failed question, for
    /// diagnostics. Cleared by the next successful answer.
    pub fn last_failure(&self) -> Option<(Stage, String)> {
        self.last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record_outcome(&self, outcome: Option<(Stage, String)>) {
        let mut guard = self
            .last_failure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = outcome;
    }

    pub fn store(&self) -> &Arc<MemoryVectorStore> {
        &self.store
    }

    /// Restore persisted state (when a snapshot path is configured) and open
    /// the readiness gate. Returns whether a snapshot was restored.
    pub async fn initialize(&self, snapshot: Option<&Path>) -> Result<bool> {
        self.readiness.begin();

        let restored = match snapshot {
            Some(path) if path.exists() => match self.store.load_snapshot(path).await {
                Ok(restored) => restored,
                Err(err) => {
                    self.readiness.mark_failed(err.to_string());
                    return Err(err);
                }
            },
            _ => false,
        };

        self.readiness.mark_ready();
        Ok(restored)
    }

    /// Ingest one document: clean, extract metadata, chunk, embed, store.
    /// Embedding happens before any write, so a failure (or a cancelled
    /// future) leaves the store exactly as it was.
    pub async fn ingest(&self, raw_text: &str, metadata: IngestMetadata) -> Result<IngestReceipt> {
        let started = Instant::now();

        let cleaned = extract::clean_text(raw_text);
        let title = metadata
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| extract::extract_title(&cleaned));
        let abstract_text = extract::extract_abstract(&cleaned);

        let replaced = self
            .store
            .find_by_hash(&Document::compute_hash(&cleaned))
            .await
            .is_some();
        if replaced {
            info!(%title, "Identical content already stored, replacing");
        }

        let document = Document::new(
            cleaned,
            title.clone(),
            abstract_text,
            metadata.source_uri,
            metadata.project_id,
        );

        let segments = self.chunker.chunk(&document.raw_text);
        let texts: Vec<String> = segments.iter().map(|s| s.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let chunks: Vec<Chunk> = segments
            .into_iter()
            .zip(embeddings)
            .map(|(segment, embedding)| {
                Chunk::new(
                    document.id,
                    segment.text,
                    segment.position_index,
                    embedding,
                    self.embedder.version().to_string(),
                )
            })
            .collect();

        let receipt = IngestReceipt {
            document_id: document.id,
            title,
            chunk_count: chunks.len(),
            replaced,
        };

        self.store.upsert_document(document, chunks).await?;

        info!(
            document_id = %receipt.document_id,
            chunks = receipt.chunk_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Document ingested"
        );
        Ok(receipt)
    }

    /// Answer `question` from the ingested corpus. Failures are attributed
    /// to the stage that produced them before being returned.
    pub async fn ask(
        &self,
        question: &str,
        project_id: Option<&str>,
        history: &[QaExchange],
    ) -> Result<AskResponse> {
        let started = Instant::now();

        match self.run_stages(question, project_id, history).await {
            Ok(response) => {
                self.record_outcome(None);
                info!(
                    stage = %Stage::Done,
                    citations = response.citations.len(),
                    no_context = response.answer.no_context,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Question answered"
                );
                Ok(response)
            }
            Err((stage, err)) => {
                self.record_outcome(Some((stage, err.to_string())));
                warn!(
                    stage = %stage,
                    code = err.code(),
                    error = %err,
                    "Question failed"
                );
                Err(err)
            }
        }
    }

    async fn run_stages(
        &self,
        question: &str,
        project_id: Option<&str>,
        history: &[QaExchange],
    ) -> std::result::Result<AskResponse, (Stage, RagError)> {
        debug!(stage = %Stage::Received, question_chars = question.chars().count());

        let embedding = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| (Stage::Embedding, e))?;

        let scope = ScopeFilter {
            project_id: project_id.map(str::to_string),
            document_id: None,
        };
        let retrieved = self
            .retriever
            .retrieve_embedded(&embedding, &scope)
            .await
            .map_err(|e| (Stage::Retrieving, e))?;

        let mut sourced = Vec::with_capacity(retrieved.len());
        for scored in retrieved {
            let (title, source_uri) = match self.store.document(scored.chunk.document_id).await {
                Some(doc) => (doc.title, doc.source_uri),
                // The parent document was deleted between query and lookup.
                None => ("Unknown source".to_string(), None),
            };
            sourced.push(SourcedChunk::new(scored, title, source_uri));
        }

        let prompt = self
            .assembler
            .assemble(question, sourced, history)
            .map_err(|e| (Stage::Assembling, e))?;

        let no_context = !prompt.has_context();
        if no_context {
            info!("No sources above the similarity threshold, answering without context");
        }

        let completion = self
            .gateway
            .complete(&prompt)
            .await
            .map_err(|e| (Stage::Generating, e))?;

        debug!(stage = %Stage::PostProcessing, finish_reason = ?completion.finish_reason);
        let (text, cited_chunk_ids, citations) = resolve_markers(&completion.text, &prompt);

        Ok(AskResponse {
            answer: Answer::new(text, cited_chunk_ids, no_context),
            citations,
        })
    }

    /// Produce a structured summary of one ingested document through the
    /// same gated completion path as question answering.
    pub async fn summarize(&self, document_id: Uuid) -> Result<PaperSummary> {
        let document = self.store.document(document_id).await.ok_or_else(|| {
            RagError::Store(format!("document {} is not in the store", document_id))
        })?;

        let prompt = summarize::build_summary_prompt(&document);
        let completion = self.gateway.complete_text(&prompt).await?;

        info!(document_id = %document.id, title = %document.title, "Document summarized");
        Ok(PaperSummary::from_response(&document, &completion.text))
    }

    pub async fn stats(&self) -> StoreStats {
        self.store.stats().await
    }

    pub async fn clear(&self) {
        self.store.clear().await;
    }

    pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
        self.store.save_snapshot(path).await
    }
}

/// Resolve `[Sn]` markers in the model's output against the prompt's context
/// blocks. Known markers are kept and turned into citations in order of
/// first appearance; markers the model invented are removed from the text.
fn resolve_markers(text: &str, prompt: &Prompt) -> (String, HashSet<Uuid>, Vec<Citation>) {
    let blocks: HashMap<&str, &ContextBlock> = prompt
        .context
        .iter()
        .map(|block| (block.marker.as_str(), block))
        .collect();

    let mut cited_chunk_ids = HashSet::new();
    let mut citations: Vec<Citation> = Vec::new();

    let resolved = MARKER_RE.replace_all(text, |caps: &Captures| {
        let marker = &caps[0];
        match blocks.get(marker) {
            Some(block) => {
                cited_chunk_ids.insert(block.chunk_id);
                let citation = Citation {
                    title: block.title.clone(),
                    source_uri: block.source_uri.clone(),
                };
                if !citations.contains(&citation) {
                    citations.push(citation);
                }
                marker.to_string()
            }
            None => {
                debug!(marker, "Dropping marker with no matching source");
                String::new()
            }
        }
    });

    (resolved.into_owned(), cited_chunk_ids, citations)
}
