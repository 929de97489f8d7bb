// file: src/pipeline/mod.rs
// description: pipeline module exports
// reference: internal module structure

pub mod orchestrator;
pub mod readiness;
pub mod stage;
pub mod summarize;

pub use orchestrator::{AskResponse, IngestMetadata, IngestReceipt, Orchestrator};
pub use readiness::{ReadinessGate, ReadinessState};
pub use stage::Stage;
pub use summarize::PaperSummary;
