// file: src/pipeline/stage.rs
// description: per-request pipeline stage machine for failure attribution

use std::fmt;

/// The fixed stage order of one question/answer request. A request moves
/// strictly forward; `Failed` is reachable from any non-`Done` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Embedding,
    Retrieving,
    Assembling,
    Generating,
    PostProcessing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Embedding => "embedding",
            Stage::Retrieving => "retrieving",
            Stage::Assembling => "assembling",
            Stage::Generating => "generating",
            Stage::PostProcessing => "post_processing",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Generating.to_string(), "generating");
        assert_eq!(Stage::PostProcessing.to_string(), "post_processing");
    }
}
