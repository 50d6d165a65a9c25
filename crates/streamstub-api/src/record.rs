//! Wire shapes for the newline-delimited stream.

use serde::Serialize;

/// One content line: `{"delta":"<spaces>","i":<index>}`.
#[derive(Debug, Serialize)]
pub struct ChunkRecord<'a> {
    pub delta: &'a str,
    pub i: usize,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CompletionTokensDetails {
    pub reasoning_tokens: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PromptTokensDetails {
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageSummary {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
    pub completion_tokens: u32,
    pub completion_tokens_details: CompletionTokensDetails,
    pub prompt_tokens_details: PromptTokensDetails,
}

/// The trailing line, identical for every request.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UsageLine {
    pub usage: UsageSummary,
}

impl UsageLine {
    pub const STUB: UsageLine = UsageLine {
        usage: UsageSummary {
            prompt_tokens: 34,
            total_tokens: 134,
            completion_tokens: 100,
            completion_tokens_details: CompletionTokensDetails { reasoning_tokens: 10 },
            prompt_tokens_details: PromptTokensDetails { cached_tokens: 11 },
        },
    };
}
