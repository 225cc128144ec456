//! Token and cost accounting for one pipeline run.

use serde::{Deserialize, Serialize};

use crate::task::StageResponse;

/// Model usage summed over a run's stage responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunUsage {
    /// Total tokens used
    pub total_tokens: u64,

    /// Prompt/input tokens
    pub prompt_tokens: u64,

    /// Completion/output tokens
    pub completion_tokens: u64,

    /// Number of model calls that returned text
    pub model_calls: u32,

    /// Estimated cost in USD, from each adapter's advertised price
    pub estimated_cost: f64,
}

impl RunUsage {
    /// Add one stage response. Responses that never reached a model add nothing.
    pub fn add(&mut self, response: &StageResponse) {
        let usage = &response.token_usage;
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total_tokens);
        self.estimated_cost += response.estimated_cost;

        if response.model_used.is_some() && response.provider.is_some() {
            self.model_calls += 1;
        }
    }
}
