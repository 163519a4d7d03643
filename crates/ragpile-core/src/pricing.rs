//! Per-model token pricing.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelCost {
    #[serde(rename = "in")]
    pub input: f64,
    #[serde(rename = "out")]
    pub output: f64,
}

impl ModelCost {
    /// Estimated USD cost of one completion.
    pub fn estimate(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input + output_tokens as f64 * self.output) / 1_000_000.0
    }
}

// First match wins.
static MODEL_COSTS: LazyLock<Vec<(Regex, ModelCost)>> = LazyLock::new(|| {
    [(
        r"gpt-4\.1-\d+-\d+-\d+",
        ModelCost {
            input: 2.0,
            output: 8.0,
        },
    )]
    .into_iter()
    .map(|(pattern, cost)| (Regex::new(pattern).expect("valid regex"), cost))
    .collect()
});

pub fn cost_for_model(model: &str) -> Option<ModelCost> {
    MODEL_COSTS
        .iter()
        .find(|(pattern, _)| pattern.is_match(model))
        .map(|(_, cost)| *cost)
}
