use serde::{Deserialize, Serialize};

use crate::providers::Usage as LLMUsage;

/// One step of `mlx_lm` generation: the newly decoded text plus running
/// counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub generation_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_tps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_memory: Option<f64>,
}

impl From<&GenerationResponse> for LLMUsage {
    fn from(response: &GenerationResponse) -> Self {
        Self {
            input_tokens: response.prompt_tokens,
            output_tokens: response.generation_tokens,
            ..Self::default()
        }
    }
}

/// The JSON body between tool-call tags
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallBody {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}
