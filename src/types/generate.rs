//! Types for text generation against the on-device model.

use serde::{Deserialize, Serialize};

use super::crisis::CrisisResult;

/// Generation parameters passed through to the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateParams {
    /// Optional system instruction prepended by the backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Sampling temperature (0.0 to 2.0).
    pub temperature: f32,

    /// Maximum number of tokens to generate.
    pub max_tokens: usize,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            system_prompt: None,
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

impl GenerateParams {
    /// Create params with defaults (temperature 0.7, 256 tokens).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the system instruction.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A single model call, identified by a caller-supplied key.
///
/// Immutable once submitted: the coordinator deduplicates on `key`, so two
/// requests with the same key are assumed to ask for the same thing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Caller identity used for deduplication and cancellation.
    pub key: String,

    /// Prompt text.
    pub prompt: String,

    /// Generation parameters.
    pub params: GenerateParams,
}

impl InferenceRequest {
    /// Create a request with default parameters.
    pub fn new(key: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            prompt: prompt.into(),
            params: GenerateParams::default(),
        }
    }

    /// Replace the generation parameters.
    pub fn params(mut self, params: GenerateParams) -> Self {
        self.params = params;
        self
    }
}

/// Outcome of a raw inference call: model text, or a crisis override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InferenceOutcome {
    Text(String),
    Crisis(CrisisResult),
}

impl InferenceOutcome {
    /// Whether the safety gate intercepted the prompt.
    pub fn is_crisis(&self) -> bool {
        matches!(self, Self::Crisis(_))
    }

    /// Model text, if this is not a crisis outcome.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Crisis(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_builder_chains() {
        let params = GenerateParams::new()
            .system_prompt("be kind")
            .temperature(0.3)
            .max_tokens(64);
        assert_eq!(params.system_prompt.as_deref(), Some("be kind"));
        assert_eq!(params.temperature, 0.3);
        assert_eq!(params.max_tokens, 64);
    }

    #[test]
    fn params_skip_empty_system_prompt() {
        let json = serde_json::to_value(GenerateParams::default()).unwrap();
        assert!(json.get("system_prompt").is_none());
    }
}
