//! Feature-level request and response types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::CrisisResult;
use crate::TesseraError;

/// A consumer-facing AI feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AnalyzeReflection,
    SuggestGoal,
    GenerateEncouragement,
    GenerateMantra,
    GenerateFocusLens,
    CounselingGuidance,
}

impl Feature {
    /// Every feature, in declaration order.
    pub const ALL: [Feature; 6] = [
        Feature::AnalyzeReflection,
        Feature::SuggestGoal,
        Feature::GenerateEncouragement,
        Feature::GenerateMantra,
        Feature::GenerateFocusLens,
        Feature::CounselingGuidance,
    ];

    /// Function name used for metrics, logging and cache key namespacing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AnalyzeReflection => "analyze_reflection",
            Self::SuggestGoal => "suggest_goal",
            Self::GenerateEncouragement => "generate_encouragement",
            Self::GenerateMantra => "generate_mantra",
            Self::GenerateFocusLens => "generate_focus_lens",
            Self::CounselingGuidance => "counseling_guidance",
        }
    }

    /// Payload field this feature's output is stored under in a cache entry.
    pub fn field(&self) -> &'static str {
        match self {
            Self::AnalyzeReflection => "analysis",
            Self::SuggestGoal => "goal",
            Self::GenerateEncouragement => "encouragement",
            Self::GenerateMantra => "mantra",
            Self::GenerateFocusLens => "focus_lens",
            Self::CounselingGuidance => "guidance",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == normalized || f.field() == normalized)
            .ok_or_else(|| TesseraError::InvalidInput(format!("unknown feature: {s}")))
    }
}

/// User-authored text plus the structured context a feature call carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflectionInput {
    /// Reflection or chat text written by the user.
    pub text: String,

    /// Current emotional state (e.g. "drained").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<String>,

    /// Finer-grained feeling within the state (e.g. "exhausted").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_emotion: Option<String>,

    /// Value category the reflection relates to (e.g. "Career").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_category: Option<String>,

    /// Goal frequency (e.g. "daily").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,

    /// Active protocol names; order is not significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub active_protocols: Vec<String>,

    /// Text of the same reflection before the current edit, if any.
    ///
    /// When present, a cached response for the earlier version is dropped
    /// if the edit changed the text substantially.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_text: Option<String>,
}

impl ReflectionInput {
    /// Create an input carrying only text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Set the emotional state.
    pub fn emotional_state(mut self, state: impl Into<String>) -> Self {
        self.emotional_state = Some(state.into());
        self
    }

    /// Set the sub-emotion.
    pub fn sub_emotion(mut self, sub: impl Into<String>) -> Self {
        self.sub_emotion = Some(sub.into());
        self
    }

    /// Set the value category.
    pub fn value_category(mut self, category: impl Into<String>) -> Self {
        self.value_category = Some(category.into());
        self
    }

    /// Set the goal frequency.
    pub fn frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = Some(frequency.into());
        self
    }

    /// Add an active protocol.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.active_protocols.push(protocol.into());
        self
    }

    /// Set the text the reflection had before this edit.
    pub fn previous_text(mut self, text: impl Into<String>) -> Self {
        self.previous_text = Some(text.into());
        self
    }
}

/// Where a feature response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Model,
    Cache,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Cache => "cache",
            Self::Fallback => "fallback",
        }
    }
}

/// Usable text for a feature call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureResponse {
    pub feature: Feature,
    pub text: String,
    pub source: ResponseSource,
}

/// Outcome of a feature call: usable text, or a crisis override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureOutcome {
    Response(FeatureResponse),
    Crisis(CrisisResult),
}

impl FeatureOutcome {
    /// Whether the safety gate intercepted the call.
    pub fn is_crisis(&self) -> bool {
        matches!(self, Self::Crisis(_))
    }

    /// Response text, if this is not a crisis outcome.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Response(r) => Some(&r.text),
            Self::Crisis(_) => None,
        }
    }

    /// Response source, if this is not a crisis outcome.
    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            Self::Response(r) => Some(r.source),
            Self::Crisis(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_parses_name_and_field() {
        assert_eq!(
            "analyze-reflection".parse::<Feature>().unwrap(),
            Feature::AnalyzeReflection
        );
        assert_eq!("mantra".parse::<Feature>().unwrap(), Feature::GenerateMantra);
        assert!("horoscope".parse::<Feature>().is_err());
    }

    #[test]
    fn feature_fields_are_distinct() {
        let mut fields: Vec<_> = Feature::ALL.iter().map(|f| f.field()).collect();
        fields.sort_unstable();
        fields.dedup();
        assert_eq!(fields.len(), Feature::ALL.len());
    }
}
