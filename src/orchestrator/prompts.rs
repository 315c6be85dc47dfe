//! Prompt templates and sampling parameters per feature.

use crate::types::{Feature, GenerateParams, ReflectionInput};

const SYSTEM_PROMPT: &str = "You are a warm, grounded reflection companion inside a private \
journaling app. Respond in plain language, speak directly to the writer, and never diagnose. \
Keep answers short and specific to what they wrote.";

/// Sampling parameters for a feature.
pub fn params(feature: Feature) -> GenerateParams {
    let (temperature, max_tokens) = match feature {
        Feature::AnalyzeReflection => (0.7, 200),
        Feature::SuggestGoal => (0.6, 120),
        Feature::GenerateEncouragement => (0.8, 100),
        Feature::GenerateMantra => (0.9, 40),
        Feature::GenerateFocusLens => (0.7, 120),
        Feature::CounselingGuidance => (0.5, 300),
    };
    GenerateParams::new()
        .system_prompt(SYSTEM_PROMPT)
        .temperature(temperature)
        .max_tokens(max_tokens)
}

fn instruction(feature: Feature) -> &'static str {
    match feature {
        Feature::AnalyzeReflection => {
            "Reflect back what this entry shows about how the writer is doing, in two or three \
             sentences. Name one pattern gently."
        }
        Feature::SuggestGoal => {
            "Suggest one small, concrete goal the writer could act on, in a single sentence."
        }
        Feature::GenerateEncouragement => {
            "Offer one or two sentences of sincere encouragement grounded in what they wrote."
        }
        Feature::GenerateMantra => {
            "Write a short first-person mantra of at most twelve words. Reply with the mantra only."
        }
        Feature::GenerateFocusLens => {
            "Offer one question or perspective the writer could hold in mind today, in one or two \
             sentences."
        }
        Feature::CounselingGuidance => {
            "Give supportive, practical guidance in a short paragraph. Suggest talking to someone \
             they trust or a professional where it would help."
        }
    }
}

/// Build the user prompt for `feature` from the reflection and its context.
pub fn build(feature: Feature, input: &ReflectionInput) -> String {
    let mut prompt = String::new();
    prompt.push_str(instruction(feature));
    prompt.push_str("\n\n");

    let mut context = Vec::new();
    if let Some(state) = &input.emotional_state {
        match &input.sub_emotion {
            Some(sub) => context.push(format!("Feeling: {state} ({sub})")),
            None => context.push(format!("Feeling: {state}")),
        }
    }
    if let Some(category) = &input.value_category {
        context.push(format!("Area of life: {category}"));
    }
    if let Some(frequency) = &input.frequency {
        context.push(format!("Goal frequency: {frequency}"));
    }
    if !input.active_protocols.is_empty() {
        context.push(format!(
            "Practices in progress: {}",
            input.active_protocols.join(", ")
        ));
    }
    for line in context {
        prompt.push_str(&line);
        prompt.push('\n');
    }

    prompt.push_str("Entry:\n");
    prompt.push_str(input.text.trim());
    prompt
}

/// Tidy raw model output for display.
///
/// Mantras lose surrounding quotes; everything is trimmed.
pub fn clean(feature: Feature, raw: &str) -> String {
    let text = raw.trim();
    match feature {
        Feature::GenerateMantra => text
            .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”'))
            .trim()
            .to_owned(),
        _ => text.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_context_and_text() {
        let input = ReflectionInput::new("  long day at work  ")
            .emotional_state("drained")
            .sub_emotion("exhausted")
            .value_category("Career");
        let prompt = build(Feature::AnalyzeReflection, &input);
        assert!(prompt.contains("Feeling: drained (exhausted)"));
        assert!(prompt.contains("Area of life: Career"));
        assert!(prompt.ends_with("Entry:\nlong day at work"));
    }

    #[test]
    fn mantra_quotes_are_stripped() {
        assert_eq!(
            clean(Feature::GenerateMantra, " \"I am enough.\" "),
            "I am enough."
        );
        assert_eq!(clean(Feature::SuggestGoal, " \"Walk\" "), "\"Walk\"");
    }

    #[test]
    fn every_feature_has_a_system_prompt() {
        for feature in Feature::ALL {
            assert!(params(feature).system_prompt.is_some());
        }
    }
}
