//! Tests for fallback resolution and the built-in content tables.

use tessera::fallback::{self, FallbackContext, FallbackTable, content};
use tessera::{Feature, ReflectionInput};

fn table() -> FallbackTable {
    FallbackTable::new()
        .default_response("table default")
        .state("drained", |s| {
            s.default_response("drained default").sub_emotion("exhausted", |e| {
                e.default_response("drained exhausted")
                    .category("Career", "drained exhausted career")
            })
        })
}

// =========================================================================
// Resolution ladder
// =========================================================================

#[test]
fn unknown_sub_emotion_resolves_to_state_default() {
    let ctx = FallbackContext::new(Some("drained"), Some("unknownX"), Some("Career"));
    assert_eq!(fallback::resolve(&table(), &ctx, "caller"), "drained default");
}

#[test]
fn unknown_state_resolves_to_table_default() {
    let ctx = FallbackContext::new(Some("elated"), Some("exhausted"), None);
    assert_eq!(fallback::resolve(&table(), &ctx, "caller"), "table default");
}

#[test]
fn empty_context_resolves_to_table_default() {
    assert_eq!(
        fallback::resolve(&table(), &FallbackContext::default(), "caller"),
        "table default"
    );
}

#[test]
fn empty_table_resolves_to_caller_default() {
    let ctx = FallbackContext::new(Some("drained"), None, None);
    assert_eq!(fallback::resolve(&FallbackTable::new(), &ctx, "caller"), "caller");
}

#[test]
fn category_without_sub_emotion_is_ignored() {
    let ctx = FallbackContext::new(Some("drained"), None, Some("career"));
    assert_eq!(fallback::resolve(&table(), &ctx, "caller"), "drained default");
}

#[test]
fn context_from_reflection_input() {
    let input = ReflectionInput::new("text")
        .emotional_state("Drained")
        .sub_emotion("Exhausted")
        .value_category("CAREER");
    let ctx = FallbackContext::from(&input);
    assert_eq!(
        fallback::resolve(&table(), &ctx, "caller"),
        "drained exhausted career"
    );
}

// =========================================================================
// Deserialised tables
// =========================================================================

#[test]
fn table_from_json_follows_ladder() {
    let json = r#"{
        "default": "be gentle",
        "states": {
            "Sad": {
                "default": "sad default",
                "sub_emotions": {
                    "Lonely": { "categories": { "Family": "call someone" } }
                }
            }
        }
    }"#;
    let table = FallbackTable::from_json(json).unwrap();
    let ctx = FallbackContext::new(Some("sad"), Some("lonely"), Some("family"));
    assert_eq!(table.lookup(&ctx), Some("call someone"));

    let ctx = FallbackContext::new(Some("sad"), Some("lonely"), Some("work"));
    assert_eq!(table.lookup(&ctx), Some("sad default"));
}

#[test]
fn invalid_json_is_a_serialization_error() {
    let err = FallbackTable::from_json("{ not json").unwrap_err();
    assert!(matches!(err, tessera::TesseraError::Serialization(_)));
}

// =========================================================================
// Built-in content
// =========================================================================

#[test]
fn every_feature_always_answers() {
    let contexts = [
        FallbackContext::default(),
        FallbackContext::new(Some("drained"), Some("exhausted"), Some("Career")),
        FallbackContext::new(Some("nonexistent"), Some("nope"), Some("nada")),
    ];
    for feature in Feature::ALL {
        for ctx in &contexts {
            let text = fallback::resolve(content::table(feature), ctx, content::GENERIC_FALLBACK);
            assert!(!text.trim().is_empty(), "{feature} gave an empty fallback");
        }
    }
}

#[test]
fn drained_exhausted_analysis_content() {
    let ctx = FallbackContext::new(Some("drained"), Some("exhausted"), None);
    assert_eq!(
        fallback::resolve(
            content::table(Feature::AnalyzeReflection),
            &ctx,
            content::GENERIC_FALLBACK
        ),
        "You sound deeply tired, in body and in spirit. Exhaustion like this is a signal, not a \
         failing. Rest is a need, not something you have to earn."
    );
}

#[test]
fn drained_unknown_sub_analysis_uses_drained_default() {
    let ctx = FallbackContext::new(Some("drained"), Some("unknownX"), Some("Career"));
    let text = content::table(Feature::AnalyzeReflection).lookup(&ctx).unwrap();
    assert!(text.starts_with("It sounds like your energy is running low."));
}
