//! Crisis safety gate.
//!
//! [`SafetyGate::scan`] runs a case-insensitive match of user-authored text
//! against a curated disjunction of crisis phrases. A match is an absolute
//! override: callers make no model call, write nothing to the cache and
//! render the returned [`CrisisResult`] instead of the requested content.
//!
//! The built-in phrase list is compiled once per process into a single
//! [`regex::Regex`]; configured extra phrases get a second pattern. A scan
//! is linear in the length of the text. Phrases match on word
//! boundaries, tolerate any run of whitespace between words, and accept
//! both straight and typographic apostrophes.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::types::{ContactMethod, CrisisResource, CrisisResult};
use crate::TesseraError;

/// Phrases that indicate self-harm or suicide risk.
const CRISIS_PHRASES: &[&str] = &[
    "suicide",
    "suicidal",
    "kill myself",
    "killing myself",
    "end my life",
    "ending my life",
    "end it all",
    "take my own life",
    "taking my own life",
    "want to die",
    "wanna die",
    "wish i was dead",
    "wish i were dead",
    "better off dead",
    "better off without me",
    "no reason to live",
    "nothing to live for",
    "don't want to live",
    "don't want to be alive",
    "don't want to be here anymore",
    "can't go on",
    "hurt myself",
    "hurting myself",
    "harm myself",
    "self harm",
    "self-harm",
    "cut myself",
    "cutting myself",
    "overdose",
    "not worth living",
];

static BUILT_IN: LazyLock<Regex> = LazyLock::new(|| {
    compile(CRISIS_PHRASES.iter().copied()).expect("built-in crisis phrases compile")
});

const CRISIS_MESSAGE: &str = "It sounds like you're carrying something really heavy right now, \
and you don't have to carry it alone. You deserve support from someone who can talk with you \
right now. Please reach out to one of the people below. They are there to listen, any time.";

/// Curated support resources, in display order.
fn default_resources() -> Vec<CrisisResource> {
    vec![
        CrisisResource {
            name: "988 Suicide & Crisis Lifeline".to_string(),
            contact: ContactMethod::Phone {
                number: "988".to_string(),
                display: "Call or text 988".to_string(),
            },
            url: "https://988lifeline.org".to_string(),
        },
        CrisisResource {
            name: "Crisis Text Line".to_string(),
            contact: ContactMethod::Text {
                number: "741741".to_string(),
                display: "Text HOME to 741741".to_string(),
            },
            url: "https://www.crisistextline.org".to_string(),
        },
        CrisisResource {
            name: "International helplines".to_string(),
            contact: ContactMethod::Phone {
                number: "112".to_string(),
                display: "Outside the US, call your local emergency number".to_string(),
            },
            url: "https://findahelpline.com".to_string(),
        },
    ]
}

/// Synchronous keyword gate over user-authored text.
///
/// Stateless after construction; `scan` is deterministic and has no side
/// effects beyond a log line on match.
#[derive(Debug, Clone)]
pub struct SafetyGate {
    extra: Option<Regex>,
    message: String,
    resources: Vec<CrisisResource>,
}

impl SafetyGate {
    /// Gate with the built-in phrase list and resources.
    pub fn new() -> Self {
        Self {
            extra: None,
            message: CRISIS_MESSAGE.to_string(),
            resources: default_resources(),
        }
    }

    /// Gate with the built-in phrases plus `extra` phrases.
    ///
    /// Extra phrases are matched literally (regex metacharacters escaped).
    pub fn with_extra_phrases<I, S>(extra: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extra: Vec<String> = extra
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if extra.is_empty() {
            return Ok(Self::new());
        }
        let pattern = compile(extra.iter().map(String::as_str))
            .map_err(|e| TesseraError::Configuration(format!("invalid crisis phrase: {e}")))?;
        Ok(Self {
            extra: Some(pattern),
            ..Self::new()
        })
    }

    /// Replace the resources returned with a crisis result.
    pub fn resources(mut self, resources: Vec<CrisisResource>) -> Self {
        self.resources = resources;
        self
    }

    /// Scan text; `Some` means the caller must stop and surface the result.
    pub fn scan(&self, text: &str) -> Option<CrisisResult> {
        if !self.is_crisis(text) {
            return None;
        }
        warn!(text_len = text.len(), "crisis language detected; bypassing model");
        Some(CrisisResult {
            is_crisis: true,
            message: self.message.clone(),
            resources: self.resources.clone(),
        })
    }

    /// Match without building a result.
    pub fn is_crisis(&self, text: &str) -> bool {
        BUILT_IN.is_match(text) || self.extra.as_ref().is_some_and(|p| p.is_match(text))
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Word-bounded, case-insensitive alternation of `phrases`.
fn compile<'a>(phrases: impl Iterator<Item = &'a str>) -> Result<Regex, regex::Error> {
    let alternation = phrases.map(phrase_pattern).collect::<Vec<_>>().join("|");
    RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
        .case_insensitive(true)
        .build()
}

/// Escape a phrase and relax its whitespace and apostrophes.
fn phrase_pattern(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(|word| regex::escape(word).replace('\'', "['’]?"))
        .collect::<Vec<_>>()
        .join(r"\s+")
}
