//! Hierarchical fallback responses.
//!
//! When the model is unavailable, slow, or fails, every feature still
//! answers from a static [`FallbackTable`]. Tables are nested
//! `state -> sub_emotion -> value_category -> response`, and each level may
//! carry a `default` used when a more specific key is absent.
//!
//! # Resolution ladder
//!
//! [`resolve`] walks from most to least specific and returns the first hit:
//!
//! ```text
//! state + sub_emotion + category
//! state + sub_emotion + default
//! state + default
//! table default
//! caller default
//! ```
//!
//! A missing level stops the descent at that level; it does not skip to a
//! sibling. For example `drained / unknownX / Career` resolves to the
//! `drained` default, never to the table default, as long as `drained`
//! carries one.
//!
//! Keys are matched case-insensitively, with surrounding whitespace ignored.

pub mod content;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::types::ReflectionInput;

/// Responses for one sub-emotion, optionally refined by value category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubEmotionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, String>,
}

impl SubEmotionEntry {
    /// Set the sub-emotion default.
    pub fn default_response(mut self, response: impl Into<String>) -> Self {
        self.default = Some(response.into());
        self
    }

    /// Add a category-specific response.
    pub fn category(mut self, category: &str, response: impl Into<String>) -> Self {
        self.categories.insert(normalize(category), response.into());
        self
    }
}

/// Responses for one emotional state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_emotions: BTreeMap<String, SubEmotionEntry>,
}

impl StateEntry {
    /// Set the state default.
    pub fn default_response(mut self, response: impl Into<String>) -> Self {
        self.default = Some(response.into());
        self
    }

    /// Add a sub-emotion branch.
    pub fn sub_emotion(
        mut self,
        sub_emotion: &str,
        build: impl FnOnce(SubEmotionEntry) -> SubEmotionEntry,
    ) -> Self {
        self.sub_emotions
            .insert(normalize(sub_emotion), build(SubEmotionEntry::default()));
        self
    }
}

/// Static, read-only mapping used when no model output is available.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FallbackTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub states: BTreeMap<String, StateEntry>,
}

/// Lookup context for [`resolve`]. Every field is optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FallbackContext<'a> {
    pub emotional_state: Option<&'a str>,
    pub sub_emotion: Option<&'a str>,
    pub value_category: Option<&'a str>,
}

impl<'a> FallbackContext<'a> {
    pub fn new(
        emotional_state: Option<&'a str>,
        sub_emotion: Option<&'a str>,
        value_category: Option<&'a str>,
    ) -> Self {
        Self {
            emotional_state,
            sub_emotion,
            value_category,
        }
    }
}

impl<'a> From<&'a ReflectionInput> for FallbackContext<'a> {
    fn from(input: &'a ReflectionInput) -> Self {
        Self {
            emotional_state: input.emotional_state.as_deref(),
            sub_emotion: input.sub_emotion.as_deref(),
            value_category: input.value_category.as_deref(),
        }
    }
}

impl FallbackTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the table-level default.
    pub fn default_response(mut self, response: impl Into<String>) -> Self {
        self.default = Some(response.into());
        self
    }

    /// Add a state branch.
    pub fn state(mut self, state: &str, build: impl FnOnce(StateEntry) -> StateEntry) -> Self {
        self.states
            .insert(normalize(state), build(StateEntry::default()));
        self
    }

    /// Parse a table from JSON, normalising every key.
    pub fn from_json(json: &str) -> Result<Self> {
        let table: FallbackTable = serde_json::from_str(json)?;
        Ok(table.normalized())
    }

    /// Lower-case and trim every key so lookups are case-insensitive.
    ///
    /// Tables built through the builder methods are already normalised;
    /// this is for tables deserialised from external content.
    pub fn normalized(self) -> Self {
        let states = self
            .states
            .into_iter()
            .map(|(state, entry)| {
                let sub_emotions = entry
                    .sub_emotions
                    .into_iter()
                    .map(|(sub, sub_entry)| {
                        let categories = sub_entry
                            .categories
                            .into_iter()
                            .map(|(c, r)| (normalize(&c), r))
                            .collect();
                        (
                            normalize(&sub),
                            SubEmotionEntry {
                                default: sub_entry.default,
                                categories,
                            },
                        )
                    })
                    .collect();
                (
                    normalize(&state),
                    StateEntry {
                        default: entry.default,
                        sub_emotions,
                    },
                )
            })
            .collect();
        Self {
            default: self.default,
            states,
        }
    }

    /// Most specific response for `context`, or `None` if even the table
    /// default is absent.
    pub fn lookup(&self, context: &FallbackContext<'_>) -> Option<&str> {
        self.lookup_state(context)
            .or(self.default.as_deref())
    }

    fn lookup_state(&self, context: &FallbackContext<'_>) -> Option<&str> {
        let state = self.states.get(&normalize(context.emotional_state?))?;
        let from_sub = context
            .sub_emotion
            .and_then(|sub| state.sub_emotions.get(&normalize(sub)))
            .and_then(|sub| {
                context
                    .value_category
                    .and_then(|c| sub.categories.get(&normalize(c)))
                    .map(String::as_str)
                    .or(sub.default.as_deref())
            });
        from_sub.or(state.default.as_deref())
    }
}

/// Resolve a response, falling back to `default` when the table has nothing.
///
/// Always produces a response, even with an empty context.
pub fn resolve(table: &FallbackTable, context: &FallbackContext<'_>, default: &str) -> String {
    table.lookup(context).unwrap_or(default).to_string()
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}
