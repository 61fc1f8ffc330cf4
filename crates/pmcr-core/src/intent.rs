//! Intent types and builder.
//!
//! An Intent is the caller's goal statement plus contextual constraints. It is
//! never mutated; refinement derives a new Intent in the same lineage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PmcrError, Result};

/// Separator between the lineage root and the refinement generation in a
/// refined intent's id (`<root>~r<generation>`).
pub const REFINED_MARKER: &str = "~r";

/// A goal statement plus the constraints it must be satisfied under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Unique identifier for this intent.
    pub id: String,

    /// What the caller wants produced.
    pub content: String,

    /// Caller-specified constraints (e.g. `language = python`).
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Id of the caller's original intent. Equal to `id` for originals.
    #[serde(default)]
    pub lineage_id: String,

    /// Intent this one was refined from.
    #[serde(default)]
    pub parent_id: Option<String>,

    /// Number of refinements between the original and this intent.
    #[serde(default)]
    pub generation: u32,

    /// Timestamp when the intent was created.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Builder for creating Intents with a fluent API.
#[derive(Debug, Default)]
pub struct IntentBuilder {
    id: Option<String>,
    content: Option<String>,
    context: BTreeMap<String, String>,
}

impl IntentBuilder {
    /// Create a new IntentBuilder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-chosen id instead of a generated one.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the goal statement.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Add a context entry.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Add every entry of `entries` to the context.
    pub fn contexts<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in entries {
            self.context.insert(k.into(), v.into());
        }
        self
    }

    /// Shorthand for the `language` context hint.
    pub fn language(self, language: impl Into<String>) -> Self {
        self.context("language", language)
    }

    /// Build the Intent.
    ///
    /// Only a missing content is rejected here; an empty one is left for
    /// [`Intent::validate`] so the orchestrator can report it as an input error.
    pub fn build(self) -> Result<Intent> {
        let content = self.content.ok_or_else(|| PmcrError::InputInvalid {
            intent_id: self.id.clone(),
            message: "Intent content is required".to_string(),
        })?;

        let id = self.id.unwrap_or_else(|| Uuid::new_v4().to_string());

        Ok(Intent {
            lineage_id: id.clone(),
            id,
            content,
            context: self.context,
            parent_id: None,
            generation: 0,
            created_at: Utc::now(),
        })
    }
}

impl Intent {
    /// Create a new IntentBuilder.
    pub fn builder() -> IntentBuilder {
        IntentBuilder::new()
    }

    /// Validate the intent before any stage sees it.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PmcrError::input(None, "Intent id cannot be empty"));
        }

        if self.content.trim().is_empty() {
            return Err(PmcrError::input(
                Some(self.id.clone()),
                "Intent content cannot be empty",
            ));
        }

        if self.context.keys().any(|k| k.trim().is_empty()) {
            return Err(PmcrError::input(
                Some(self.id.clone()),
                "Intent context keys cannot be empty",
            ));
        }

        Ok(())
    }

    /// Id of the original intent this one descends from.
    pub fn root_id(&self) -> &str {
        if self.lineage_id.is_empty() {
            &self.id
        } else {
            &self.lineage_id
        }
    }

    /// Derive the intent for the next iteration.
    ///
    /// The new intent keeps the lineage and the context unchanged and replaces
    /// the content with `optimized_content`.
    pub fn refine(&self, optimized_content: impl Into<String>) -> Intent {
        let generation = self.generation + 1;
        let root = self.root_id().to_string();

        Intent {
            id: format!("{}{}{}", root, REFINED_MARKER, generation),
            content: optimized_content.into(),
            context: self.context.clone(),
            lineage_id: root,
            parent_id: Some(self.id.clone()),
            generation,
            created_at: Utc::now(),
        }
    }

    /// Check if this intent was derived by refinement.
    pub fn is_refined(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Look up a context entry.
    pub fn context_value(&self, key: &str) -> Option<&str> {
        self.context.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_builder() {
        let intent = Intent::builder()
            .content("Create a Python function to calculate Fibonacci numbers")
            .language("python")
            .context("style", "pep8")
            .build()
            .unwrap();

        assert_eq!(intent.context.len(), 2);
        assert_eq!(intent.context_value("language"), Some("python"));
        assert_eq!(intent.lineage_id, intent.id);
        assert!(!intent.is_refined());
    }

    #[test]
    fn test_intent_builder_missing_content() {
        let result = Intent::builder().id("i-1").build();
        assert!(matches!(
            result,
            Err(PmcrError::InputInvalid { intent_id: Some(ref id), .. }) if id == "i-1"
        ));
    }

    #[test]
    fn test_empty_content_fails_validation() {
        let intent = Intent::builder().content("   ").build().unwrap();
        assert!(matches!(intent.validate(), Err(PmcrError::InputInvalid { .. })));
    }

    #[test]
    fn test_refine_keeps_lineage_and_context() {
        let original = Intent::builder()
            .id("fib")
            .content("recursive fib")
            .language("python")
            .build()
            .unwrap();

        let first = original.refine("iterative fib");
        let second = first.refine("iterative fib with memo");

        assert_eq!(first.id, "fib~r1");
        assert_eq!(first.parent_id.as_deref(), Some("fib"));
        assert_eq!(first.content, "iterative fib");
        assert_eq!(first.context, original.context);

        assert_eq!(second.id, "fib~r2");
        assert_eq!(second.root_id(), "fib");
        assert_eq!(second.parent_id.as_deref(), Some("fib~r1"));

        // The original is untouched.
        assert_eq!(original.content, "recursive fib");
    }

    #[test]
    fn test_deserialize_minimal_intent() {
        let intent: Intent = serde_json::from_str(r#"{"id":"x","content":"do it"}"#).unwrap();
        assert_eq!(intent.root_id(), "x");
        assert!(intent.context.is_empty());
        assert!(intent.validate().is_ok());
    }
}
