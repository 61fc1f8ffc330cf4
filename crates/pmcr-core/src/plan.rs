//! Plan types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered steps and resource hints derived from one Intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: String,

    /// The intent this plan was derived from.
    pub original_intent_id: String,

    /// Steps in execution order.
    pub steps: Vec<String>,

    /// Resource hints for downstream stages.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

impl Plan {
    /// Create a plan for `intent_id`.
    pub fn new(id: impl Into<String>, intent_id: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            id: id.into(),
            original_intent_id: intent_id.into(),
            steps,
            resources: BTreeMap::new(),
        }
    }

    /// Add a resource hint.
    pub fn with_resource(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resources.insert(key.into(), value.into());
        self
    }

    /// Copy caller constraints into the resources.
    ///
    /// Caller entries override stage-supplied hints with the same key.
    pub fn inherit_context(&mut self, context: &BTreeMap<String, String>) {
        for (key, value) in context {
            self.resources.insert(key.clone(), value.clone());
        }
    }

    /// A plan without steps cannot be made.
    pub fn is_actionable(&self) -> bool {
        self.steps.iter().any(|s| !s.trim().is_empty())
    }

    /// Look up a resource hint.
    pub fn resource(&self, key: &str) -> Option<&str> {
        self.resources.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inherit_context_overrides_stage_hints() {
        let mut plan = Plan::new("p1", "i1", vec!["write code".into()])
            .with_resource("language", "rust")
            .with_resource("runtime", "tokio");

        let mut context = BTreeMap::new();
        context.insert("language".to_string(), "python".to_string());
        plan.inherit_context(&context);

        assert_eq!(plan.resource("language"), Some("python"));
        assert_eq!(plan.resource("runtime"), Some("tokio"));
    }

    #[test]
    fn test_actionable() {
        assert!(Plan::new("p", "i", vec!["step".into()]).is_actionable());
        assert!(!Plan::new("p", "i", vec![]).is_actionable());
        assert!(!Plan::new("p", "i", vec!["  ".into()]).is_actionable());
    }
}
