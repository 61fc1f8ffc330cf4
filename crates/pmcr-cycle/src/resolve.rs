//! Artifact type resolution.

use pmcr_core::{Intent, Plan};

/// Context/resource key that names the artifact type.
pub const LANGUAGE_KEY: &str = "language";

/// Pick the artifact type to request from Make.
///
/// Priority: the intent's `language` context entry, then the plan's
/// `language` resource, then `default`. Blank values are skipped.
pub fn resolve_artifact_type(intent: &Intent, plan: &Plan, default: &str) -> String {
    intent
        .context_value(LANGUAGE_KEY)
        .filter(|v| !v.trim().is_empty())
        .or_else(|| plan.resource(LANGUAGE_KEY).filter(|v| !v.trim().is_empty()))
        .unwrap_or(default)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(language: Option<&str>) -> Intent {
        let builder = Intent::builder().id("i-1").content("do something");
        match language {
            Some(language) => builder.language(language).build().unwrap(),
            None => builder.build().unwrap(),
        }
    }

    #[test]
    fn test_intent_context_wins() {
        let plan = Plan::new("p-1", "i-1", vec!["step".into()]).with_resource(LANGUAGE_KEY, "rust");
        assert_eq!(resolve_artifact_type(&intent(Some("python")), &plan, "text"), "python");
    }

    #[test]
    fn test_plan_resource_next() {
        let plan = Plan::new("p-1", "i-1", vec!["step".into()]).with_resource(LANGUAGE_KEY, "rust");
        assert_eq!(resolve_artifact_type(&intent(None), &plan, "text"), "rust");
    }

    #[test]
    fn test_default_last() {
        let plan = Plan::new("p-1", "i-1", vec!["step".into()]).with_resource(LANGUAGE_KEY, "  ");
        assert_eq!(resolve_artifact_type(&intent(Some("")), &plan, "text"), "text");
    }

    #[test]
    fn test_deterministic() {
        let plan = Plan::new("p-1", "i-1", vec!["step".into()]);
        let intent = intent(Some("javascript"));
        let first = resolve_artifact_type(&intent, &plan, "text");
        assert_eq!(first, resolve_artifact_type(&intent, &plan, "text"));
    }
}
