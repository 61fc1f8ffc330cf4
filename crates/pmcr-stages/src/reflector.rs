//! Rule-based Reflect stage.
//!
//! Only the validation is visible here, so every directive in the refined
//! intent is derived from the issue text alone.

use async_trait::async_trait;
use pmcr_core::protocol::{ReflectReply, ReflectRequest};
use pmcr_core::StageError;
use tracing::debug;

use crate::checker::{EXPONENTIAL_COMPLEXITY, PLACEHOLDER_LEFT};
use crate::stage::ReflectStage;

/// Turns validation issues into an optimized intent.
#[derive(Debug, Clone, Default)]
pub struct RuleReflector;

impl RuleReflector {
    pub fn new() -> Self {
        Self
    }

    /// Directives addressing each issue, deduplicated and in order.
    pub fn directives(issues: &[String]) -> Vec<String> {
        let subject = issues.iter().find_map(|i| backticked(i));
        let mut directives: Vec<String> = Vec::new();

        for issue in issues {
            let directive = if issue == EXPONENTIAL_COMPLEXITY || issue.starts_with("Recursive function") {
                match subject {
                    Some(name) => format!(
                        "Implement `{}` using an iterative approach with a loop instead of recursion",
                        name
                    ),
                    None => "Use an iterative approach with a loop instead of recursion".to_string(),
                }
            } else if issue == PLACEHOLDER_LEFT {
                "Replace every placeholder with a complete implementation".to_string()
            } else {
                format!("Resolve: {}", issue.trim())
            };

            if !directives.contains(&directive) {
                directives.push(directive);
            }
        }
        directives
    }
}

/// First `name` quoted with backticks.
fn backticked(text: &str) -> Option<&str> {
    let start = text.find('`')? + 1;
    let len = text[start..].find('`')?;
    let name = &text[start..start + len];
    (!name.is_empty()).then_some(name)
}

#[async_trait]
impl ReflectStage for RuleReflector {
    async fn invoke(&self, request: ReflectRequest) -> Result<ReflectReply, StageError> {
        if request.is_valid {
            return Ok(ReflectReply {
                insight: format!(
                    "Artifact passed validation with confidence {:.1}; no refinement needed",
                    request.confidence_score
                ),
                optimized_intent: String::new(),
            });
        }

        let directives = Self::directives(&request.issues);
        debug!(issues = request.issues.len(), directives = directives.len(), "Reflected on validation");

        Ok(ReflectReply {
            insight: format!(
                "Validation failed with confidence {:.1}: {}",
                request.confidence_score,
                request.issues.join("; ")
            ),
            optimized_intent: directives.join(". "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(is_valid: bool, issues: &[&str], confidence_score: f64) -> ReflectRequest {
        ReflectRequest {
            is_valid,
            issues: issues.iter().map(|s| s.to_string()).collect(),
            confidence_score,
        }
    }

    #[tokio::test]
    async fn test_valid_needs_no_refinement() {
        let reply = RuleReflector::new().invoke(request(true, &[], 92.0)).await.unwrap();
        assert!(reply.optimized_intent.is_empty());
        assert!(reply.insight.contains("92.0"));
    }

    #[tokio::test]
    async fn test_recursion_becomes_iterative_directive() {
        let reply = RuleReflector::new()
            .invoke(request(
                false,
                &[
                    "Exponential complexity",
                    "Recursive function `fibonacci` recomputes overlapping subproblems",
                ],
                32.0,
            ))
            .await
            .unwrap();

        assert_eq!(
            reply.optimized_intent,
            "Implement `fibonacci` using an iterative approach with a loop instead of recursion"
        );
        assert!(reply.insight.contains("Exponential complexity"));
    }

    #[tokio::test]
    async fn test_other_issues_are_carried() {
        let reply = RuleReflector::new()
            .invoke(request(false, &[PLACEHOLDER_LEFT, "Missing docstring"], 40.0))
            .await
            .unwrap();

        assert_eq!(
            reply.optimized_intent,
            "Replace every placeholder with a complete implementation. Resolve: Missing docstring"
        );
    }

    #[test]
    fn test_backticked() {
        assert_eq!(backticked("a `b` c"), Some("b"));
        assert_eq!(backticked("none"), None);
        assert_eq!(backticked("``"), None);
    }
}
