//! Heuristic Check stage.

use async_trait::async_trait;
use pmcr_core::protocol::{CheckReply, CheckRequest};
use pmcr_core::{StageError, StageKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::stage::CheckStage;
use crate::task::{normalize_language, KNOWN_LANGUAGES};

/// Issue reported for recursion without any loop.
pub const EXPONENTIAL_COMPLEXITY: &str = "Exponential complexity";

/// Issue reported when placeholder markers are left in the artifact.
pub const PLACEHOLDER_LEFT: &str = "Placeholder left in artifact";

const PLACEHOLDER_MARKERS: [&str; 5] = ["TODO", "FIXME", "NotImplementedError", "unimplemented!", "todo!("];

/// Scoring knobs for the checker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Confidence reported for a clean artifact.
    pub pass_confidence: f64,

    /// Confidence lost per issue, starting from `pass_confidence`.
    pub issue_penalty: f64,

    /// Floor for a failing artifact.
    pub min_confidence: f64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            pass_confidence: 92.0,
            issue_penalty: 30.0,
            min_confidence: 10.0,
        }
    }
}

/// Flags placeholders and unbounded recursion in code artifacts.
#[derive(Debug, Clone, Default)]
pub struct HeuristicChecker {
    config: CheckerConfig,
}

impl HeuristicChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CheckerConfig) -> Self {
        Self { config }
    }

    /// Collect issues for `content` of type `artifact_type`.
    pub fn inspect(&self, content: &str, artifact_type: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if PLACEHOLDER_MARKERS.iter().any(|m| content.contains(m)) {
            issues.push(PLACEHOLDER_LEFT.to_string());
        }

        let language = normalize_language(artifact_type);
        if KNOWN_LANGUAGES.contains(&language.as_str()) {
            let recursive = recursive_functions(content, &language);
            if !recursive.is_empty() && !has_loop(content, &language) {
                issues.push(EXPONENTIAL_COMPLEXITY.to_string());
                for name in recursive {
                    issues.push(format!(
                        "Recursive function `{}` recomputes overlapping subproblems",
                        name
                    ));
                }
            }
        }

        issues
    }

    fn confidence(&self, issue_count: usize) -> f64 {
        if issue_count == 0 {
            return self.config.pass_confidence;
        }
        (self.config.pass_confidence - self.config.issue_penalty * issue_count as f64)
            .max(self.config.min_confidence)
    }
}

/// Names of functions whose body calls themselves.
fn recursive_functions(content: &str, language: &str) -> Vec<String> {
    let keyword = match language {
        "python" => "def ",
        "rust" => "fn ",
        _ => "function ",
    };

    let mut names = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = content[search_from..].find(keyword) {
        let start = search_from + offset + keyword.len();
        let name: String = content[start..]
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .collect();
        search_from = start;

        if name.is_empty() {
            continue;
        }

        let call = format!("{}(", name);
        let after_signature = start + name.len();
        if content[after_signature..].contains(&call) {
            names.push(name);
        }
    }
    names
}

fn has_loop(content: &str, language: &str) -> bool {
    let has_for_or_while = content
        .lines()
        .map(str::trim_start)
        .any(|line| line.starts_with("for ") || line.starts_with("while ") || line.starts_with("for("));

    match language {
        "rust" => has_for_or_while || content.lines().any(|l| l.trim_start().starts_with("loop ")),
        _ => has_for_or_while,
    }
}

#[async_trait]
impl CheckStage for HeuristicChecker {
    async fn invoke(&self, request: CheckRequest) -> Result<CheckReply, StageError> {
        if request.content.trim().is_empty() {
            return Err(StageError::permanent(StageKind::Check, "artifact content is empty"));
        }

        let issues = self.inspect(&request.content, &request.artifact_type);
        let confidence_score = self.confidence(issues.len());
        debug!(artifact_id = %request.artifact_id, issues = issues.len(), confidence_score, "Checked artifact");

        Ok(CheckReply {
            is_valid: issues.is_empty(),
            issues,
            confidence_score,
        })
    }
}
