//! Keyword classification shared by the rule-based stages.

use serde::{Deserialize, Serialize};

/// Resource key naming the recognised task.
pub const RESOURCE_TASK: &str = "task";

/// Resource key naming the requested approach.
pub const RESOURCE_APPROACH: &str = "approach";

/// Resource/context key naming the output language.
pub const RESOURCE_LANGUAGE: &str = "language";

/// Tasks the template maker has dedicated templates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Fibonacci,
    Factorial,
    General,
}

impl TaskKind {
    /// Classify free text.
    pub fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("fibonacci") {
            TaskKind::Fibonacci
        } else if lower.contains("factorial") {
            TaskKind::Factorial
        } else {
            TaskKind::General
        }
    }

    /// Parse the value stored under [`RESOURCE_TASK`].
    pub fn from_resource(value: &str) -> Option<Self> {
        match value {
            "fibonacci" => Some(TaskKind::Fibonacci),
            "factorial" => Some(TaskKind::Factorial),
            "general" => Some(TaskKind::General),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Fibonacci => "fibonacci",
            TaskKind::Factorial => "factorial",
            TaskKind::General => "general",
        }
    }

    /// Name of the function a code template defines for this task.
    pub fn function_name(&self) -> &'static str {
        match self {
            TaskKind::Fibonacci => "fibonacci",
            TaskKind::Factorial => "factorial",
            TaskKind::General => "solve",
        }
    }
}

/// How a solution is structured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Approach {
    Recursive,
    Iterative,
}

impl Approach {
    /// Find an explicit approach request in free text.
    pub fn detect(text: &str) -> Option<Self> {
        let lower = text.to_lowercase();
        if lower.contains("iterative") || lower.contains("loop") {
            Some(Approach::Iterative)
        } else if lower.contains("recursive") || lower.contains("recursion") {
            Some(Approach::Recursive)
        } else {
            None
        }
    }

    pub fn from_resource(value: &str) -> Option<Self> {
        match value {
            "iterative" => Some(Approach::Iterative),
            "recursive" => Some(Approach::Recursive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Approach::Recursive => "recursive",
            Approach::Iterative => "iterative",
        }
    }
}

/// Languages the rule-based stages understand.
pub const KNOWN_LANGUAGES: [&str; 3] = ["python", "rust", "javascript"];

/// Find a language named in free text.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.contains(&"python") {
        Some("python")
    } else if words.contains(&"rust") {
        Some("rust")
    } else if words.contains(&"javascript") || words.contains(&"js") {
        Some("javascript")
    } else {
        None
    }
}

/// Normalise a language/type label.
pub fn normalize_language(label: &str) -> String {
    match label.trim().to_lowercase().as_str() {
        "py" | "python3" => "python".to_string(),
        "rs" => "rust".to_string(),
        "js" | "node" => "javascript".to_string(),
        other => other.to_string(),
    }
}
