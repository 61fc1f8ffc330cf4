//! Template-based Make stage.
//!
//! Emits source for the tasks it recognises in the language requested by the
//! orchestrator. Without an explicit approach in the plan it emits the most
//! direct (recursive) formulation.

use async_trait::async_trait;
use pmcr_core::protocol::{MakeReply, MakeRequest};
use pmcr_core::{StageError, StageKind};
use tracing::debug;
use uuid::Uuid;

use crate::stage::MakeStage;
use crate::task::{normalize_language, Approach, TaskKind, RESOURCE_APPROACH, RESOURCE_TASK};

/// Renders artifacts from built-in templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateMaker;

impl TemplateMaker {
    pub fn new() -> Self {
        Self
    }

    fn resolve_task(request: &MakeRequest) -> TaskKind {
        request
            .resources
            .get(RESOURCE_TASK)
            .and_then(|v| TaskKind::from_resource(v))
            .unwrap_or_else(|| TaskKind::detect(&request.steps.join("\n")))
    }

    fn resolve_approach(request: &MakeRequest) -> Approach {
        request
            .resources
            .get(RESOURCE_APPROACH)
            .and_then(|v| Approach::from_resource(v))
            .or_else(|| Approach::detect(&request.steps.join("\n")))
            .unwrap_or(Approach::Recursive)
    }
}

#[async_trait]
impl MakeStage for TemplateMaker {
    async fn invoke(&self, request: MakeRequest) -> Result<MakeReply, StageError> {
        let artifact_id = Uuid::new_v4().to_string();
        let language = normalize_language(&request.artifact_type);

        if request.steps.iter().all(|s| s.trim().is_empty()) {
            return Ok(MakeReply::failed(artifact_id, language, "plan has no steps"));
        }

        let task = Self::resolve_task(&request);
        let approach = Self::resolve_approach(&request);

        let content = match render(task, approach, &language, &request.steps) {
            Some(content) => content,
            None => {
                return Err(StageError::permanent(
                    StageKind::Make,
                    format!("no template for artifact type '{}'", request.artifact_type),
                ))
            }
        };

        debug!(
            plan_id = %request.plan_id,
            task = task.as_str(),
            approach = approach.as_str(),
            language = %language,
            "Rendered artifact"
        );

        Ok(MakeReply::succeeded(artifact_id, content, language))
    }
}

fn render(task: TaskKind, approach: Approach, language: &str, steps: &[String]) -> Option<String> {
    let body = match (language, task, approach) {
        ("python", TaskKind::Fibonacci, Approach::Recursive) => PY_FIB_RECURSIVE.to_string(),
        ("python", TaskKind::Fibonacci, Approach::Iterative) => PY_FIB_ITERATIVE.to_string(),
        ("python", TaskKind::Factorial, Approach::Recursive) => PY_FACT_RECURSIVE.to_string(),
        ("python", TaskKind::Factorial, Approach::Iterative) => PY_FACT_ITERATIVE.to_string(),
        ("rust", TaskKind::Fibonacci, Approach::Recursive) => RS_FIB_RECURSIVE.to_string(),
        ("rust", TaskKind::Fibonacci, Approach::Iterative) => RS_FIB_ITERATIVE.to_string(),
        ("rust", TaskKind::Factorial, Approach::Recursive) => RS_FACT_RECURSIVE.to_string(),
        ("rust", TaskKind::Factorial, Approach::Iterative) => RS_FACT_ITERATIVE.to_string(),
        ("javascript", TaskKind::Fibonacci, Approach::Recursive) => JS_FIB_RECURSIVE.to_string(),
        ("javascript", TaskKind::Fibonacci, Approach::Iterative) => JS_FIB_ITERATIVE.to_string(),
        ("javascript", TaskKind::Factorial, Approach::Recursive) => JS_FACT_RECURSIVE.to_string(),
        ("javascript", TaskKind::Factorial, Approach::Iterative) => JS_FACT_ITERATIVE.to_string(),
        ("python", TaskKind::General, _) => general_python(steps, approach),
        ("rust", TaskKind::General, _) => general_rust(steps, approach),
        ("javascript", TaskKind::General, _) => general_javascript(steps, approach),
        ("text" | "markdown", _, _) => outline(steps),
        _ => return None,
    };
    Some(body)
}

fn outline(steps: &[String]) -> String {
    let mut out = String::from("# Plan outline\n\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out
}

fn general_python(steps: &[String], approach: Approach) -> String {
    let mut out = String::from("def solve(data):\n");
    for step in steps {
        out.push_str(&format!("    # {}\n", step));
    }
    match approach {
        Approach::Iterative => out.push_str(
            "    result = []\n    for item in data:\n        result.append(item)\n    return result\n",
        ),
        Approach::Recursive => out.push_str("    result = data\n    return result\n"),
    }
    out
}

fn general_rust(steps: &[String], approach: Approach) -> String {
    let mut out = match approach {
        Approach::Iterative => String::from("pub fn solve<T: Clone>(data: &[T]) -> Vec<T> {\n"),
        Approach::Recursive => String::from("pub fn solve<T>(data: T) -> T {\n"),
    };
    for step in steps {
        out.push_str(&format!("    // {}\n", step));
    }
    match approach {
        Approach::Iterative => out.push_str(
            "    let mut result = Vec::with_capacity(data.len());\n    for item in data {\n        result.push(item.clone());\n    }\n    result\n}\n",
        ),
        Approach::Recursive => out.push_str("    data\n}\n"),
    }
    out
}

fn general_javascript(steps: &[String], approach: Approach) -> String {
    let mut out = String::from("function solve(data) {\n");
    for step in steps {
        out.push_str(&format!("  // {}\n", step));
    }
    match approach {
        Approach::Iterative => out.push_str(
            "  const result = [];\n  for (const item of data) {\n    result.push(item);\n  }\n  return result;\n}\n",
        ),
        Approach::Recursive => out.push_str("  return data;\n}\n"),
    }
    out
}

const PY_FIB_RECURSIVE: &str = "\
def fibonacci(n):
    if n < 2:
        return n
    return fibonacci(n - 1) + fibonacci(n - 2)
";

const PY_FIB_ITERATIVE: &str = "\
def fibonacci(n):
    a, b = 0, 1
    for _ in range(n):
        a, b = b, a + b
    return a
";

const PY_FACT_RECURSIVE: &str = "\
def factorial(n):
    if n <= 1:
        return 1
    return n * factorial(n - 1)
";

const PY_FACT_ITERATIVE: &str = "\
def factorial(n):
    result = 1
    for i in range(2, n + 1):
        result *= i
    return result
";

const RS_FIB_RECURSIVE: &str = "\
pub fn fibonacci(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    fibonacci(n - 1) + fibonacci(n - 2)
}
";

const RS_FIB_ITERATIVE: &str = "\
pub fn fibonacci(n: u64) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        let next = a + b;
        a = b;
        b = next;
    }
    a
}
";

const RS_FACT_RECURSIVE: &str = "\
pub fn factorial(n: u64) -> u64 {
    if n <= 1 {
        return 1;
    }
    n * factorial(n - 1)
}
";

const RS_FACT_ITERATIVE: &str = "\
pub fn factorial(n: u64) -> u64 {
    let mut result = 1;
    for i in 2..=n {
        result *= i;
    }
    result
}
";

const JS_FIB_RECURSIVE: &str = "\
function fibonacci(n) {
  if (n < 2) return n;
  return fibonacci(n - 1) + fibonacci(n - 2);
}
";

const JS_FIB_ITERATIVE: &str = "\
function fibonacci(n) {
  let a = 0, b = 1;
  for (let i = 0; i < n; i++) {
    [a, b] = [b, a + b];
  }
  return a;
}
";

const JS_FACT_RECURSIVE: &str = "\
function factorial(n) {
  if (n <= 1) return 1;
  return n * factorial(n - 1);
}
";

const JS_FACT_ITERATIVE: &str = "\
function factorial(n) {
  let result = 1;
  for (let i = 2; i <= n; i++) {
    result *= i;
  }
  return result;
}
";
