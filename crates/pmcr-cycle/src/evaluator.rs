//! Convergence Evaluator.
//!
//! A pure function from the pass's Validation and Reflection to the next
//! move of the cycle.

use std::fmt;

use pmcr_core::{ConvergencePolicy, Reflection, Validation};

/// What the cycle does after a completed pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Stop with status `Converged`.
    Converged,
    /// Loop back with a refined intent carrying this content, verbatim.
    Iterate(String),
    /// The artifact is invalid and no refinement was offered.
    Stall,
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Converged => "converged",
            Decision::Iterate(_) => "iterate",
            Decision::Stall => "stall",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Decide the next move under `policy`.
///
/// An invalid artifact with no refinement is a [`Decision::Stall`] under
/// every policy.
pub fn evaluate(policy: ConvergencePolicy, validation: &Validation, reflection: &Reflection) -> Decision {
    let refinement = reflection
        .has_refinement()
        .then(|| reflection.optimized_intent.clone());

    match (policy, validation.is_valid, refinement) {
        (_, false, None) => Decision::Stall,
        (_, false, Some(content)) => Decision::Iterate(content),
        (ConvergencePolicy::ValidityFirst, true, _) => Decision::Converged,
        (ConvergencePolicy::ReflectionFirst, true, None) => Decision::Converged,
        (ConvergencePolicy::ReflectionFirst, true, Some(content)) => Decision::Iterate(content),
    }
}
