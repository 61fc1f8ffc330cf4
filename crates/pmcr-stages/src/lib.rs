//! # PMCR Stages
//!
//! The four stage capabilities of a Plan-Make-Check-Reflect cycle, plus
//! in-process rule-based implementations of each.

pub mod checker;
pub mod maker;
pub mod planner;
pub mod reflector;
pub mod stage;
pub mod task;

pub use checker::{CheckerConfig, HeuristicChecker};
pub use maker::TemplateMaker;
pub use planner::{PlannerConfig, RulePlanner};
pub use reflector::RuleReflector;
pub use stage::{CheckStage, MakeStage, PlanStage, ReflectStage, StageSet};
pub use task::{Approach, TaskKind};
