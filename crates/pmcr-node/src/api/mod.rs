//! HTTP API of the node.

pub mod cycle;
pub mod health;
pub mod history;
pub mod stages;
