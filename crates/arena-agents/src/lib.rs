//! Reference adapters for the battle orchestrator.
//!
//! Scripted agents and twins replay YAML scenarios deterministically;
//! they are the workhorses for regression runs and resume testing. `CheckoutTwin`
//! verifies against a real checkout by running configured commands.

pub mod agents;
pub mod scenario;
pub mod twin;

pub use agents::{ScriptedAttacker, ScriptedDefender};
pub use scenario::{Scenario, ScriptedFinding, ScriptedPatch};
pub use twin::{CheckoutTwin, ScriptedTwin};
