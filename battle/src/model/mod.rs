//! Battle data model: typed value objects and the aggregate state.

mod types;

pub use types::{
    BattleMetrics, BattleState, BattleStatus, Finding, Patch, RoundResult, Severity,
};
