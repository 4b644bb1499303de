//! Workflow orchestration over the repository layer.
//!
//! The pure calculators live in `engine`; this module sequences their
//! inputs and outputs against the database and enforces the lifecycle
//! rules (one-way transitions, idempotent triggers, conflict checks).

pub mod commission;
pub mod route_manager;
pub mod settlement;

pub use commission::calculate_store_commission;
pub use route_manager::{CompletionSummary, RouteManager};
pub use settlement::SettlementTracker;
