//! Domain types for the vending-route subsystem.
//!
//! This module provides:
//! - Lossless monetary handling via the Money wrapper
//! - Domain primitives: TimeMs, RouteStatus, FinancialStatus, MovementKind, Role
//! - Movement ledger types with the pure total_post formula
//! - Route, Commission, DeferredReceivable, RouteTemplate records

pub mod commission;
pub mod money;
pub mod movement;
pub mod primitives;
pub mod receivable;
pub mod route;
pub mod template;

pub use commission::{Commission, CommissionDetail};
pub use money::Money;
pub use movement::{compute_total_post, initial_financial_status, Movement, MovementProduct};
pub use primitives::{FinancialStatus, MovementKind, Role, RouteStatus, TimeMs};
pub use receivable::DeferredReceivable;
pub use route::{Route, RouteStore};
pub use template::{RouteTemplate, TemplateEntry};
