pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Commission, CommissionDetail, DeferredReceivable, FinancialStatus, Money, Movement,
    MovementKind, Role, Route, RouteStatus, RouteStore, RouteTemplate, TemplateEntry, TimeMs,
};
pub use error::AppError;
pub use orchestration::{RouteManager, SettlementTracker};
