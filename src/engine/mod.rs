//! Pure computation engines for the ledger-derived financial logic.

pub mod commission;
pub mod stock_delta;

pub use commission::{calculate, CommissionOutcome, MachineTakings};
pub use stock_delta::{infer_units_sold, LedgerEntry};
