//! Deferred settlement: receiving held cash and filling in the payment
//! channels of bag-collected movements.

use crate::db::Repository;
use crate::domain::{DeferredReceivable, FinancialStatus, Money, Movement, TimeMs};
use crate::error::AppError;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct SettlementTracker {
    repo: Arc<Repository>,
}

impl SettlementTracker {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Settle a pending receivable. The transition is one-way; a second
    /// receive attempt conflicts.
    pub async fn receive(
        &self,
        receivable_id: i64,
        now: TimeMs,
    ) -> Result<DeferredReceivable, AppError> {
        let receivable = self
            .repo
            .get_receivable(receivable_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("receivable {} not found", receivable_id))
            })?;

        if receivable.received {
            return Err(AppError::Conflict(format!(
                "receivable {} was already received",
                receivable_id
            )));
        }

        // guarded update; a concurrent receive loses the race here
        let flipped = self.repo.mark_receivable_received(receivable_id, now).await?;
        if !flipped {
            return Err(AppError::Conflict(format!(
                "receivable {} was already received",
                receivable_id
            )));
        }

        info!(receivable_id, "Deferred receivable settled");
        self.repo
            .get_receivable(receivable_id)
            .await?
            .ok_or_else(|| AppError::Internal("receivable vanished after update".to_string()))
    }

    /// Fill the counted payment channels of a financially pending movement
    /// and mark it completed. Completed movements conflict.
    pub async fn fill_financials(
        &self,
        movement_id: i64,
        tokens: Money,
        bills: Money,
        card: Money,
    ) -> Result<Movement, AppError> {
        let movement = self
            .repo
            .get_movement(movement_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("movement {} not found", movement_id)))?;

        if movement.financial_status == FinancialStatus::Completed {
            return Err(AppError::Conflict(format!(
                "movement {} is already financially completed",
                movement_id
            )));
        }

        let filled = self
            .repo
            .fill_movement_financials(movement_id, tokens, bills, card)
            .await?;
        if !filled {
            return Err(AppError::Conflict(format!(
                "movement {} is already financially completed",
                movement_id
            )));
        }

        info!(movement_id, "Movement financials filled");
        self.repo
            .get_movement(movement_id)
            .await?
            .ok_or_else(|| AppError::Internal("movement vanished after update".to_string()))
    }
}
