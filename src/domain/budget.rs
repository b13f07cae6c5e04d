//! Point and currency budgets.

use serde::Serialize;

use crate::domain::error::BudgetExceeded;
use crate::domain::moves::{CandidateMove, MoveCost, MoveKind};

/// Budget usage for one run. `*_used` never exceeds `*_limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetState {
    pub points_used: u32,
    pub points_limit: u32,
    pub currency_used: u32,
    pub currency_limit: u32,
}

impl BudgetState {
    /// Fresh budget: nothing spent yet.
    pub fn new(points_limit: u32, currency_limit: u32) -> Self {
        Self {
            points_used: 0,
            points_limit,
            currency_used: 0,
            currency_limit,
        }
    }

    pub fn points_left(&self) -> u32 {
        self.points_limit.saturating_sub(self.points_used)
    }

    pub fn currency_left(&self) -> u32 {
        self.currency_limit.saturating_sub(self.currency_used)
    }
}

/// Prices moves and approves them against a [`BudgetState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetTracker {
    /// Currency charged for each refunded node
    respec_currency_cost: u32,
}

impl Default for BudgetTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

impl BudgetTracker {
    pub fn new(respec_currency_cost: u32) -> Self {
        Self {
            respec_currency_cost,
        }
    }

    pub fn respec_currency_cost(&self) -> u32 {
        self.respec_currency_cost
    }

    /// Adds spend one point per node; a respec refunds one point, spends
    /// one and pays currency.
    pub fn cost_of(&self, kind: &MoveKind) -> MoveCost {
        match kind {
            MoveKind::Add { nodes } => MoveCost {
                points_spent: nodes.len() as u32,
                points_refunded: 0,
                currency: 0,
            },
            MoveKind::Respec { .. } => MoveCost {
                points_spent: 1,
                points_refunded: 1,
                currency: self.respec_currency_cost,
            },
        }
    }

    pub fn can_afford(&self, mv: &CandidateMove, state: &BudgetState) -> bool {
        self.apply(mv, state).is_ok()
    }

    /// Budget after the move, or the shortfall. Never mutates `state`.
    pub fn apply(
        &self,
        mv: &CandidateMove,
        state: &BudgetState,
    ) -> Result<BudgetState, BudgetExceeded> {
        self.apply_cost(&mv.cost, state)
    }

    pub fn apply_cost(
        &self,
        cost: &MoveCost,
        state: &BudgetState,
    ) -> Result<BudgetState, BudgetExceeded> {
        let points = i64::from(state.points_used) + cost.net_points();
        let currency = u64::from(state.currency_used) + u64::from(cost.currency);

        let points_ok = points >= 0 && points <= i64::from(state.points_limit);
        let currency_ok = currency <= u64::from(state.currency_limit);
        if !points_ok || !currency_ok {
            return Err(BudgetExceeded {
                points_needed: points.clamp(0, i64::from(u32::MAX)) as u32,
                points_limit: state.points_limit,
                currency_needed: currency.min(u64::from(u32::MAX)) as u32,
                currency_limit: state.currency_limit,
            });
        }

        Ok(BudgetState {
            points_used: points as u32,
            currency_used: currency as u32,
            ..*state
        })
    }
}
