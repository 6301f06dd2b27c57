//! Immutable solve results. A result is produced once per solve and
//! composed by the caller; nothing here is mutated after return.

use crate::constraints::ConstraintKind;
use crate::solver::HighsModelStatus;
use crate::system::EntityId;
use crate::variables::QuantityKind;
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;

/// Outcome of one backend solve. Variants are data, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    TimeLimit,
    NumericalError,
    NotSolved,
}

impl From<HighsModelStatus> for SolveStatus {
    fn from(status: HighsModelStatus) -> Self {
        match status {
            HighsModelStatus::Optimal => Self::Optimal,
            HighsModelStatus::Infeasible
            | HighsModelStatus::UnboundedOrInfeasible => Self::Infeasible,
            HighsModelStatus::Unbounded => Self::Unbounded,
            HighsModelStatus::ReachedTimeLimit => Self::TimeLimit,
            HighsModelStatus::NotSet | HighsModelStatus::ModelEmpty => {
                Self::NotSolved
            }
            _ => Self::NumericalError,
        }
    }
}

/// Primal values keyed by (quantity, entity, period). `None` marks a
/// value the backend could not produce, which is different from a
/// computed zero.
#[derive(Debug, Default, Clone)]
pub struct PrimalTable(
    IndexMap<(QuantityKind, EntityId, usize), Option<f64>>,
);

impl PrimalTable {
    pub fn insert(
        &mut self,
        kind: QuantityKind,
        entity: EntityId,
        period: usize,
        value: Option<f64>,
    ) {
        self.0.insert((kind, entity, period), value);
    }

    /// The stored value; outer `None` means the key was never extracted,
    /// inner `None` an extraction that failed.
    pub fn get(
        &self,
        kind: QuantityKind,
        entity: &EntityId,
        period: usize,
    ) -> Option<Option<f64>> {
        self.0.get(&(kind, entity.clone(), period)).copied()
    }

    pub fn value(
        &self,
        kind: QuantityKind,
        entity: &EntityId,
        period: usize,
    ) -> Option<f64> {
        self.get(kind, entity, period).flatten()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<
        Item = (&(QuantityKind, EntityId, usize), &Option<f64>),
    > {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Rescaled duals keyed by (constraint kind, entity, period).
#[derive(Debug, Default, Clone)]
pub struct DualTable(IndexMap<(ConstraintKind, EntityId, usize), f64>);

impl DualTable {
    pub fn insert(
        &mut self,
        kind: ConstraintKind,
        entity: EntityId,
        period: usize,
        value: f64,
    ) {
        self.0.insert((kind, entity, period), value);
    }

    pub fn get(
        &self,
        kind: ConstraintKind,
        entity: &EntityId,
        period: usize,
    ) -> Option<f64> {
        self.0.get(&(kind, entity.clone(), period)).copied()
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&(ConstraintKind, EntityId, usize), &f64)>
    {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Zonal marginal prices per (submarket, period), in native currency.
#[derive(Debug, Default, Clone)]
pub struct PriceTable(IndexMap<(EntityId, usize), f64>);

/// One row of the price table, shaped for serialization by external
/// exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub submarket_id: EntityId,
    pub period: usize,
    pub price: f64,
}

impl PriceTable {
    pub fn insert(&mut self, zone: EntityId, period: usize, price: f64) {
        self.0.insert((zone, period), price);
    }

    pub fn get(&self, zone: &EntityId, period: usize) -> Option<f64> {
        self.0.get(&(zone.clone(), period)).copied()
    }

    pub fn rows(&self) -> Vec<PriceRow> {
        self.0
            .iter()
            .map(|((zone, period), price)| PriceRow {
                submarket_id: zone.clone(),
                period: *period,
                price: *price,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cost components recomputed from primal values and entity cost
/// parameters, independent of the backend's aggregate objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub fuel: f64,
    pub startup: f64,
    pub shutdown: f64,
    pub deficit: f64,
    pub spill: f64,
    pub terminal_water_credit: f64,
}

impl CostBreakdown {
    pub fn total(&self) -> f64 {
        self.fuel
            + self.startup
            + self.shutdown
            + self.deficit
            + self.spill
            - self.terminal_water_credit
    }
}

/// Immutable snapshot of one solve.
#[derive(Debug)]
pub struct SolverResult {
    pub status: SolveStatus,
    /// Objective in native currency (already divided by the cost scale);
    /// absent when no primal point exists.
    pub objective: Option<f64>,
    pub wall_time: Duration,
    pub primal: PrimalTable,
    pub dual: DualTable,
    pub warnings: Vec<String>,
}

/// The two-stage outcome: the commitment stage, and when it succeeded,
/// the pricing stage with its zonal prices.
#[derive(Debug)]
pub struct TwoStageResult {
    pub commitment: SolverResult,
    pub pricing: Option<SolverResult>,
    pub prices: Option<PriceTable>,
    pub breakdown: Option<CostBreakdown>,
    pub warnings: Vec<String>,
}

impl TwoStageResult {
    /// The overall status is the commitment stage's status: a missing
    /// pricing stage degrades to warnings, never to a failure.
    pub fn status(&self) -> SolveStatus {
        self.commitment.status
    }
}
