//! Variable allocation: one decision-variable handle per
//! (quantity-kind, entity, period), keyed by entity identity. Handles are
//! created in a single pass over the system and are immutable afterwards;
//! asking for a kind an entity does not declare is a configuration error.

use crate::error::ConfigError;
use crate::solver;
use crate::system::{EntityId, Horizon, System};
use indexmap::IndexMap;
use serde::Serialize;

/// The quantities a decision variable can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum QuantityKind {
    Generation,
    Commitment,
    Startup,
    Shutdown,
    StoredVolume,
    Outflow,
    Spill,
    Curtailment,
    ExchangeDirect,
    ExchangeReverse,
    Deficit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VarRole {
    Continuous,
    Binary,
}

/// Opaque handle to a single decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableHandle {
    pub col: usize,
    pub role: VarRole,
    pub kind: QuantityKind,
    pub entity: EntityId,
    pub period: usize,
}

/// Commitment values frozen from a Stage-1 solution, used to rebuild the
/// pricing stage with every binary pinned to a constant.
#[derive(Debug, Default, Clone)]
pub struct FrozenCommitment {
    values: IndexMap<(EntityId, usize), f64>,
}

impl FrozenCommitment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EntityId, period: usize, value: f64) {
        self.values.insert((id, period), value);
    }

    pub fn get(&self, id: &EntityId, period: usize) -> Option<f64> {
        self.values.get(&(id.clone(), period)).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type Key = (QuantityKind, EntityId, usize);

/// The identity-keyed handle table for one model build.
#[derive(Debug)]
pub struct VariableAllocator {
    handles: IndexMap<Key, VariableHandle>,
}

impl VariableAllocator {
    /// Creates every required column in the problem and the handle for
    /// it. When `frozen` is given, commitment variables are created as
    /// fixed continuous columns instead of binaries, which is what turns
    /// the Stage-2 rebuild into a pure LP.
    pub fn allocate(
        problem: &mut solver::Problem,
        system: &System,
        horizon: &Horizon,
        frozen: Option<&FrozenCommitment>,
        allow_deficit: bool,
    ) -> Result<Self, ConfigError> {
        let mut handles: IndexMap<Key, VariableHandle> = IndexMap::new();
        let mut declare = |handles: &mut IndexMap<Key, VariableHandle>,
                           kind: QuantityKind,
                           entity: &EntityId,
                           period: usize,
                           role: VarRole,
                           col: usize| {
            let handle = VariableHandle {
                col,
                role,
                kind,
                entity: entity.clone(),
                period,
            };
            let previous =
                handles.insert((kind, entity.clone(), period), handle);
            debug_assert!(
                previous.is_none(),
                "duplicate handle for {:?} {} {}",
                kind,
                entity,
                period
            );
        };

        for submarket in system.submarkets.iter() {
            if submarket.demand.len() != horizon.num_periods {
                return Err(ConfigError::DemandLengthMismatch {
                    id: submarket.id.to_string(),
                    got: submarket.demand.len(),
                    expected: horizon.num_periods,
                });
            }
            if !allow_deficit {
                continue;
            }
            for t in horizon.periods() {
                let col = problem.add_column(0.0, 0.0..submarket.demand[t]);
                declare(
                    &mut handles,
                    QuantityKind::Deficit,
                    &submarket.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
            }
        }

        for line in system.interconnections.iter() {
            for t in horizon.periods() {
                let col = problem.add_column(0.0, 0.0..line.direct_capacity);
                declare(
                    &mut handles,
                    QuantityKind::ExchangeDirect,
                    &line.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let col = problem.add_column(0.0, 0.0..line.reverse_capacity);
                declare(
                    &mut handles,
                    QuantityKind::ExchangeReverse,
                    &line.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
            }
        }

        for thermal in system.thermals.iter() {
            for t in horizon.periods() {
                let col =
                    problem.add_column(0.0, 0.0..thermal.max_generation);
                declare(
                    &mut handles,
                    QuantityKind::Generation,
                    &thermal.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let (col, role) = match frozen {
                    Some(map) => {
                        let value =
                            map.get(&thermal.id, t).ok_or_else(|| {
                                ConfigError::MissingFrozenCommitment {
                                    entity: thermal.id.to_string(),
                                    period: t,
                                }
                            })?;
                        let col = problem.add_column(0.0, value..=value);
                        (col, VarRole::Continuous)
                    }
                    None => {
                        let col =
                            problem.add_integer_column(0.0, 0.0..=1.0);
                        (col, VarRole::Binary)
                    }
                };
                declare(
                    &mut handles,
                    QuantityKind::Commitment,
                    &thermal.id,
                    t,
                    role,
                    col,
                );
                let col = problem.add_column(0.0, 0.0..=1.0);
                declare(
                    &mut handles,
                    QuantityKind::Startup,
                    &thermal.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let col = problem.add_column(0.0, 0.0..=1.0);
                declare(
                    &mut handles,
                    QuantityKind::Shutdown,
                    &thermal.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
            }
        }

        for hydro in system.hydros.iter() {
            for t in horizon.periods() {
                let col = problem
                    .add_column(0.0, hydro.min_storage..hydro.max_storage);
                declare(
                    &mut handles,
                    QuantityKind::StoredVolume,
                    &hydro.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let col = problem
                    .add_column(0.0, hydro.min_outflow..hydro.max_outflow);
                declare(
                    &mut handles,
                    QuantityKind::Outflow,
                    &hydro.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let col = problem.add_column(0.0, 0.0..);
                declare(
                    &mut handles,
                    QuantityKind::Spill,
                    &hydro.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                let col = problem.add_column(0.0, 0.0..);
                declare(
                    &mut handles,
                    QuantityKind::Generation,
                    &hydro.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
            }
        }

        for renewable in system.renewables.iter() {
            if renewable.availability.len() != horizon.num_periods {
                return Err(ConfigError::ProfileLengthMismatch {
                    id: renewable.id.to_string(),
                    got: renewable.availability.len(),
                    expected: horizon.num_periods,
                });
            }
            for t in horizon.periods() {
                let avail = renewable.availability[t];
                let col = problem.add_column(0.0, 0.0..avail);
                declare(
                    &mut handles,
                    QuantityKind::Generation,
                    &renewable.id,
                    t,
                    VarRole::Continuous,
                    col,
                );
                if renewable.curtailable {
                    let col = problem.add_column(0.0, 0.0..avail);
                    declare(
                        &mut handles,
                        QuantityKind::Curtailment,
                        &renewable.id,
                        t,
                        VarRole::Continuous,
                        col,
                    );
                }
            }
        }

        Ok(Self { handles })
    }

    /// The unique handle for (kind, entity, period). Undeclared
    /// combinations surface as configuration errors.
    pub fn handle(
        &self,
        kind: QuantityKind,
        entity: &EntityId,
        period: usize,
    ) -> Result<&VariableHandle, ConfigError> {
        self.handles
            .get(&(kind, entity.clone(), period))
            .ok_or_else(|| ConfigError::UndeclaredQuantity {
                kind,
                entity: entity.to_string(),
            })
    }

    /// Column index shorthand for builders.
    pub fn col(
        &self,
        kind: QuantityKind,
        entity: &EntityId,
        period: usize,
    ) -> Result<usize, ConfigError> {
        self.handle(kind, entity, period).map(|h| h.col)
    }

    pub fn iter(
        &self,
    ) -> impl Iterator<Item = (&Key, &VariableHandle)> {
        self.handles.iter()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
