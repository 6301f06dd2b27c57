//! Model assembly: allocates variables, runs every constraint builder
//! in the registry order and writes the scaled objective, producing a
//! self-describing problem ready for the backend. Stage 2 reuses the
//! exact same path with a frozen commitment map instead of copying and
//! remapping the Stage-1 model.

use crate::boundary::InitialConditions;
use crate::cascade::Cascade;
use crate::constraints::{
    balance, hydro, renewable, thermal, ConstraintKind, ConstraintRecord,
};
use crate::dispatch::SolveOptions;
use crate::error::ConfigError;
use crate::objective::{self, ScalingConvention};
use crate::solver;
use crate::system::{EntityId, Horizon, System};
use crate::variables::{FrozenCommitment, VariableAllocator};
use chrono::Utc;

/// A model in progress: the backend problem plus the identity-keyed
/// structures that describe it. Mutable during assembly only; the solve
/// pipeline never shares it across stages.
#[derive(Debug)]
pub struct ModelBuild {
    pub problem: solver::Problem,
    pub allocator: VariableAllocator,
    pub records: Vec<ConstraintRecord>,
    pub warnings: Vec<String>,
    pub scaling: ScalingConvention,
}

impl ModelBuild {
    fn with(
        system: &System,
        horizon: &Horizon,
        frozen: Option<&FrozenCommitment>,
        allow_deficit: bool,
        scaling: ScalingConvention,
    ) -> Result<Self, ConfigError> {
        let mut problem = solver::Problem::new();
        let allocator = VariableAllocator::allocate(
            &mut problem,
            system,
            horizon,
            frozen,
            allow_deficit,
        )?;
        Ok(Self {
            problem,
            allocator,
            records: vec![],
            warnings: vec![],
            scaling,
        })
    }

    /// An allocated build without constraints, as the builder unit tests
    /// start from.
    pub fn empty(
        system: &System,
        horizon: &Horizon,
        frozen: Option<&FrozenCommitment>,
    ) -> Result<Self, ConfigError> {
        Self::with(system, horizon, frozen, true, ScalingConvention::default())
    }

    pub fn empty_without_deficit(
        system: &System,
        horizon: &Horizon,
    ) -> Result<Self, ConfigError> {
        Self::with(system, horizon, None, false, ScalingConvention::default())
    }

    /// Adds one row to the problem and the record describing it.
    pub fn add_constraint(
        &mut self,
        kind: ConstraintKind,
        entity: &EntityId,
        period: usize,
        lower: f64,
        upper: f64,
        terms: Vec<(usize, f64)>,
    ) -> usize {
        let row = self.problem.add_row(lower..=upper, &terms);
        self.records.push(ConstraintRecord {
            kind,
            name: format!("{:?}[{}][{}]", kind, entity, period),
            entity: entity.clone(),
            period,
            row,
            terms,
            lower,
            upper,
            priority: kind.priority(),
            built_at: Utc::now(),
        });
        row
    }

    pub fn record_for_row(&self, row: usize) -> Option<&ConstraintRecord> {
        self.records.iter().find(|r| r.row == row)
    }
}

/// Builds the complete model for one stage. With `frozen` set the
/// commitment variables become fixed continuous columns and the result
/// is a pure LP; without it the commitment stage MIP is produced.
pub fn build_model(
    system: &System,
    horizon: &Horizon,
    boundary: &InitialConditions,
    options: &SolveOptions,
    frozen: Option<&FrozenCommitment>,
) -> Result<ModelBuild, ConfigError> {
    let mut warnings = vec![];
    let cascade = Cascade::from_system(system, horizon, &mut warnings)?;

    let mut build = ModelBuild::with(
        system,
        horizon,
        frozen,
        options.allow_deficit,
        ScalingConvention::new(options.cost_scale),
    )?;
    build.warnings.extend(warnings);

    thermal::build(&mut build, system, horizon, boundary)?;
    hydro::build(&mut build, system, horizon, &cascade, boundary)?;
    renewable::build(&mut build, system, horizon)?;
    balance::build(&mut build, system, horizon, options.allow_deficit)?;
    objective::build(&mut build, system, horizon, options)?;

    Ok(build)
}
