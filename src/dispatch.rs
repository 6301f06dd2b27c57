//! Two-stage solve pipeline: a commitment MIP followed by a pricing LP
//! rebuilt from the same builders with the integer decisions frozen.
//! Prices come out of the pricing stage's balance-row duals; the
//! commitment stage never reports duals.

use std::time::Instant;

use crate::constraints::ConstraintKind;
use crate::error::{Error, SolverError};
use crate::extract;
use crate::model::{self, ModelBuild};
use crate::result::{
    PriceTable, SolveStatus, SolverResult, TwoStageResult,
};
use crate::solver::{self, HighsStatus, Sense};
use crate::system::{Horizon, System};
use crate::variables::{FrozenCommitment, QuantityKind};
use crate::boundary::InitialConditions;

/// Knobs for one pipeline run. Both stages share the same options; the
/// MIP-only entries are ignored by the pricing LP.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    /// Wall-clock limit per stage in seconds.
    pub time_limit_secs: f64,
    /// Relative MIP gap at which the commitment stage may stop.
    pub mip_gap: f64,
    pub threads: usize,
    /// Factor applied to every objective coefficient before the solve.
    /// Objective values and duals are reported divided back by it.
    pub cost_scale: f64,
    /// Deficit cost for submarkets that do not declare their own.
    pub deficit_cost: f64,
    pub allow_deficit: bool,
    /// Largest row count the conflict filter will accept.
    pub conflict_row_limit: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            time_limit_secs: 300.0,
            mip_gap: 1e-6,
            threads: 1,
            cost_scale: 1.0,
            deficit_cost: 5000.0,
            allow_deficit: true,
            conflict_row_limit: 500,
        }
    }
}

/// Rounds a relaxed commitment value to the binary it stands for.
/// Exactly 0.5 commits the unit.
pub fn round_commitment(value: f64) -> f64 {
    if value < 0.5 {
        0.0
    } else {
        1.0
    }
}

fn configure_model(model: &mut solver::Model, options: &SolveOptions) {
    model.set_option("time_limit", options.time_limit_secs);
    model.set_option("mip_rel_gap", options.mip_gap);
    model.set_option("threads", options.threads as i32);
    model.set_option("parallel", if options.threads > 1 { "on" } else { "off" });
}

fn backend_rejected(status: HighsStatus) -> Error {
    Error::Solver(SolverError::BackendRejected(format!("{:?}", status)))
}

fn solve_stage(
    build: &ModelBuild,
    options: &SolveOptions,
    include_duals: bool,
) -> Result<SolverResult, Error> {
    let started = Instant::now();
    let mut model = build
        .problem
        .clone()
        .try_optimise(Sense::Minimise)
        .map_err(backend_rejected)?;
    configure_model(&mut model, options);
    model.try_solve().map_err(|_| {
        Error::Solver(SolverError::BackendCall("Highs_run".into()))
    })?;
    let status = SolveStatus::from(model.status());
    Ok(extract::extract_solution(
        build,
        &model,
        status,
        started.elapsed(),
        include_duals,
    ))
}

/// Collects the rounded commitment decisions from the Stage-1 primal.
/// An absent value is warned and skipped; the rebuild then rejects the
/// hole instead of silently committing the unit.
fn freeze_commitment(
    system: &System,
    horizon: &Horizon,
    stage_one: &SolverResult,
    warnings: &mut Vec<String>,
) -> FrozenCommitment {
    let mut frozen = FrozenCommitment::new();
    for thermal in system.thermals.iter() {
        for t in horizon.periods() {
            match stage_one.primal.value(
                QuantityKind::Commitment,
                &thermal.id,
                t,
            ) {
                Some(u) => {
                    frozen.insert(thermal.id.clone(), t, round_commitment(u))
                }
                None => {
                    let message = format!(
                        "commitment of '{}' at period {} missing from the \
                         first stage, pricing will be skipped",
                        thermal.id, t
                    );
                    log::warn!("{}", message);
                    warnings.push(message);
                }
            }
        }
    }
    frozen
}

fn price_table(pricing: &SolverResult) -> PriceTable {
    let mut prices = PriceTable::default();
    for ((kind, entity, period), dual) in pricing.dual.iter() {
        if *kind == ConstraintKind::SubmarketBalance {
            prices.insert(entity.clone(), *period, *dual);
        }
    }
    prices
}

/// Runs commitment then pricing. A failed pricing stage degrades to a
/// warning with no prices; a failed commitment stage is final and is
/// reported through [`TwoStageResult::status`].
pub fn solve_two_stage(
    system: &System,
    horizon: &Horizon,
    boundary: &InitialConditions,
    options: &SolveOptions,
) -> Result<TwoStageResult, Error> {
    let stage_one_build =
        model::build_model(system, horizon, boundary, options, None)?;
    let mut warnings = stage_one_build.warnings.clone();

    // A system with no thermal plant produces a pure LP here; duals are
    // then meaningful already in the first stage.
    let is_mip = stage_one_build.problem.is_mip();
    let commitment = solve_stage(&stage_one_build, options, !is_mip)?;
    warnings.extend(commitment.warnings.clone());

    if commitment.status != SolveStatus::Optimal {
        log::warn!(
            "commitment stage finished {:?}, skipping the pricing stage",
            commitment.status
        );
        return Ok(TwoStageResult {
            commitment,
            pricing: None,
            prices: None,
            breakdown: None,
            warnings,
        });
    }

    if !is_mip {
        let prices = price_table(&commitment);
        let breakdown = extract::cost_breakdown(
            system,
            horizon,
            &commitment.primal,
            options.deficit_cost,
        );
        return Ok(TwoStageResult {
            commitment,
            pricing: None,
            prices: Some(prices),
            breakdown: Some(breakdown),
            warnings,
        });
    }

    let expected = system.thermals.len() * horizon.num_periods;
    let frozen =
        freeze_commitment(system, horizon, &commitment, &mut warnings);
    if frozen.len() < expected {
        return Ok(TwoStageResult {
            commitment,
            pricing: None,
            prices: None,
            breakdown: None,
            warnings,
        });
    }

    let stage_two_build =
        model::build_model(system, horizon, boundary, options, Some(&frozen))?;
    warnings.extend(stage_two_build.warnings.clone());
    let pricing = solve_stage(&stage_two_build, options, true)?;

    Ok(finish_with_pricing(
        commitment, pricing, system, horizon, options, warnings,
    ))
}

/// Folds the pricing stage into the final result. A non-optimal pricing
/// outcome keeps the commitment result intact and downgrades the prices
/// to a warning instead of failing the pipeline.
fn finish_with_pricing(
    commitment: SolverResult,
    pricing: SolverResult,
    system: &System,
    horizon: &Horizon,
    options: &SolveOptions,
    mut warnings: Vec<String>,
) -> TwoStageResult {
    warnings.extend(pricing.warnings.clone());

    if pricing.status != SolveStatus::Optimal {
        let message = format!(
            "pricing stage finished {:?}, no prices are available",
            pricing.status
        );
        log::warn!("{}", message);
        warnings.push(message);
        return TwoStageResult {
            commitment,
            pricing: Some(pricing),
            prices: None,
            breakdown: None,
            warnings,
        };
    }

    let prices = price_table(&pricing);
    let breakdown = extract::cost_breakdown(
        system,
        horizon,
        &pricing.primal,
        options.deficit_cost,
    );

    TwoStageResult {
        commitment,
        pricing: Some(pricing),
        prices: Some(prices),
        breakdown: Some(breakdown),
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::{Submarket, System, Thermal};

    // One zone, three thermal plants with different fuel costs and a
    // startup cost that keeps unneeded units off. Demand of 220 MW is
    // covered by the two cheapest plants, leaving the 80 $/MWh one
    // marginal.
    fn merit_order_system(demand: f64, periods: usize) -> System {
        let plant = |id: &str, cost: f64, max: f64| {
            Thermal::new(
                id,
                "z1",
                cost,
                100.0,
                0.0,
                0.0,
                max,
                f64::INFINITY,
                f64::INFINITY,
                0.0,
                0.0,
            )
        };
        System::new(
            vec![Submarket::new("z1", vec![demand; periods], None)],
            vec![],
            vec![
                plant("t1", 50.0, 100.0),
                plant("t2", 80.0, 150.0),
                plant("t3", 120.0, 200.0),
            ],
            vec![],
            vec![],
        )
    }

    fn offline_boundary() -> InitialConditions {
        InitialConditions::new()
            .with_thermal("t1", false, 0.0)
            .with_thermal("t2", false, 0.0)
            .with_thermal("t3", false, 0.0)
    }

    #[test]
    fn test_merit_order_commitment_and_price() {
        let system = merit_order_system(220.0, 4);
        let horizon = Horizon::new(4, 1.0);
        let options = SolveOptions::default();
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &options,
        )
        .unwrap();

        assert_eq!(result.status(), SolveStatus::Optimal);
        for t in 0..4 {
            let u = |id: &str| {
                result
                    .commitment
                    .primal
                    .value(QuantityKind::Commitment, &id.into(), t)
                    .unwrap()
            };
            assert!((u("t1") - 1.0).abs() < 1e-6);
            assert!((u("t2") - 1.0).abs() < 1e-6);
            assert!(u("t3").abs() < 1e-6);
        }

        // the pricing stage makes the expensive committed unit marginal
        let prices = result.prices.as_ref().unwrap();
        for t in 0..4 {
            assert!((prices.get(&"z1".into(), t).unwrap() - 80.0).abs()
                < 1e-6);
        }
    }

    #[test]
    fn test_cost_scale_leaves_reported_values_unchanged() {
        let system = merit_order_system(220.0, 1);
        let horizon = Horizon::new(1, 1.0);
        let boundary = offline_boundary();

        let plain = solve_two_stage(
            &system,
            &horizon,
            &boundary,
            &SolveOptions::default(),
        )
        .unwrap();
        let scaled = solve_two_stage(
            &system,
            &horizon,
            &boundary,
            &SolveOptions {
                cost_scale: 100.0,
                ..SolveOptions::default()
            },
        )
        .unwrap();

        let plain_objective = plain.commitment.objective.unwrap();
        let scaled_objective = scaled.commitment.objective.unwrap();
        assert!((plain_objective - scaled_objective).abs() < 1e-4);

        let plain_price =
            plain.prices.unwrap().get(&"z1".into(), 0).unwrap();
        let scaled_price =
            scaled.prices.unwrap().get(&"z1".into(), 0).unwrap();
        assert!((plain_price - scaled_price).abs() < 1e-6);
    }

    #[test]
    fn test_commitment_transition_invariant() {
        // demand drops enough in the middle period for a shutdown to pay
        let system = merit_order_system(220.0, 3);
        let mut system = system;
        system.submarkets[0].demand = vec![220.0, 50.0, 220.0];
        let horizon = Horizon::new(3, 1.0);
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &SolveOptions::default(),
        )
        .unwrap();
        assert_eq!(result.status(), SolveStatus::Optimal);

        for thermal in system.thermals.iter() {
            let mut previous = 0.0;
            for t in horizon.periods() {
                let value = |kind| {
                    result
                        .commitment
                        .primal
                        .value(kind, &thermal.id, t)
                        .unwrap()
                };
                let u = value(QuantityKind::Commitment);
                let v = value(QuantityKind::Startup);
                let w = value(QuantityKind::Shutdown);
                assert!(
                    ((u - previous) - (v - w)).abs() < 1e-6,
                    "transition violated for '{}' at period {}",
                    thermal.id,
                    t
                );
                previous = u;
            }
        }
    }

    #[test]
    fn test_pricing_cost_matches_commitment_cost() {
        let system = merit_order_system(220.0, 2);
        let horizon = Horizon::new(2, 1.0);
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &SolveOptions::default(),
        )
        .unwrap();
        let commitment = result.commitment.objective.unwrap();
        let pricing = result.pricing.unwrap().objective.unwrap();
        assert!(pricing <= commitment + 1e-4);
        assert!((pricing - commitment).abs() < 1e-4);
    }

    #[test]
    fn test_breakdown_reconciles_with_objective() {
        let system = merit_order_system(220.0, 2);
        let horizon = Horizon::new(2, 1.0);
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &SolveOptions::default(),
        )
        .unwrap();
        let objective = result.pricing.as_ref().unwrap().objective.unwrap();
        let total = result.breakdown.unwrap().total();
        assert!((total - objective).abs() <= 1e-3 * objective.abs());
    }

    #[test]
    fn test_shortfall_without_deficit_is_infeasible() {
        // 250 MW of capacity against 300 MW of demand
        let mut system = merit_order_system(300.0, 2);
        system.thermals.pop();
        let horizon = Horizon::new(2, 1.0);
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &SolveOptions {
                allow_deficit: false,
                ..SolveOptions::default()
            },
        )
        .unwrap();
        assert_eq!(result.status(), SolveStatus::Infeasible);
        assert!(result.pricing.is_none());
        assert!(result.prices.is_none());
        assert!(result.breakdown.is_none());
    }

    #[test]
    fn test_shortfall_with_deficit_prices_at_deficit_cost() {
        let mut system = merit_order_system(300.0, 1);
        system.thermals.pop();
        let horizon = Horizon::new(1, 1.0);
        let options = SolveOptions::default();
        let result = solve_two_stage(
            &system,
            &horizon,
            &offline_boundary(),
            &options,
        )
        .unwrap();
        assert_eq!(result.status(), SolveStatus::Optimal);

        let deficit = result
            .commitment
            .primal
            .value(QuantityKind::Deficit, &"z1".into(), 0)
            .unwrap();
        assert!((deficit - 50.0).abs() < 1e-6);

        let price =
            result.prices.unwrap().get(&"z1".into(), 0).unwrap();
        assert!((price - options.deficit_cost).abs() < 1e-4);
    }

    #[test]
    fn test_price_is_marginal_cost_of_demand() {
        let horizon = Horizon::new(1, 1.0);
        let boundary = offline_boundary();
        let options = SolveOptions::default();
        let base = solve_two_stage(
            &merit_order_system(220.0, 1),
            &horizon,
            &boundary,
            &options,
        )
        .unwrap();
        let bumped = solve_two_stage(
            &merit_order_system(221.0, 1),
            &horizon,
            &boundary,
            &options,
        )
        .unwrap();

        let delta = bumped.pricing.unwrap().objective.unwrap()
            - base.pricing.as_ref().unwrap().objective.unwrap();
        let price = base.prices.unwrap().get(&"z1".into(), 0).unwrap();
        assert!((delta - price).abs() < 1e-4);
    }

    #[test]
    fn test_infeasible_pricing_keeps_commitment_result() {
        // an all-off frozen map cannot serve demand with deficit off,
        // which makes the pricing rebuild infeasible on its own
        let system = merit_order_system(220.0, 1);
        let horizon = Horizon::new(1, 1.0);
        let boundary = offline_boundary();
        let options = SolveOptions {
            allow_deficit: false,
            ..SolveOptions::default()
        };

        let mut frozen = FrozenCommitment::new();
        for id in ["t1", "t2", "t3"] {
            frozen.insert(id.into(), 0, 0.0);
        }
        let pricing_build = model::build_model(
            &system,
            &horizon,
            &boundary,
            &options,
            Some(&frozen),
        )
        .unwrap();
        let pricing =
            solve_stage(&pricing_build, &options, true).unwrap();
        assert_ne!(pricing.status, SolveStatus::Optimal);

        // a healthy first-stage result stands in for the commitment slot
        let feasible = SolveOptions::default();
        let commitment_build = model::build_model(
            &system, &horizon, &boundary, &feasible, None,
        )
        .unwrap();
        let commitment =
            solve_stage(&commitment_build, &feasible, false).unwrap();
        assert_eq!(commitment.status, SolveStatus::Optimal);

        let result = finish_with_pricing(
            commitment,
            pricing,
            &system,
            &horizon,
            &options,
            vec![],
        );
        assert_eq!(result.status(), SolveStatus::Optimal);
        assert_ne!(
            result.pricing.as_ref().unwrap().status,
            SolveStatus::Optimal
        );
        assert!(result.prices.is_none());
        assert!(result.breakdown.is_none());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("no prices are available")));
    }

    #[test]
    fn test_round_commitment_is_binary() {
        assert_eq!(round_commitment(0.0), 0.0);
        assert_eq!(round_commitment(0.49), 0.0);
        assert_eq!(round_commitment(0.5), 1.0);
        assert_eq!(round_commitment(0.999), 1.0);
        assert_eq!(round_commitment(1.0), 1.0);
    }

    #[test]
    fn test_round_commitment_is_idempotent() {
        for v in [0.0, 0.2, 0.5, 0.7, 1.0] {
            let rounded = round_commitment(v);
            assert_eq!(round_commitment(rounded), rounded);
        }
    }

    #[test]
    fn test_default_options() {
        let options = SolveOptions::default();
        assert!(options.allow_deficit);
        assert_eq!(options.cost_scale, 1.0);
        assert_eq!(options.threads, 1);
    }
}
