//! Solution extraction: primal values per handle, duals per constraint
//! record rescaled out of the cost-scale convention, and the cost
//! breakdown recomputed from primal values instead of trusted from the
//! backend's aggregate objective.

use crate::model::ModelBuild;
use crate::result::{
    CostBreakdown, DualTable, PrimalTable, SolveStatus, SolverResult,
};
use crate::solver;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;
use std::time::Duration;

/// Pulls primal (and optionally dual) values out of a solved model.
/// Individual read failures are warned and marked absent; they never
/// abort the pass.
pub fn extract_solution(
    build: &ModelBuild,
    model: &solver::Model,
    status: SolveStatus,
    wall_time: Duration,
    include_duals: bool,
) -> SolverResult {
    let mut warnings = vec![];
    let mut primal = PrimalTable::default();
    let mut dual = DualTable::default();

    let has_point = model.has_primal_solution();
    let solution = has_point.then(|| model.get_solution());

    for ((kind, entity, period), handle) in build.allocator.iter() {
        let value = solution
            .as_ref()
            .and_then(|s| s.col_value(handle.col));
        if has_point && value.is_none() {
            let message = format!(
                "no value extracted for {:?} of '{}' at period {}",
                kind, entity, period
            );
            log::warn!("{}", message);
            warnings.push(message);
        }
        primal.insert(*kind, entity.clone(), *period, value);
    }

    if include_duals {
        if let Some(solution) = solution.as_ref() {
            for record in build.records.iter() {
                match solution.row_dual(record.row) {
                    Some(raw) => dual.insert(
                        record.kind,
                        record.entity.clone(),
                        record.period,
                        build.scaling.unscale(raw),
                    ),
                    None => {
                        let message = format!(
                            "no dual extracted for {}",
                            record.name
                        );
                        log::warn!("{}", message);
                        warnings.push(message);
                    }
                }
            }
        }
    }

    let objective = has_point
        .then(|| build.scaling.unscale(model.get_objective_value()));

    SolverResult {
        status,
        objective,
        wall_time,
        primal,
        dual,
        warnings,
    }
}

/// Recomputes the cost components from primal values and entity cost
/// parameters. Absent primal entries contribute nothing; the caller
/// compares the total against the reported objective.
pub fn cost_breakdown(
    system: &System,
    horizon: &Horizon,
    primal: &PrimalTable,
    default_deficit_cost: f64,
) -> CostBreakdown {
    let dt = horizon.period_hours;
    let mut breakdown = CostBreakdown::default();

    for thermal in system.thermals.iter() {
        for t in horizon.periods() {
            if let Some(g) =
                primal.value(QuantityKind::Generation, &thermal.id, t)
            {
                breakdown.fuel += thermal.cost * dt * g;
            }
            if let Some(v) =
                primal.value(QuantityKind::Startup, &thermal.id, t)
            {
                breakdown.startup += thermal.startup_cost * v;
            }
            if let Some(w) =
                primal.value(QuantityKind::Shutdown, &thermal.id, t)
            {
                breakdown.shutdown += thermal.shutdown_cost * w;
            }
        }
    }

    for hydro in system.hydros.iter() {
        for t in horizon.periods() {
            if let Some(s) = primal.value(QuantityKind::Spill, &hydro.id, t)
            {
                breakdown.spill += hydro.spill_penalty * s;
            }
        }
        if horizon.num_periods > 0 {
            if let Some(vol) = primal.value(
                QuantityKind::StoredVolume,
                &hydro.id,
                horizon.num_periods - 1,
            ) {
                breakdown.terminal_water_credit += hydro.water_value * vol;
            }
        }
    }

    for submarket in system.submarkets.iter() {
        for t in horizon.periods() {
            if let Some(d) =
                primal.value(QuantityKind::Deficit, &submarket.id, t)
            {
                let cost =
                    submarket.deficit_cost.unwrap_or(default_deficit_cost);
                breakdown.deficit += cost * dt * d;
            }
        }
    }

    breakdown
}
