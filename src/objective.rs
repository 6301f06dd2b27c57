//! Objective assembly: every monetary term is multiplied by the cost
//! scale before reaching the backend, and every dual read back must be
//! divided by the same factor. Missing that division is a correctness
//! bug, so the convention lives in one place.

use crate::dispatch::SolveOptions;
use crate::error::ConfigError;
use crate::model::ModelBuild;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;

/// The single multiplicative factor applied to monetary coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalingConvention {
    pub cost_scale: f64,
}

impl Default for ScalingConvention {
    fn default() -> Self {
        Self { cost_scale: 1.0 }
    }
}

impl ScalingConvention {
    pub fn new(cost_scale: f64) -> Self {
        Self { cost_scale }
    }

    /// Scales a native-currency coefficient for the backend.
    pub fn scale(&self, cost: f64) -> f64 {
        cost * self.cost_scale
    }

    /// Brings a backend dual or objective back to native currency.
    pub fn unscale(&self, value: f64) -> f64 {
        value / self.cost_scale
    }
}

/// Writes the scaled cost coefficient of every monetary variable: fuel,
/// startup and shutdown costs, deficit and spill penalties, and the
/// terminal water value credited on final-period storage.
pub fn build(
    build: &mut ModelBuild,
    system: &System,
    horizon: &Horizon,
    options: &SolveOptions,
) -> Result<(), ConfigError> {
    let scaling = build.scaling;
    let dt = horizon.period_hours;
    let last = match horizon.num_periods {
        0 => return Ok(()),
        n => n - 1,
    };

    for thermal in system.thermals.iter() {
        for t in horizon.periods() {
            let g = build.allocator.col(
                QuantityKind::Generation,
                &thermal.id,
                t,
            )?;
            build
                .problem
                .set_objective_coefficient(g, scaling.scale(thermal.cost * dt));
            let v =
                build.allocator.col(QuantityKind::Startup, &thermal.id, t)?;
            build
                .problem
                .set_objective_coefficient(v, scaling.scale(thermal.startup_cost));
            let w = build.allocator.col(
                QuantityKind::Shutdown,
                &thermal.id,
                t,
            )?;
            build.problem.set_objective_coefficient(
                w,
                scaling.scale(thermal.shutdown_cost),
            );
        }
    }

    for hydro in system.hydros.iter() {
        for t in horizon.periods() {
            let spill =
                build.allocator.col(QuantityKind::Spill, &hydro.id, t)?;
            build.problem.set_objective_coefficient(
                spill,
                scaling.scale(hydro.spill_penalty),
            );
        }
        let vol_last = build.allocator.col(
            QuantityKind::StoredVolume,
            &hydro.id,
            last,
        )?;
        build.problem.set_objective_coefficient(
            vol_last,
            scaling.scale(-hydro.water_value),
        );
    }

    if options.allow_deficit {
        for submarket in system.submarkets.iter() {
            let cost = submarket
                .deficit_cost
                .unwrap_or(options.deficit_cost);
            for t in horizon.periods() {
                let d = build.allocator.col(
                    QuantityKind::Deficit,
                    &submarket.id,
                    t,
                )?;
                build
                    .problem
                    .set_objective_coefficient(d, scaling.scale(cost * dt));
            }
        }
    }

    Ok(())
}
