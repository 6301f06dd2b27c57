//! Thermal commitment state machine: capacity limits tied to the
//! commitment variable, ramp limits, the on/off transition equality and
//! minimum up/down time windows.

use crate::boundary::InitialConditions;
use crate::constraints::ConstraintKind;
use crate::error::ConfigError;
use crate::model::ModelBuild;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;

/// Adds every commitment-machine row for every thermal plant. Requires
/// the boundary map to carry initial commitment and generation for each
/// plant; a missing entry aborts the build.
pub fn build(
    build: &mut ModelBuild,
    system: &System,
    horizon: &Horizon,
    boundary: &InitialConditions,
) -> Result<usize, ConfigError> {
    let mut rows = 0;
    let dt = horizon.period_hours;

    for thermal in system.thermals.iter() {
        let u0 = if boundary.commitment(&thermal.id)? { 1.0 } else { 0.0 };
        let g0 = boundary.generation(&thermal.id)?;
        let min_up = horizon.round_to_periods(thermal.min_uptime);
        let min_down = horizon.round_to_periods(thermal.min_downtime);

        for t in horizon.periods() {
            let g = build.allocator.col(
                QuantityKind::Generation,
                &thermal.id,
                t,
            )?;
            let u = build.allocator.col(
                QuantityKind::Commitment,
                &thermal.id,
                t,
            )?;
            let v =
                build.allocator.col(QuantityKind::Startup, &thermal.id, t)?;
            let w = build.allocator.col(
                QuantityKind::Shutdown,
                &thermal.id,
                t,
            )?;

            // g - max*u <= 0
            build.add_constraint(
                ConstraintKind::MaxGeneration,
                &thermal.id,
                t,
                f64::NEG_INFINITY,
                0.0,
                vec![(g, 1.0), (u, -thermal.max_generation)],
            );
            rows += 1;

            // g - min*u >= 0
            build.add_constraint(
                ConstraintKind::MinGeneration,
                &thermal.id,
                t,
                0.0,
                f64::INFINITY,
                vec![(g, 1.0), (u, -thermal.min_generation)],
            );
            rows += 1;

            // u[t] - u[t-1] = v[t] - w[t]; the boundary commitment moves
            // to the RHS in the first period
            if t == 0 {
                build.add_constraint(
                    ConstraintKind::CommitmentTransition,
                    &thermal.id,
                    t,
                    u0,
                    u0,
                    vec![(u, 1.0), (v, -1.0), (w, 1.0)],
                );
            } else {
                let u_prev = build.allocator.col(
                    QuantityKind::Commitment,
                    &thermal.id,
                    t - 1,
                )?;
                build.add_constraint(
                    ConstraintKind::CommitmentTransition,
                    &thermal.id,
                    t,
                    0.0,
                    0.0,
                    vec![(u, 1.0), (u_prev, -1.0), (v, -1.0), (w, 1.0)],
                );
            }
            rows += 1;

            // -ramp_down*dt <= g[t] - g[t-1] <= ramp_up*dt
            let ramped =
                thermal.ramp_up.is_finite() || thermal.ramp_down.is_finite();
            if ramped {
                let up = thermal.ramp_up * dt;
                let down = thermal.ramp_down * dt;
                if t == 0 {
                    build.add_constraint(
                        ConstraintKind::Ramp,
                        &thermal.id,
                        t,
                        g0 - down,
                        g0 + up,
                        vec![(g, 1.0)],
                    );
                } else {
                    let g_prev = build.allocator.col(
                        QuantityKind::Generation,
                        &thermal.id,
                        t - 1,
                    )?;
                    build.add_constraint(
                        ConstraintKind::Ramp,
                        &thermal.id,
                        t,
                        -down,
                        up,
                        vec![(g, 1.0), (g_prev, -1.0)],
                    );
                }
                rows += 1;
            }

            // sum of startups over the last min_up periods <= u[t]
            if min_up >= 2 {
                let first = t.saturating_sub(min_up - 1);
                let mut terms = vec![(u, -1.0)];
                for tau in first..=t {
                    let v_tau = build.allocator.col(
                        QuantityKind::Startup,
                        &thermal.id,
                        tau,
                    )?;
                    terms.push((v_tau, 1.0));
                }
                build.add_constraint(
                    ConstraintKind::MinUptime,
                    &thermal.id,
                    t,
                    f64::NEG_INFINITY,
                    0.0,
                    terms,
                );
                rows += 1;
            }

            // sum of shutdowns over the last min_down periods <= 1 - u[t]
            if min_down >= 2 {
                let first = t.saturating_sub(min_down - 1);
                let mut terms = vec![(u, 1.0)];
                for tau in first..=t {
                    let w_tau = build.allocator.col(
                        QuantityKind::Shutdown,
                        &thermal.id,
                        tau,
                    )?;
                    terms.push((w_tau, 1.0));
                }
                build.add_constraint(
                    ConstraintKind::MinDowntime,
                    &thermal.id,
                    t,
                    f64::NEG_INFINITY,
                    1.0,
                    terms,
                );
                rows += 1;
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuild;
    use crate::system::{Submarket, Thermal};

    fn one_plant_system(min_uptime: f64) -> System {
        let plant = Thermal::new(
            "t1", "z", 50.0, 100.0, 50.0, 20.0, 100.0, 30.0, 30.0,
            min_uptime, 0.0,
        );
        System::new(
            vec![Submarket::new("z", vec![50.0; 3], None)],
            vec![],
            vec![plant],
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_rows_per_period_without_timing_windows() {
        let system = one_plant_system(0.0);
        let horizon = Horizon::new(3, 1.0);
        let boundary =
            InitialConditions::new().with_thermal("t1", false, 0.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        let rows = super::build(&mut build, &system, &horizon, &boundary)
            .unwrap();
        // max + min + transition + ramp, per period
        assert_eq!(rows, 4 * 3);
    }

    #[test]
    fn test_min_uptime_window_rows() {
        let system = one_plant_system(2.0);
        let horizon = Horizon::new(3, 1.0);
        let boundary =
            InitialConditions::new().with_thermal("t1", false, 0.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        let rows = super::build(&mut build, &system, &horizon, &boundary)
            .unwrap();
        assert_eq!(rows, 4 * 3 + 3);
        assert!(build
            .records
            .iter()
            .any(|r| r.kind == ConstraintKind::MinUptime));
    }

    #[test]
    fn test_missing_boundary_aborts() {
        let system = one_plant_system(0.0);
        let horizon = Horizon::new(3, 1.0);
        let boundary = InitialConditions::new();
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        let err = super::build(&mut build, &system, &horizon, &boundary)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingInitialCommitment(_)));
    }

    #[test]
    fn test_boundary_commitment_lands_on_first_transition_rhs() {
        let system = one_plant_system(0.0);
        let horizon = Horizon::new(3, 1.0);
        let boundary =
            InitialConditions::new().with_thermal("t1", true, 60.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        super::build(&mut build, &system, &horizon, &boundary).unwrap();
        let transition = build
            .records
            .iter()
            .find(|r| {
                r.kind == ConstraintKind::CommitmentTransition
                    && r.period == 0
            })
            .unwrap();
        assert_eq!(transition.lower, 1.0);
        assert_eq!(transition.upper, 1.0);
    }
}
