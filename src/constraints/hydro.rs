//! Hydro cascade water balance and turbine generation linkage. The
//! cascade graph must already be validated acyclic; delayed upstream
//! releases enter the downstream balance after their travel time, and
//! releases still in transit when the horizon ends are simply absent.

use crate::boundary::InitialConditions;
use crate::cascade::Cascade;
use crate::constraints::ConstraintKind;
use crate::error::ConfigError;
use crate::model::ModelBuild;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;

/// Adds the water balance and the generation linkage for every hydro
/// plant. Missing inflow series become explicit, warned zero series.
pub fn build(
    build: &mut ModelBuild,
    system: &System,
    horizon: &Horizon,
    cascade: &Cascade,
    boundary: &InitialConditions,
) -> Result<usize, ConfigError> {
    let mut rows = 0;

    for hydro in system.hydros.iter() {
        let storage0 = boundary.storage(&hydro.id)?;
        let zeros;
        let inflow: &[f64] = match hydro.inflow.as_ref() {
            Some(series) => series,
            None => {
                build.warnings.push(format!(
                    "hydro '{}' has no inflow series; assuming zero inflow",
                    hydro.id
                ));
                log::warn!(
                    "hydro '{}' has no inflow series; assuming zero",
                    hydro.id
                );
                zeros = vec![0.0; horizon.num_periods];
                &zeros
            }
        };

        for t in horizon.periods() {
            let vol = build.allocator.col(
                QuantityKind::StoredVolume,
                &hydro.id,
                t,
            )?;
            let out =
                build.allocator.col(QuantityKind::Outflow, &hydro.id, t)?;
            let spill =
                build.allocator.col(QuantityKind::Spill, &hydro.id, t)?;
            let gen = build.allocator.col(
                QuantityKind::Generation,
                &hydro.id,
                t,
            )?;

            // vol[t] - vol[t-1] + out[t] + spill[t]
            //   - sum of delayed upstream releases = inflow[t]
            let mut terms =
                vec![(vol, 1.0), (out, 1.0), (spill, 1.0)];
            let mut rhs = *inflow.get(t).unwrap_or(&0.0);
            if t == 0 {
                rhs += storage0;
            } else {
                let vol_prev = build.allocator.col(
                    QuantityKind::StoredVolume,
                    &hydro.id,
                    t - 1,
                )?;
                terms.push((vol_prev, -1.0));
            }
            for link in cascade.links_into(&hydro.id) {
                if t < link.delay_periods {
                    // the release feeding this period predates the horizon
                    continue;
                }
                let tau = t - link.delay_periods;
                let up_out = build.allocator.col(
                    QuantityKind::Outflow,
                    &link.upstream,
                    tau,
                )?;
                let up_spill = build.allocator.col(
                    QuantityKind::Spill,
                    &link.upstream,
                    tau,
                )?;
                terms.push((up_out, -1.0));
                terms.push((up_spill, -1.0));
            }
            build.add_constraint(
                ConstraintKind::WaterBalance,
                &hydro.id,
                t,
                rhs,
                rhs,
                terms,
            );
            rows += 1;

            // gen[t] = productivity * out[t]
            build.add_constraint(
                ConstraintKind::GenerationLinkage,
                &hydro.id,
                t,
                0.0,
                0.0,
                vec![(gen, 1.0), (out, -hydro.productivity)],
            );
            rows += 1;
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuild;
    use crate::system::{EntityId, Hydro, Submarket};

    fn cascade_system(travel_hours: f64, inflow: Option<Vec<f64>>) -> System {
        let up = Hydro::new(
            "up",
            "z",
            Some(EntityId::from("down")),
            travel_hours,
            1.0,
            0.0,
            1000.0,
            0.0,
            200.0,
            0.0,
            0.0,
            inflow.clone(),
        );
        let down = Hydro::new(
            "down", "z", None, 0.0, 1.0, 0.0, 1000.0, 0.0, 200.0, 0.0, 0.0,
            inflow,
        );
        System::new(
            vec![Submarket::new("z", vec![0.0; 4], None)],
            vec![],
            vec![],
            vec![up, down],
            vec![],
        )
    }

    fn built(system: &System, horizon: &Horizon) -> ModelBuild {
        let mut warnings = vec![];
        let cascade =
            Cascade::from_system(system, horizon, &mut warnings).unwrap();
        let boundary = InitialConditions::new()
            .with_storage("up", 500.0)
            .with_storage("down", 500.0);
        let mut build = ModelBuild::empty(system, horizon, None).unwrap();
        build.warnings.extend(warnings);
        super::build(&mut build, system, horizon, &cascade, &boundary)
            .unwrap();
        build
    }

    #[test]
    fn test_delayed_release_reaches_downstream_balance() {
        let system = cascade_system(2.0, Some(vec![0.0; 4]));
        let horizon = Horizon::new(4, 1.0);
        let build = built(&system, &horizon);

        let down = EntityId::from("down");
        let up = EntityId::from("up");
        let up_out_0 = build
            .allocator
            .col(QuantityKind::Outflow, &up, 0)
            .unwrap();

        // balance of 'down' at t=2 carries the upstream release of t=0
        let record = build
            .records
            .iter()
            .find(|r| {
                r.kind == ConstraintKind::WaterBalance
                    && r.entity == down
                    && r.period == 2
            })
            .unwrap();
        assert!(record.terms.iter().any(|(c, f)| *c == up_out_0 && *f == -1.0));

        // balances at t=0 and t=1 do not
        for t in [0usize, 1] {
            let record = build
                .records
                .iter()
                .find(|r| {
                    r.kind == ConstraintKind::WaterBalance
                        && r.entity == down
                        && r.period == t
                })
                .unwrap();
            assert!(!record.terms.iter().any(|(c, _)| *c == up_out_0));
        }
    }

    #[test]
    fn test_initial_storage_moves_to_first_rhs() {
        let system = cascade_system(2.0, Some(vec![7.0; 4]));
        let horizon = Horizon::new(4, 1.0);
        let build = built(&system, &horizon);
        let record = build
            .records
            .iter()
            .find(|r| {
                r.kind == ConstraintKind::WaterBalance
                    && r.entity == EntityId::from("up")
                    && r.period == 0
            })
            .unwrap();
        assert_eq!(record.lower, 507.0);
    }

    #[test]
    fn test_missing_inflow_is_warned_zero() {
        let system = cascade_system(1.0, None);
        let horizon = Horizon::new(4, 1.0);
        let build = built(&system, &horizon);
        assert!(build
            .warnings
            .iter()
            .any(|w| w.contains("no inflow series")));
        let record = build
            .records
            .iter()
            .find(|r| {
                r.kind == ConstraintKind::WaterBalance
                    && r.entity == EntityId::from("down")
                    && r.period == 1
            })
            .unwrap();
        assert_eq!(record.lower, 0.0);
    }

    #[test]
    fn test_generation_linkage_uses_productivity() {
        let system = cascade_system(1.0, Some(vec![0.0; 4]));
        let horizon = Horizon::new(4, 1.0);
        let build = built(&system, &horizon);
        let record = build
            .records
            .iter()
            .find(|r| r.kind == ConstraintKind::GenerationLinkage)
            .unwrap();
        assert!(record.terms.iter().any(|(_, f)| *f == -1.0));
        assert_eq!(record.lower, 0.0);
        assert_eq!(record.upper, 0.0);
    }
}
