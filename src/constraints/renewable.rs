//! Renewable availability limits. Curtailable plants split their
//! availability between delivered generation and curtailment; plants
//! without curtailment rights must deliver the full profile.

use crate::constraints::ConstraintKind;
use crate::error::ConfigError;
use crate::model::ModelBuild;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;

pub fn build(
    build: &mut ModelBuild,
    system: &System,
    horizon: &Horizon,
) -> Result<usize, ConfigError> {
    let mut rows = 0;
    for renewable in system.renewables.iter() {
        for t in horizon.periods() {
            let avail = renewable.availability[t];
            let gen = build.allocator.col(
                QuantityKind::Generation,
                &renewable.id,
                t,
            )?;
            let terms = if renewable.curtailable {
                let curt = build.allocator.col(
                    QuantityKind::Curtailment,
                    &renewable.id,
                    t,
                )?;
                vec![(gen, 1.0), (curt, 1.0)]
            } else {
                vec![(gen, 1.0)]
            };
            build.add_constraint(
                ConstraintKind::AvailabilityLimit,
                &renewable.id,
                t,
                avail,
                avail,
                terms,
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
    use crate::system::{EntityId, Renewable, Submarket};

    fn system_with(curtailable: bool) -> System {
        System::new(
            vec![Submarket::new("z", vec![10.0, 10.0], None)],
            vec![],
            vec![],
            vec![],
            vec![Renewable::new("w1", "z", curtailable, vec![4.0, 6.0])],
        )
    }

    #[test]
    fn test_curtailable_plant_splits_availability() {
        let system = system_with(true);
        let horizon = Horizon::new(2, 1.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        let rows = super::build(&mut build, &system, &horizon).unwrap();
        assert_eq!(rows, 2);
        let record = build
            .records
            .iter()
            .find(|r| r.period == 1)
            .unwrap();
        assert_eq!(record.terms.len(), 2);
        assert_eq!(record.lower, 6.0);
    }

    #[test]
    fn test_must_run_plant_is_pinned_to_profile() {
        let system = system_with(false);
        let horizon = Horizon::new(2, 1.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        super::build(&mut build, &system, &horizon).unwrap();
        let record = build
            .records
            .iter()
            .find(|r| {
                r.entity == EntityId::from("w1") && r.period == 0
            })
            .unwrap();
        assert_eq!(record.terms.len(), 1);
        assert_eq!(record.lower, 4.0);
        assert_eq!(record.upper, 4.0);
    }
}
