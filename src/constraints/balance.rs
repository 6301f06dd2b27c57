//! Submarket energy balance: generation plus net imports plus deficit
//! equals demand, per zone and period. The dual of this equality, after
//! rescaling, is the zonal marginal price.

use crate::constraints::ConstraintKind;
use crate::error::ConfigError;
use crate::model::ModelBuild;
use crate::system::{Horizon, System};
use crate::variables::QuantityKind;

pub fn build(
    build: &mut ModelBuild,
    system: &System,
    horizon: &Horizon,
    allow_deficit: bool,
) -> Result<usize, ConfigError> {
    let mut rows = 0;
    for submarket in system.submarkets.iter() {
        for t in horizon.periods() {
            let mut terms: Vec<(usize, f64)> = vec![];

            for thermal in system.thermals_in(&submarket.id) {
                let g = build.allocator.col(
                    QuantityKind::Generation,
                    &thermal.id,
                    t,
                )?;
                terms.push((g, 1.0));
            }
            for hydro in system.hydros_in(&submarket.id) {
                let g = build.allocator.col(
                    QuantityKind::Generation,
                    &hydro.id,
                    t,
                )?;
                terms.push((g, 1.0));
            }
            for renewable in system.renewables_in(&submarket.id) {
                let g = build.allocator.col(
                    QuantityKind::Generation,
                    &renewable.id,
                    t,
                )?;
                terms.push((g, 1.0));
            }

            // imports are credited net of losses; exports leave in full
            for line in system.lines_into(&submarket.id) {
                let direct = build.allocator.col(
                    QuantityKind::ExchangeDirect,
                    &line.id,
                    t,
                )?;
                let reverse = build.allocator.col(
                    QuantityKind::ExchangeReverse,
                    &line.id,
                    t,
                )?;
                terms.push((direct, 1.0 - line.loss_factor));
                terms.push((reverse, -1.0));
            }
            for line in system.lines_from(&submarket.id) {
                let direct = build.allocator.col(
                    QuantityKind::ExchangeDirect,
                    &line.id,
                    t,
                )?;
                let reverse = build.allocator.col(
                    QuantityKind::ExchangeReverse,
                    &line.id,
                    t,
                )?;
                terms.push((direct, -1.0));
                terms.push((reverse, 1.0 - line.loss_factor));
            }

            if allow_deficit {
                let deficit = build.allocator.col(
                    QuantityKind::Deficit,
                    &submarket.id,
                    t,
                )?;
                terms.push((deficit, 1.0));
            }

            let demand = submarket.demand[t];
            build.add_constraint(
                ConstraintKind::SubmarketBalance,
                &submarket.id,
                t,
                demand,
                demand,
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
    use crate::system::{
        EntityId, Interconnection, Submarket, System, Thermal,
    };

    fn two_zone_system() -> System {
        System::new(
            vec![
                Submarket::new("a", vec![100.0], None),
                Submarket::new("b", vec![50.0], None),
            ],
            vec![Interconnection::new("ab", "a", "b", 80.0, 40.0, 0.05)],
            vec![
                Thermal::simple("t1", "a", 50.0, 200.0),
                Thermal::simple("t2", "b", 80.0, 100.0),
            ],
            vec![],
            vec![],
        )
    }

    #[test]
    fn test_balance_per_zone_and_period() {
        let system = two_zone_system();
        let horizon = Horizon::new(1, 1.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        let rows =
            super::build(&mut build, &system, &horizon, true).unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_import_credited_net_of_losses() {
        let system = two_zone_system();
        let horizon = Horizon::new(1, 1.0);
        let mut build = ModelBuild::empty(&system, &horizon, None).unwrap();
        super::build(&mut build, &system, &horizon, true).unwrap();

        let line = EntityId::from("ab");
        let direct = build
            .allocator
            .col(QuantityKind::ExchangeDirect, &line, 0)
            .unwrap();
        let receiving = build
            .records
            .iter()
            .find(|r| r.entity == EntityId::from("b"))
            .unwrap();
        let factor = receiving
            .terms
            .iter()
            .find(|(c, _)| *c == direct)
            .unwrap()
            .1;
        assert!((factor - 0.95).abs() < 1e-12);

        let sending = build
            .records
            .iter()
            .find(|r| r.entity == EntityId::from("a"))
            .unwrap();
        let factor = sending
            .terms
            .iter()
            .find(|(c, _)| *c == direct)
            .unwrap()
            .1;
        assert_eq!(factor, -1.0);
    }

    #[test]
    fn test_deficit_omitted_when_disabled() {
        let system = two_zone_system();
        let horizon = Horizon::new(1, 1.0);
        let mut build =
            ModelBuild::empty_without_deficit(&system, &horizon).unwrap();
        super::build(&mut build, &system, &horizon, false).unwrap();
        let zone_a = build
            .records
            .iter()
            .find(|r| r.entity == EntityId::from("a"))
            .unwrap();
        // t1 + line direct + line reverse, no deficit column
        assert_eq!(zone_a.terms.len(), 3);
    }
}
