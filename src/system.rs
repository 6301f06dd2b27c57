//! Entity collection for the dispatch problem. Records are created once,
//! pre-validated by the caller, and treated as immutable afterwards. All
//! cross-references are by stable identifier, never by position.

use serde::Serialize;
use std::fmt;

/// Stable identifier shared by every entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The ordered period sequence over which the problem is built. Periods
/// share a single duration; travel times and ramp limits given in hours
/// are converted through it.
#[derive(Debug, Clone)]
pub struct Horizon {
    pub num_periods: usize,
    pub period_hours: f64,
}

impl Horizon {
    pub fn new(num_periods: usize, period_hours: f64) -> Self {
        Self {
            num_periods,
            period_hours,
        }
    }

    pub fn periods(&self) -> std::ops::Range<usize> {
        0..self.num_periods
    }

    /// Converts a duration in hours to a whole period count, rounding to
    /// the nearest period.
    pub fn round_to_periods(&self, hours: f64) -> usize {
        (hours / self.period_hours).round() as usize
    }
}

/// A market zone. The energy balance written for it is the constraint
/// whose dual becomes the zonal marginal price.
#[derive(Debug)]
pub struct Submarket {
    pub id: EntityId,
    /// Per-period demand in MW; length must equal the horizon.
    pub demand: Vec<f64>,
    /// Per-zone deficit penalty; `None` falls back to the shared default
    /// in the solve options.
    pub deficit_cost: Option<f64>,
}

impl Submarket {
    pub fn new(
        id: impl Into<EntityId>,
        demand: Vec<f64>,
        deficit_cost: Option<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            demand,
            deficit_cost,
        }
    }
}

/// A directed interconnection between two submarkets, with independent
/// capacities per direction and a loss factor applied on delivery.
#[derive(Debug)]
pub struct Interconnection {
    pub id: EntityId,
    pub source_id: EntityId,
    pub target_id: EntityId,
    pub direct_capacity: f64,
    pub reverse_capacity: f64,
    /// Fraction of transported energy lost; the receiving side credits
    /// `flow * (1 - loss_factor)`.
    pub loss_factor: f64,
}

impl Interconnection {
    pub fn new(
        id: impl Into<EntityId>,
        source_id: impl Into<EntityId>,
        target_id: impl Into<EntityId>,
        direct_capacity: f64,
        reverse_capacity: f64,
        loss_factor: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            direct_capacity,
            reverse_capacity,
            loss_factor,
        }
    }
}

/// A thermal plant with a binary commitment state machine.
#[derive(Debug)]
pub struct Thermal {
    pub id: EntityId,
    pub submarket_id: EntityId,
    /// Fuel cost in currency/MWh.
    pub cost: f64,
    pub startup_cost: f64,
    pub shutdown_cost: f64,
    /// Minimum stable output when committed, in MW.
    pub min_generation: f64,
    pub max_generation: f64,
    /// Ramp limits in MW/h; `f64::INFINITY` disables them.
    pub ramp_up: f64,
    pub ramp_down: f64,
    /// Minimum consecutive on/off durations, in hours.
    pub min_uptime: f64,
    pub min_downtime: f64,
}

impl Thermal {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<EntityId>,
        submarket_id: impl Into<EntityId>,
        cost: f64,
        startup_cost: f64,
        shutdown_cost: f64,
        min_generation: f64,
        max_generation: f64,
        ramp_up: f64,
        ramp_down: f64,
        min_uptime: f64,
        min_downtime: f64,
    ) -> Self {
        Self {
            id: id.into(),
            submarket_id: submarket_id.into(),
            cost,
            startup_cost,
            shutdown_cost,
            min_generation,
            max_generation,
            ramp_up,
            ramp_down,
            min_uptime,
            min_downtime,
        }
    }

    /// A plant with no commitment frictions: free ramps, no minimum
    /// output, no startup costs. Useful for pricing-only studies.
    pub fn simple(
        id: impl Into<EntityId>,
        submarket_id: impl Into<EntityId>,
        cost: f64,
        max_generation: f64,
    ) -> Self {
        Self::new(
            id,
            submarket_id,
            cost,
            0.0,
            0.0,
            0.0,
            max_generation,
            f64::INFINITY,
            f64::INFINITY,
            0.0,
            0.0,
        )
    }
}

/// A hydro reservoir plant. The cascade topology is given by
/// `downstream_id` plus the water travel time to that plant.
#[derive(Debug)]
pub struct Hydro {
    pub id: EntityId,
    pub submarket_id: EntityId,
    pub downstream_id: Option<EntityId>,
    /// Water travel time to the downstream plant, in hours; rounded to
    /// the nearest whole period when building the balance.
    pub travel_hours: f64,
    /// MW produced per unit of outflow.
    pub productivity: f64,
    pub min_storage: f64,
    pub max_storage: f64,
    pub min_outflow: f64,
    pub max_outflow: f64,
    pub spill_penalty: f64,
    /// Terminal value of stored water, credited on the final-period
    /// storage in the objective.
    pub water_value: f64,
    /// Per-period incremental inflow; `None` is accepted as an explicit,
    /// warned zero series.
    pub inflow: Option<Vec<f64>>,
}

impl Hydro {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<EntityId>,
        submarket_id: impl Into<EntityId>,
        downstream_id: Option<EntityId>,
        travel_hours: f64,
        productivity: f64,
        min_storage: f64,
        max_storage: f64,
        min_outflow: f64,
        max_outflow: f64,
        spill_penalty: f64,
        water_value: f64,
        inflow: Option<Vec<f64>>,
    ) -> Self {
        Self {
            id: id.into(),
            submarket_id: submarket_id.into(),
            downstream_id,
            travel_hours,
            productivity,
            min_storage,
            max_storage,
            min_outflow,
            max_outflow,
            spill_penalty,
            water_value,
            inflow,
        }
    }
}

/// A renewable plant limited by an availability profile. Curtailment is
/// a declared quantity only when `curtailable` is set.
#[derive(Debug)]
pub struct Renewable {
    pub id: EntityId,
    pub submarket_id: EntityId,
    pub curtailable: bool,
    /// Available output per period, in MW.
    pub availability: Vec<f64>,
}

impl Renewable {
    pub fn new(
        id: impl Into<EntityId>,
        submarket_id: impl Into<EntityId>,
        curtailable: bool,
        availability: Vec<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            submarket_id: submarket_id.into(),
            curtailable,
            availability,
        }
    }
}

/// The full entity collection handed to the model builders.
#[derive(Debug)]
pub struct System {
    pub submarkets: Vec<Submarket>,
    pub interconnections: Vec<Interconnection>,
    pub thermals: Vec<Thermal>,
    pub hydros: Vec<Hydro>,
    pub renewables: Vec<Renewable>,
}

impl System {
    pub fn new(
        submarkets: Vec<Submarket>,
        interconnections: Vec<Interconnection>,
        thermals: Vec<Thermal>,
        hydros: Vec<Hydro>,
        renewables: Vec<Renewable>,
    ) -> Self {
        Self {
            submarkets,
            interconnections,
            thermals,
            hydros,
            renewables,
        }
    }

    pub fn submarket(&self, id: &EntityId) -> Option<&Submarket> {
        self.submarkets.iter().find(|s| &s.id == id)
    }

    pub fn hydro(&self, id: &EntityId) -> Option<&Hydro> {
        self.hydros.iter().find(|h| &h.id == id)
    }

    pub fn thermal(&self, id: &EntityId) -> Option<&Thermal> {
        self.thermals.iter().find(|t| &t.id == id)
    }

    /// Thermal plants attached to a submarket.
    pub fn thermals_in(
        &self,
        submarket: &EntityId,
    ) -> impl Iterator<Item = &Thermal> {
        let id = submarket.clone();
        self.thermals.iter().filter(move |t| t.submarket_id == id)
    }

    pub fn hydros_in(
        &self,
        submarket: &EntityId,
    ) -> impl Iterator<Item = &Hydro> {
        let id = submarket.clone();
        self.hydros.iter().filter(move |h| h.submarket_id == id)
    }

    pub fn renewables_in(
        &self,
        submarket: &EntityId,
    ) -> impl Iterator<Item = &Renewable> {
        let id = submarket.clone();
        self.renewables.iter().filter(move |r| r.submarket_id == id)
    }

    /// Interconnections delivering into a submarket.
    pub fn lines_into(
        &self,
        submarket: &EntityId,
    ) -> impl Iterator<Item = &Interconnection> {
        let id = submarket.clone();
        self.interconnections
            .iter()
            .filter(move |l| l.target_id == id)
    }

    /// Interconnections drawing from a submarket.
    pub fn lines_from(
        &self,
        submarket: &EntityId,
    ) -> impl Iterator<Item = &Interconnection> {
        let id = submarket.clone();
        self.interconnections
            .iter()
            .filter(move |l| l.source_id == id)
    }

    /// A single-zone system with two thermals and one hydro, mirroring
    /// the smallest case the solver is exercised with in tests.
    pub fn example() -> Self {
        let submarkets =
            vec![Submarket::new("se", vec![50.0, 50.0], Some(500.0))];
        let thermals = vec![
            Thermal::simple("t1", "se", 5.0, 15.0),
            Thermal::simple("t2", "se", 10.0, 15.0),
        ];
        let hydros = vec![Hydro::new(
            "h1",
            "se",
            None,
            0.0,
            1.0,
            0.0,
            100.0,
            0.0,
            60.0,
            0.01,
            0.0,
            Some(vec![10.0, 10.0]),
        )];
        Self::new(submarkets, vec![], thermals, hydros, vec![])
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_create_example_system() {
        let system = System::example();
        assert_eq!(system.submarkets.len(), 1);
        assert_eq!(system.interconnections.len(), 0);
        assert_eq!(system.thermals.len(), 2);
        assert_eq!(system.hydros.len(), 1);
        assert_eq!(system.renewables.len(), 0);
    }

    #[test]
    fn test_lookup_by_identity() {
        let system = System::example();
        let id = EntityId::from("t2");
        assert_eq!(system.thermal(&id).unwrap().cost, 10.0);
        assert!(system.thermal(&EntityId::from("missing")).is_none());
    }

    #[test]
    fn test_entities_attached_to_submarket() {
        let system = System::example();
        let zone = EntityId::from("se");
        assert_eq!(system.thermals_in(&zone).count(), 2);
        assert_eq!(system.hydros_in(&zone).count(), 1);
        assert_eq!(system.lines_into(&zone).count(), 0);
    }

    #[test]
    fn test_horizon_rounding() {
        let horizon = Horizon::new(4, 1.0);
        assert_eq!(horizon.round_to_periods(2.0), 2);
        assert_eq!(horizon.round_to_periods(2.4), 2);
        assert_eq!(horizon.round_to_periods(2.5), 3);
        let halfhour = Horizon::new(48, 0.5);
        assert_eq!(halfhour.round_to_periods(2.0), 4);
    }
}
