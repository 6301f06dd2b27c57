//! Directed cascade topology between hydro plants. Each edge carries the
//! water travel time from the upstream to the downstream plant; the
//! induced graph must be acyclic and is validated before any water
//! balance is written.

use crate::error::ConfigError;
use crate::system::{EntityId, Horizon, System};
use indexmap::IndexMap;

/// Upstream → downstream edge with its travel time already rounded to a
/// whole number of periods.
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeLink {
    pub upstream: EntityId,
    pub downstream: EntityId,
    pub delay_periods: usize,
}

/// The validated cascade graph: per-plant upstream links, topologically
/// sound by construction.
#[derive(Debug)]
pub struct Cascade {
    // downstream id -> links flowing into it
    upstream_links: IndexMap<EntityId, Vec<CascadeLink>>,
    order: Vec<EntityId>,
}

impl Cascade {
    /// Builds and validates the cascade from the hydro entities. Unknown
    /// downstream references and directed cycles are build-time errors.
    pub fn from_system(
        system: &System,
        horizon: &Horizon,
        warnings: &mut Vec<String>,
    ) -> Result<Self, ConfigError> {
        let mut upstream_links: IndexMap<EntityId, Vec<CascadeLink>> =
            IndexMap::new();
        for hydro in system.hydros.iter() {
            upstream_links.entry(hydro.id.clone()).or_default();
        }
        for hydro in system.hydros.iter() {
            let Some(downstream) = hydro.downstream_id.as_ref() else {
                continue;
            };
            if system.hydro(downstream).is_none() {
                return Err(ConfigError::UnknownEntity(
                    downstream.to_string(),
                ));
            }
            let delay_periods = horizon.round_to_periods(hydro.travel_hours);
            if hydro.travel_hours == 0.0 {
                warnings.push(format!(
                    "cascade link {} -> {} has zero travel time; \
                     releases arrive in the same period",
                    hydro.id, downstream
                ));
                log::warn!(
                    "cascade link {} -> {} has zero travel time",
                    hydro.id,
                    downstream
                );
            }
            upstream_links
                .entry(downstream.clone())
                .or_default()
                .push(CascadeLink {
                    upstream: hydro.id.clone(),
                    downstream: downstream.clone(),
                    delay_periods,
                });
        }

        let order = topological_order(&upstream_links)?;
        Ok(Self {
            upstream_links,
            order,
        })
    }

    /// Links delivering water into the given plant.
    pub fn links_into(&self, hydro: &EntityId) -> &[CascadeLink] {
        self.upstream_links
            .get(hydro)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Plant ids in upstream-to-downstream order.
    pub fn topological(&self) -> &[EntityId] {
        &self.order
    }
}

/// Kahn's algorithm over the upstream-link map. Returns the ids in an
/// order where every upstream plant precedes its downstream plant, or
/// the set of plants left on a cycle.
fn topological_order(
    upstream_links: &IndexMap<EntityId, Vec<CascadeLink>>,
) -> Result<Vec<EntityId>, ConfigError> {
    let mut indegree: IndexMap<&EntityId, usize> = upstream_links
        .iter()
        .map(|(id, links)| (id, links.len()))
        .collect();
    let mut ready: Vec<&EntityId> = indegree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order = Vec::with_capacity(upstream_links.len());

    while let Some(id) = ready.pop() {
        order.push(id.clone());
        for (downstream, links) in upstream_links.iter() {
            if links.iter().any(|l| &l.upstream == id) {
                let d = indegree
                    .get_mut(downstream)
                    .expect("downstream missing from indegree map");
                *d -= links.iter().filter(|l| &l.upstream == id).count();
                if *d == 0 {
                    ready.push(downstream);
                }
            }
        }
    }

    if order.len() != upstream_links.len() {
        let stuck: Vec<String> = indegree
            .iter()
            .filter(|(id, _)| !order.contains(*id))
            .map(|(id, _)| id.to_string())
            .collect();
        return Err(ConfigError::CascadeCycle(stuck));
    }
    Ok(order)
}
