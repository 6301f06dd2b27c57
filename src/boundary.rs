//! Boundary conditions for the first period: the commitment state and
//! generation each thermal plant entered the horizon with, and the
//! storage each reservoir starts at. A missing entry is a configuration
//! error, never a default.

use crate::error::ConfigError;
use crate::system::EntityId;
use indexmap::IndexMap;

#[derive(Debug, Default)]
pub struct InitialConditions {
    commitment: IndexMap<EntityId, bool>,
    generation: IndexMap<EntityId, f64>,
    storage: IndexMap<EntityId, f64>,
}

impl InitialConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thermal(
        mut self,
        id: impl Into<EntityId>,
        committed: bool,
        generation: f64,
    ) -> Self {
        let id = id.into();
        self.commitment.insert(id.clone(), committed);
        self.generation.insert(id, generation);
        self
    }

    pub fn with_storage(
        mut self,
        id: impl Into<EntityId>,
        storage: f64,
    ) -> Self {
        self.storage.insert(id.into(), storage);
        self
    }

    pub fn commitment(&self, id: &EntityId) -> Result<bool, ConfigError> {
        self.commitment.get(id).copied().ok_or_else(|| {
            ConfigError::MissingInitialCommitment(id.to_string())
        })
    }

    pub fn generation(&self, id: &EntityId) -> Result<f64, ConfigError> {
        self.generation.get(id).copied().ok_or_else(|| {
            ConfigError::MissingInitialGeneration(id.to_string())
        })
    }

    pub fn storage(&self, id: &EntityId) -> Result<f64, ConfigError> {
        self.storage
            .get(id)
            .copied()
            .ok_or_else(|| ConfigError::MissingInitialStorage(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_lookup() {
        let boundary = InitialConditions::new()
            .with_thermal("t1", true, 40.0)
            .with_storage("h1", 80.0);
        let t1 = EntityId::from("t1");
        assert!(boundary.commitment(&t1).unwrap());
        assert_eq!(boundary.generation(&t1).unwrap(), 40.0);
        assert_eq!(boundary.storage(&EntityId::from("h1")).unwrap(), 80.0);
    }

    #[test]
    fn test_missing_entry_is_an_error() {
        let boundary = InitialConditions::new();
        let id = EntityId::from("t9");
        assert_eq!(
            boundary.commitment(&id),
            Err(ConfigError::MissingInitialCommitment("t9".to_string()))
        );
        assert_eq!(
            boundary.storage(&id),
            Err(ConfigError::MissingInitialStorage("t9".to_string()))
        );
    }
}
