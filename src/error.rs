use crate::variables::QuantityKind;
use thiserror::Error;

/// Fatal model-building errors. Every variant names a condition that must
/// be fixed in the input data: none of them is ever defaulted silently.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("thermal plant '{0}' has no initial commitment in the boundary map")]
    MissingInitialCommitment(String),
    #[error("thermal plant '{0}' has no initial generation in the boundary map")]
    MissingInitialGeneration(String),
    #[error("hydro plant '{0}' has no initial storage in the boundary map")]
    MissingInitialStorage(String),
    #[error("no frozen commitment value for plant '{entity}' period {period}")]
    MissingFrozenCommitment { entity: String, period: usize },
    #[error("hydro cascade contains a directed cycle through: {0:?}")]
    CascadeCycle(Vec<String>),
    #[error("quantity {kind:?} is not declared for entity '{entity}'")]
    UndeclaredQuantity { kind: QuantityKind, entity: String },
    #[error("entity '{0}' referenced but not present in the system")]
    UnknownEntity(String),
    #[error("submarket '{id}' has {got} demand entries, horizon has {expected} periods")]
    DemandLengthMismatch {
        id: String,
        got: usize,
        expected: usize,
    },
    #[error("renewable '{id}' has {got} availability entries, horizon has {expected} periods")]
    ProfileLengthMismatch {
        id: String,
        got: usize,
        expected: usize,
    },
}

/// Top-level error for the public entry points.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// Catastrophic backend failures (native library faults, invalid problem
/// data rejected by HiGHS). Recoverable solve outcomes travel through
/// [`crate::result::SolveStatus`] instead.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("HiGHS rejected the assembled problem ({0})")]
    BackendRejected(String),
    #[error("HiGHS call '{0}' returned an error status")]
    BackendCall(String),
}
