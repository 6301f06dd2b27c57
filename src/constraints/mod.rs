//! Constraint builders, one module per physical or economic rule, plus
//! the shared record types. Builders compose in any order once the
//! allocator has created the variables they reference; each one reports
//! the rows it added and pushes warnings into the build.

use crate::system::EntityId;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod balance;
pub mod hydro;
pub mod renewable;
pub mod thermal;

/// Closed set of constraint kinds. Duals are reported keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConstraintKind {
    MaxGeneration,
    MinGeneration,
    Ramp,
    CommitmentTransition,
    MinUptime,
    MinDowntime,
    WaterBalance,
    GenerationLinkage,
    AvailabilityLimit,
    SubmarketBalance,
}

impl ConstraintKind {
    /// Relative importance used when ordering diagnostics reports.
    pub fn priority(self) -> u8 {
        match self {
            Self::SubmarketBalance => 0,
            Self::WaterBalance => 1,
            Self::MaxGeneration | Self::MinGeneration => 2,
            Self::GenerationLinkage | Self::AvailabilityLimit => 3,
            Self::CommitmentTransition => 4,
            Self::MinUptime | Self::MinDowntime => 5,
            Self::Ramp => 6,
        }
    }
}

/// One row of the assembled problem, with enough of its algebraic form
/// retained to reconstruct it for diagnostics reports.
#[derive(Debug, Clone)]
pub struct ConstraintRecord {
    pub kind: ConstraintKind,
    pub name: String,
    pub entity: EntityId,
    pub period: usize,
    pub row: usize,
    /// (column, coefficient) pairs as handed to the backend.
    pub terms: Vec<(usize, f64)>,
    pub lower: f64,
    pub upper: f64,
    pub priority: u8,
    pub built_at: DateTime<Utc>,
}

impl ConstraintRecord {
    /// Human-readable algebraic form, used by the infeasibility report.
    pub fn render(&self) -> String {
        let body: Vec<String> = self
            .terms
            .iter()
            .map(|(col, coeff)| format!("{:+.4}*x{}", coeff, col))
            .collect();
        let body = body.join(" ");
        if self.lower == self.upper {
            format!("{}: {} == {:.4}", self.name, body, self.lower)
        } else {
            format!(
                "{}: {:.4} <= {} <= {:.4}",
                self.name, self.lower, body, self.upper
            )
        }
    }
}
