pub mod boundary;
pub mod cascade;
pub mod constraints;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
mod extract;
mod log;
pub mod model;
mod objective;
pub mod result;
mod solver;
pub mod system;
pub mod variables;

pub use boundary::InitialConditions;
pub use dispatch::{round_commitment, solve_two_stage, SolveOptions};
pub use error::{ConfigError, Error, SolverError};
pub use result::{
    CostBreakdown, PriceTable, SolveStatus, SolverResult, TwoStageResult,
};
pub use system::{
    Horizon, Hydro, Interconnection, Renewable, Submarket, System, Thermal,
};

use std::time::Instant;

/// Solves the two-stage dispatch and prints a run report to standard
/// output. Library callers wanting the result without the report use
/// [`solve_two_stage`] directly.
pub fn run(
    system: &System,
    horizon: &Horizon,
    boundary: &InitialConditions,
    options: &SolveOptions,
) -> Result<TwoStageResult, Error> {
    log::show_greeting(system, horizon);

    let begin = Instant::now();
    let result = solve_two_stage(system, horizon, boundary, options)?;

    println!();
    log::stage_table_header();
    log::stage_table_divider();
    log::stage_table_row("commitment", &result.commitment);
    if let Some(pricing) = &result.pricing {
        log::stage_table_row("pricing", pricing);
    }
    log::price_summary(&result);
    log::warning_lines(&result.warnings);

    if needs_diagnosis(result.status()) {
        let build = model::build_model(
            system, horizon, boundary, options, None,
        )?;
        let report =
            diagnostics::diagnose(&build, system, options)?;
        println!("\n# Infeasibility report");
        println!("- Root causes: {:?}", report.root_causes);
        for member in &report.members {
            println!("- {}", member);
        }
        for note in &report.notes {
            println!("- {}", note);
        }
    }

    log::show_farewell(begin.elapsed());

    Ok(result)
}

/// Whether a finished run warrants an infeasibility diagnosis. Both
/// infeasible and unbounded outcomes do; an unbounded model usually
/// hides a sign error in a cost coefficient.
fn needs_diagnosis(status: SolveStatus) -> bool {
    matches!(
        status,
        SolveStatus::Infeasible | SolveStatus::Unbounded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnosis_covers_infeasible_and_unbounded() {
        assert!(needs_diagnosis(SolveStatus::Infeasible));
        assert!(needs_diagnosis(SolveStatus::Unbounded));
        assert!(!needs_diagnosis(SolveStatus::Optimal));
        assert!(!needs_diagnosis(SolveStatus::TimeLimit));
        assert!(!needs_diagnosis(SolveStatus::NotSolved));
    }
}
