use std::time::Duration;

use crate::result::{SolverResult, TwoStageResult};
use crate::system::{Horizon, System};

/// Helper function for displaying the greeting data for a dispatch run
pub fn show_greeting(system: &System, horizon: &Horizon) {
    println!("\n# Dispatch");
    println!("- Periods: {}", horizon.num_periods);
    println!("- Submarkets: {}", system.submarkets.len());
    println!("- Thermals: {}", system.thermals.len());
    println!("- Hydros: {}", system.hydros.len());
    println!("- Renewables: {}", system.renewables.len());
}

/// Helper function for displaying the stage table header
pub fn stage_table_header() {
    println!(
        "{0: ^12} | {1: ^12} | {2: ^15} | {3: ^10}",
        "stage", "status", "objective ($)", "time (s)"
    )
}

/// Helper function for displaying a divider for the stage table
pub fn stage_table_divider() {
    println!("--------------------------------------------------------")
}

/// Helper function for displaying one solved stage in the stage table
pub fn stage_table_row(stage: &str, result: &SolverResult) {
    let objective = match result.objective {
        Some(value) => format!("{:.4}", value),
        None => "-".to_string(),
    };
    println!(
        "{0: >12} | {1: >12} | {2: >15} | {3: >10.2}",
        stage,
        format!("{:?}", result.status),
        objective,
        result.wall_time.as_millis() as f64 / 1000.0
    )
}

pub fn price_summary(result: &TwoStageResult) {
    match &result.prices {
        Some(prices) => {
            println!("\n# Prices ($/MWh)");
            for row in prices.rows() {
                println!(
                    "{0: >12} | {1: >6} | {2: >12.4}",
                    row.submarket_id.to_string(),
                    row.period,
                    row.price
                );
            }
        }
        None => println!("\nNo prices are available for this run."),
    }
}

pub fn warning_lines(warnings: &[String]) {
    for warning in warnings {
        println!("WARNING: {}", warning);
    }
}

pub fn show_farewell(time: Duration) {
    println!("\nTotal time: {:.2} s", time.as_millis() as f64 / 1000.0)
}
