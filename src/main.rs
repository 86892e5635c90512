use anyhow::Context;
use sharpe_allocator::{optimize_portfolio, OptimizationRequest};
use std::{env, fs::File, io::Write, time::Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REQUEST_PATH_VAR: &str = "PORTFOLIO_REQUEST_PATH";
const REPORT_PATH_VAR: &str = "PORTFOLIO_REPORT_PATH";

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let request_path = env::args()
        .nth(1)
        .or_else(|| env::var(REQUEST_PATH_VAR).ok())
        .with_context(|| {
            format!("Pass a request file as the first argument or set {REQUEST_PATH_VAR}")
        })?;

    let file = File::open(&request_path)
        .with_context(|| format!("Failed to open request file `{request_path}`"))?;
    let request: OptimizationRequest = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse request file `{request_path}`"))?;

    let start = Instant::now();
    let report = optimize_portfolio(&request).context("Optimization failed")?;
    info!("Optimization finished in {:.2?}", start.elapsed());

    if !report.is_feasible() {
        warn!("No feasible portfolio found; the budget is too small for the given prices.");
    }

    println!("Best portfolio found: {:?}", report.best_portfolio);
    match report.fitness.value() {
        Some(fitness) => println!("Fitness of the best portfolio: {fitness:.6}"),
        None => println!("Fitness of the best portfolio: infeasible"),
    }
    println!("Total portfolio cost: {:.2}", report.total_cost);
    for allocation in report.allocations.iter().filter(|a| a.quantity > 0) {
        println!(
            "  {:<8} x{:<5} {:>12.2} ({:.1}%)",
            allocation.ticker,
            allocation.quantity,
            allocation.cost,
            allocation.cost_fraction * 100.
        );
    }

    if let Ok(report_path) = env::var(REPORT_PATH_VAR) {
        let json = serde_json::to_string_pretty(&report)?;
        let mut f = File::create(&report_path)
            .with_context(|| format!("Failed to create report file `{report_path}`"))?;
        f.write_all(json.as_bytes())?;
        info!("Report written to {}", report_path);
    }

    Ok(())
}
