use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use fleetplan::core::{PlannerPolicy, ShortfallRounding, run_plan, verify_plan};
use fleetplan::data::{load_inputs, read_plan, write_plan};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliShortfallRounding {
    FloorPlusOne,
    Ceiling,
}

impl From<CliShortfallRounding> for ShortfallRounding {
    fn from(value: CliShortfallRounding) -> Self {
        match value {
            CliShortfallRounding::FloorPlusOne => ShortfallRounding::FloorPlusOne,
            CliShortfallRounding::Ceiling => ShortfallRounding::Ceiling,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "fleetplan",
    about = "Greedy multi-year fleet transition planner with an independent plan verifier"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Plan {
        data_dir: PathBuf,
        #[arg(long, default_value = "plan.csv", help = "Where to write the operation records")]
        out: PathBuf,
        #[arg(
            long,
            value_enum,
            default_value_t = CliShortfallRounding::FloorPlusOne,
            help = "How a distance shortfall rounds into a purchase count"
        )]
        shortfall_rounding: CliShortfallRounding,
    },
    Verify {
        data_dir: PathBuf,
        plan: PathBuf,
    },
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fleetplan=info")),
        )
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Plan {
            data_dir,
            out,
            shortfall_rounding,
        } => plan_command(&data_dir, &out, shortfall_rounding.into()),
        Command::Verify { data_dir, plan } => verify_command(&data_dir, &plan),
        Command::Serve { port } => fleetplan::api::run_http_server(port)
            .await
            .context("server error"),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn plan_command(data_dir: &Path, out: &Path, rounding: ShortfallRounding) -> anyhow::Result<()> {
    let inputs = load_inputs(data_dir)
        .with_context(|| format!("loading tables from {}", data_dir.display()))?;
    let outcome = run_plan(
        &inputs,
        PlannerPolicy {
            shortfall_rounding: rounding,
        },
    )?;
    write_plan(out, &outcome.records)?;

    for summary in &outcome.years {
        println!(
            "{}: cost {:.2}, emissions {:.2} (budget {:.2})",
            summary.year, summary.cost, summary.emissions, summary.carbon_budget
        );
    }
    println!(
        "{} operation records written to {} (total cost {:.2}, total emissions {:.2})",
        outcome.records.len(),
        out.display(),
        outcome.total_cost,
        outcome.total_emissions
    );
    Ok(())
}

fn verify_command(data_dir: &Path, plan: &Path) -> anyhow::Result<()> {
    let inputs = load_inputs(data_dir)
        .with_context(|| format!("loading tables from {}", data_dir.display()))?;
    let records =
        read_plan(plan).with_context(|| format!("reading plan from {}", plan.display()))?;
    let report = verify_plan(&inputs, &records)?;

    if report.is_clean() {
        println!("No violations detected across {} records.", records.len());
        return Ok(());
    }

    for violation in &report.emission {
        println!(
            "Emission violation: year {}, emissions {:.2}, limit {:.2}",
            violation.year, violation.emissions, violation.limit
        );
    }
    for violation in &report.demand {
        println!(
            "Demand violation: year {}, size {:?}, bucket {:?}, covered {:.2} of {:.2} km",
            violation.year,
            violation.size,
            violation.distance_bucket,
            violation.covered_km,
            violation.demand_km
        );
    }
    for violation in &report.turnover {
        println!(
            "Sell violation: year {}, sold {}, allowed {}",
            violation.year, violation.sold, violation.allowed
        );
    }
    for violation in &report.negative_counts {
        println!(
            "Negative count: year {}, vehicle {}, count {}",
            violation.year, violation.vehicle_id, violation.num_vehicles
        );
    }
    bail!("{} constraint violations detected", report.violation_count());
}
