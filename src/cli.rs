//! Command Line Interface

use std::{
    fs::create_dir_all,
    io,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use humanize_duration::{Truncate, prelude::DurationExt};
use rusty_money::Money;
use tracing::info;

use crate::{
    dataset::Dataset,
    report::{Report, write_frontier},
    scenario::{BAU_BUDGET, DatasetFile, Scenario, parse_money},
    solvers::{
        BudgetBasis, SolveConstraints, Solver, SolverResult,
        ilp::{ILPSolver, renderers::lp::LpRenderer},
    },
    sweep::BudgetSweep,
};

/// Coupon assignment optimiser
#[derive(Debug, Parser)]
#[command(name = "coupons", about = "Coupon assignment optimiser", long_about = None)]
pub struct Cli {
    /// Scenario file
    #[arg(
        short,
        long,
        global = true,
        env = "COUPONS_SCENARIO",
        default_value = "scenarios/default.yml"
    )]
    pub scenario: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a dataset and write it to a YAML file
    Generate(GenerateArgs),

    /// Compare the BAU policy against the optimised assignment
    Solve(SolveArgs),

    /// Solve across a range of budgets
    Sweep(SweepArgs),
}

/// Where the dataset comes from.
#[derive(Debug, Args)]
struct DatasetArgs {
    /// Number of customers (truncates a loaded dataset)
    #[arg(short)]
    n: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Load a dataset file instead of generating one
    #[arg(short, long)]
    dataset: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Output file
    #[arg(short, long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct SolveArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Budget: `bau` or an amount such as "2500.00 USD"
    #[arg(short, long)]
    budget: Option<String>,

    /// What the budget limits
    #[arg(long, value_enum)]
    basis: Option<BasisArg>,

    /// Write the ILP formulation in CPLEX LP format
    #[arg(long)]
    lp_out: Option<PathBuf>,

    /// Print a row per customer
    #[arg(long)]
    details: bool,
}

#[derive(Debug, Args)]
struct SweepArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Lowest budget (defaults to zero)
    #[arg(long)]
    from: Option<String>,

    /// Highest budget (defaults to twice the BAU spend)
    #[arg(long)]
    to: Option<String>,

    /// Number of budgets
    #[arg(long, default_value_t = 10)]
    steps: usize,

    /// What the budget limits
    #[arg(long, value_enum)]
    basis: Option<BasisArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BasisArg {
    FaceValue,
    ExpectedCost,
}

impl From<BasisArg> for BudgetBasis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::FaceValue => BudgetBasis::FaceValue,
            BasisArg::ExpectedCost => BudgetBasis::ExpectedCost,
        }
    }
}

impl Cli {
    /// Run the selected command, writing output to `out`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario cannot be loaded or any step fails.
    pub fn run(self, out: &mut impl io::Write) -> Result<()> {
        let scenario = Scenario::from_file(&self.scenario)
            .with_context(|| format!("loading scenario {}", self.scenario.display()))?;

        match self.command {
            Commands::Generate(args) => generate(scenario, &args, out),
            Commands::Solve(args) => solve(scenario, args, out),
            Commands::Sweep(args) => sweep(scenario, &args, out),
        }
    }
}

fn load_dataset(mut scenario: Scenario, args: &DatasetArgs) -> Result<(Scenario, Dataset)> {
    if let Some(seed) = args.seed {
        scenario.seed = seed;
    }

    let dataset = if let Some(path) = args.dataset.as_deref() {
        let dataset = DatasetFile::load(path)
            .with_context(|| format!("loading dataset {}", path.display()))?
            .to_dataset()?;

        match args.n {
            Some(n) => dataset.truncate(n)?,
            None => dataset,
        }
    } else {
        if let Some(n) = args.n {
            scenario.customers = n;
        }

        scenario.dataset()?
    };

    info!(
        customers = dataset.population().len(),
        coupons = dataset.coupons().len(),
        "loaded dataset"
    );

    Ok((scenario, dataset))
}

fn generate(scenario: Scenario, args: &GenerateArgs, out: &mut impl io::Write) -> Result<()> {
    let (_scenario, dataset) = load_dataset(scenario, &args.dataset)?;

    ensure_parent_dir(&args.out)?;

    DatasetFile::from_dataset(&dataset).save(&args.out)?;

    writeln!(
        out,
        "Wrote {} customers and {} coupons to {}",
        dataset.population().len(),
        dataset.coupons().len(),
        args.out.display()
    )?;

    Ok(())
}

fn solve(scenario: Scenario, args: SolveArgs, out: &mut impl io::Write) -> Result<()> {
    let (mut scenario, dataset) = load_dataset(scenario, &args.dataset)?;

    if let Some(budget) = args.budget {
        scenario.budget = budget;
    }

    if let Some(basis) = args.basis {
        scenario.budget_basis = basis.into();
    }

    let baseline = scenario.baseline_policy()?.assign(&dataset)?;
    let constraints = scenario.resolve_budget(&baseline)?;

    let start = Instant::now();

    let result = solve_optimised(&dataset, &constraints, args.lp_out.as_deref(), out)?;

    let elapsed = start.elapsed();

    Report::new(&dataset, &baseline, &result.plan)?
        .with_details(args.details)
        .write_to(&mut *out)?;

    writeln!(
        out,
        " Budget: {} ({:?})\n Solution: {}",
        constraints.budget,
        constraints.basis,
        elapsed.human(Truncate::Micro)
    )?;

    Ok(())
}

fn solve_optimised(
    dataset: &Dataset,
    constraints: &SolveConstraints,
    lp_out: Option<&Path>,
    out: &mut impl io::Write,
) -> Result<SolverResult> {
    let Some(path) = lp_out else {
        return Ok(ILPSolver::solve(dataset, constraints)?);
    };

    ensure_parent_dir(path)?;

    let mut renderer = LpRenderer::new(path);
    let result = ILPSolver::solve_with_observer(dataset, constraints, &mut renderer)?;

    renderer.write()?;

    writeln!(out, "Wrote formulation to {}", renderer.output_path().display())?;

    Ok(result)
}

fn sweep(scenario: Scenario, args: &SweepArgs, out: &mut impl io::Write) -> Result<()> {
    let (mut scenario, dataset) = load_dataset(scenario, &args.dataset)?;

    if let Some(basis) = args.basis {
        scenario.budget_basis = basis.into();
    }

    let currency = dataset.currency();

    let from = match args.from.as_deref() {
        Some(from) => parse_money(from, currency)?,
        None => Money::from_minor(0, currency),
    };

    let to = if let Some(to) = args.to.as_deref() {
        parse_money(to, currency)?
    } else {
        // Default to twice whatever BAU spends
        scenario.budget = BAU_BUDGET.to_string();

        let baseline = scenario.baseline_policy()?.assign(&dataset)?;
        let bau = scenario.resolve_budget(&baseline)?.budget;

        bau.add(bau)?
    };

    let sweep = BudgetSweep {
        from,
        to,
        steps: args.steps,
        basis: scenario.budget_basis,
    };

    let start = Instant::now();

    let points = sweep.run::<ILPSolver>(&dataset)?;

    write_frontier(&mut *out, &points)?;

    writeln!(out, " Sweep: {}", start.elapsed().human(Truncate::Micro))?;

    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::{TempDir, tempdir};
    use testresult::TestResult;

    use super::*;

    const SCENARIO: &str = r#"
currency: USD
seed: 3
customers: 6
cltv: { min: "50.00 USD", max: "500.00 USD" }
coupons: ["0.00 USD", "5.00 USD", "20.00 USD", { value: "40.00 USD", limit: 2 }]
"#;

    fn scenario_file() -> Result<(TempDir, PathBuf), std::io::Error> {
        let dir = tempdir()?;
        let path = dir.path().join("scenario.yml");

        fs::write(&path, SCENARIO)?;

        Ok((dir, path))
    }

    fn run(args: &[&str]) -> Result<String, Box<dyn std::error::Error>> {
        let cli = Cli::try_parse_from(args)?;
        let mut out = Vec::new();

        cli.run(&mut out)?;

        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn solve_prints_comparison() -> TestResult {
        let (_dir, path) = scenario_file()?;
        let scenario = path.to_string_lossy().to_string();

        let text = run(&["coupons", "--scenario", &scenario, "solve", "--details"])?;

        assert!(text.contains("Summary"));
        assert!(text.contains("Uplift:"));
        assert!(text.contains("customer-0005"));

        Ok(())
    }

    #[test]
    fn solve_writes_lp_file() -> TestResult {
        let (dir, path) = scenario_file()?;
        let scenario = path.to_string_lossy().to_string();
        let lp = dir.path().join("out").join("model.lp");
        let lp_arg = lp.to_string_lossy().to_string();

        run(&["coupons", "-s", &scenario, "solve", "--lp-out", &lp_arg, "-b", "100.00 USD"])?;

        let contents = fs::read_to_string(&lp)?;

        assert!(contents.contains("Maximize"));
        assert!(contents.contains(" budget: "));
        assert!(contents.contains(" limit_3: "));

        Ok(())
    }

    #[test]
    fn generated_dataset_can_be_solved() -> TestResult {
        let (dir, path) = scenario_file()?;
        let scenario = path.to_string_lossy().to_string();
        let dataset = dir.path().join("dataset.yml");
        let dataset_arg = dataset.to_string_lossy().to_string();

        let text = run(&["coupons", "-s", &scenario, "generate", "-o", &dataset_arg])?;

        assert!(text.contains("Wrote 6 customers and 4 coupons"));

        let text = run(&["coupons", "-s", &scenario, "solve", "-d", &dataset_arg, "-n", "3"])?;

        assert!(text.contains("Summary"));

        Ok(())
    }

    #[test]
    fn sweep_prints_frontier() -> TestResult {
        let (_dir, path) = scenario_file()?;
        let scenario = path.to_string_lossy().to_string();

        let text = run(&["coupons", "-s", &scenario, "sweep", "--steps", "3"])?;

        assert!(text.contains("Budget frontier"));
        assert!(text.contains("Sweep:"));

        Ok(())
    }

    #[test]
    fn missing_scenario_is_an_error() {
        let result = run(&["coupons", "-s", "does/not/exist.yml", "solve"]);

        assert!(result.is_err());
    }
}
