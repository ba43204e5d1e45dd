//! gramgrow Command Line Interface
//!
//! Grows a bordered Hessian over LibSVM data one admission at a time,
//! compares the chunked and direct strategies, and writes configuration
//! files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use gramgrow::core::{GramError, KernelFamily, Residency, Result, UpdateConfig, UpdateStrategy};
use gramgrow::persistence::{self, GrowthReport, StepRecord};
use gramgrow::utils::{diagnostics, memory, validation};
use gramgrow::{ActiveSetSession, LibSVMDataset, Matrix, TrainingData};
use log::{error, info};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "gramgrow")]
#[command(about = "Incremental bordered Hessian growth for kernel SVM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Grow a Hessian over a dataset and report each step
    Grow(GrowArgs),
    /// Check that the chunked and direct strategies agree
    Compare(CompareArgs),
    /// Write an update configuration file
    InitConfig(InitConfigArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliKernel {
    Linear,
    Polynomial,
    Rbf,
    Sigmoid,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliStrategy {
    /// Stream error rows through a bounded working set
    Chunked,
    /// Read error rows from the label-weighted kernel matrix
    Direct,
}

impl From<CliStrategy> for UpdateStrategy {
    fn from(cli_strategy: CliStrategy) -> Self {
        match cli_strategy {
            CliStrategy::Chunked => UpdateStrategy::Chunked,
            CliStrategy::Direct => UpdateStrategy::Direct,
        }
    }
}

/// Update configuration; flags override values read from `--config`
#[derive(Args, Clone, Debug, Default)]
struct ConfigArgs {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kernel family
    #[arg(long)]
    kernel: Option<CliKernel>,

    /// Kernel gamma
    #[arg(long)]
    gamma: Option<f64>,

    /// Polynomial degree
    #[arg(long)]
    degree: Option<u32>,

    /// Polynomial/sigmoid offset
    #[arg(long)]
    coef: Option<f64>,

    /// Box constant C
    #[arg(short = 'C', long)]
    c: Option<f64>,

    /// Error rows per chunk
    #[arg(long)]
    set_size: Option<usize>,

    /// Update strategy
    #[arg(long)]
    strategy: Option<CliStrategy>,

    /// Always compact kernel-matrix columns in place (direct strategy)
    #[arg(long)]
    contigify: bool,

    /// Largest scattered column copy in elements (direct strategy)
    #[arg(long)]
    gather_budget: Option<usize>,

    /// Keep every matrix in device residency
    #[arg(long)]
    device: bool,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<UpdateConfig> {
        let mut config = match &self.config {
            Some(path) => {
                info!("Loading configuration from {path:?}");
                persistence::load_config(path)?
            }
            None => UpdateConfig::default(),
        };

        config.kernel = self.kernel_family(config.kernel);
        if let Some(c) = self.c {
            config.c = c;
        }
        if let Some(set_size) = self.set_size {
            config.set_size = set_size;
        }
        if let Some(strategy) = self.strategy {
            config.strategy = strategy.into();
        }
        if self.contigify {
            config.always_contigify = true;
        }
        if self.gather_budget.is_some() {
            config.gather_budget = self.gather_budget;
        }
        if self.device {
            config.residency = Residency::Device;
        }

        config.validate()?;
        Ok(config)
    }

    /// Apply kernel flags on top of `base`; a new family starts from gamma 1, degree 3, coef 0
    fn kernel_family(&self, base: KernelFamily) -> KernelFamily {
        let (base_gamma, base_degree, base_coef) = match base {
            KernelFamily::Linear => (1.0, 3, 0.0),
            KernelFamily::Polynomial {
                degree,
                gamma,
                coef,
            } => (gamma, degree, coef),
            KernelFamily::Rbf { gamma } => (gamma, 3, 0.0),
            KernelFamily::Sigmoid { gamma, coef } => (gamma, 3, coef),
        };
        let gamma = self.gamma.unwrap_or(base_gamma);
        let degree = self.degree.unwrap_or(base_degree);
        let coef = self.coef.unwrap_or(base_coef);

        let kernel = match (self.kernel, base) {
            (Some(kernel), _) => kernel,
            (None, KernelFamily::Linear) => CliKernel::Linear,
            (None, KernelFamily::Polynomial { .. }) => CliKernel::Polynomial,
            (None, KernelFamily::Rbf { .. }) => CliKernel::Rbf,
            (None, KernelFamily::Sigmoid { .. }) => CliKernel::Sigmoid,
        };
        match kernel {
            CliKernel::Linear => KernelFamily::Linear,
            CliKernel::Polynomial => KernelFamily::Polynomial {
                degree,
                gamma,
                coef,
            },
            CliKernel::Rbf => KernelFamily::Rbf { gamma },
            CliKernel::Sigmoid => KernelFamily::Sigmoid { gamma, coef },
        }
    }
}

#[derive(Args)]
struct GrowArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Rows admitted per step
    #[arg(short, long, default_value = "2")]
    batch: usize,

    /// Stop after this many steps (default: admit every row)
    #[arg(long)]
    steps: Option<usize>,

    /// Write the growth report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct CompareArgs {
    /// Training data file (LibSVM format)
    #[arg(long)]
    data: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Rows admitted per step
    #[arg(short, long, default_value = "2")]
    batch: usize,

    /// Stop after this many steps (default: admit every row)
    #[arg(long)]
    steps: Option<usize>,

    /// Largest acceptable relative difference between the two Hessians
    #[arg(long, default_value = "1e-9")]
    tolerance: f64,
}

#[derive(Args)]
struct InitConfigArgs {
    /// Output configuration file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Grow(args) => grow_command(args),
        Commands::Compare(args) => compare_command(args),
        Commands::InitConfig(args) => init_config_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn grow_command(args: GrowArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let data = load_training_data(&args.data, config.residency)?;

    info!(
        "Growing with {} kernel, C={}, set size {}",
        config.kernel.name(),
        config.c,
        config.set_size
    );
    let (report, _) = grow(&data, config, args.batch, args.steps)?;

    if let Some(output) = &args.output {
        report.save_to_file(output)?;
        info!("Report saved to: {output:?}");
    }
    report.print_summary();
    Ok(())
}

fn compare_command(args: CompareArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let data = load_training_data(&args.data, config.residency)?;

    let chunked = config.clone().with_strategy(UpdateStrategy::Chunked);
    let direct = config.with_strategy(UpdateStrategy::Direct);
    let (_, chunked_hessian) = grow(&data, chunked, args.batch, args.steps)?;
    let (direct_report, direct_hessian) = grow(&data, direct, args.batch, args.steps)?;

    let difference = diagnostics::max_relative_difference(
        chunked_hessian.as_array().view(),
        direct_hessian.as_array().view(),
    );

    println!("=== Strategy Comparison ===");
    println!("Hessian Dimension: {}", direct_report.final_dim);
    println!("Max Relative Difference: {difference:.3e}");
    println!("Tolerance: {:.3e}", args.tolerance);

    if difference > args.tolerance {
        return Err(GramError::InvalidParameter(format!(
            "chunked and direct Hessians differ by {difference:.3e}, above tolerance {:.3e}",
            args.tolerance
        )));
    }
    println!("Strategies agree");
    Ok(())
}

fn init_config_command(args: InitConfigArgs) -> Result<()> {
    let config = args.config.resolve()?;
    persistence::save_config(&config, &args.output)?;
    println!("Configuration written to {:?}", args.output);
    Ok(())
}

fn load_training_data(path: &Path, residency: Residency) -> Result<TrainingData> {
    info!("Loading dataset from {path:?}");
    let dataset = LibSVMDataset::from_file(path)?;
    let data = TrainingData::from_dataset(&dataset)?.in_residency(residency);

    let (positive, negative, ratio) = validation::check_label_balance(data.labels());
    info!(
        "Loaded {} samples with {} dimensions ({positive} positive, {negative} negative, ratio {ratio:.2})",
        data.len(),
        data.dim()
    );
    Ok(data)
}

/// Admit rows in index order, recording diagnostics after every step
fn grow(
    data: &TrainingData,
    config: UpdateConfig,
    batch: usize,
    steps: Option<usize>,
) -> Result<(GrowthReport, Matrix)> {
    if batch == 0 {
        return Err(GramError::InvalidParameter(
            "batch must be positive".to_string(),
        ));
    }

    let peak = memory::estimate_chunk_memory(data.len() + 1, data.dim(), config.set_size);
    info!("Chunk working set up to {} KiB", peak / 1024);

    let mut report = GrowthReport::new(config.clone(), data.len(), data.dim());
    let mut session = ActiveSetSession::new(data, config)?;
    let error_rows: Vec<usize> = (0..data.len()).collect();

    for range in admission_batches(data.len(), batch, steps) {
        let new: Vec<usize> = range.collect();
        let before = session.hessian().clone();
        let outcome = session.admit(&new, &error_rows)?;
        let hessian = session.hessian();
        let step = StepRecord {
            admitted: new.len(),
            outcome,
            symmetry_error: diagnostics::max_asymmetry(hessian),
            leading_block_preserved: diagnostics::leading_block_identical(&before, hessian),
        };
        info!(
            "Step {}: {} -> {} (regularization {:.3e})",
            report.steps.len() + 1,
            step.outcome.previous_dim,
            step.outcome.new_dim,
            step.outcome.regularization
        );
        report.record(step);
    }

    if session.updater().contigify_latched() {
        info!("Kernel columns were compacted in place after a gather failure");
    }
    Ok((report, session.hessian().clone()))
}

/// Consecutive index ranges of at most `batch` rows, optionally capped at `steps`
fn admission_batches(n: usize, batch: usize, steps: Option<usize>) -> Vec<Range<usize>> {
    (0..n)
        .step_by(batch)
        .map(|start| start..(start + batch).min(n))
        .take(steps.unwrap_or(usize::MAX))
        .collect()
}
