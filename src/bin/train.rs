//! Sequenced-MNIST training binary.
//!
//! Builds the two-module network, compiles it with the reference backend and
//! trains until early stopping. Writes per-epoch CSV logs under
//! `--results-dir` and the best epoch's connectivity under
//! `checkpoints_mnist_sequence_<fingerprint>/`.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use rand::rngs::StdRng;
use rand::SeedableRng;
use seqsnn::{
    build_sequence_network, load_mnist, Compiler, CompilerOptions, JsonSerialiser,
    ReferenceCompiler, RunConfig, TrainingDriver,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "seqsnn-train",
    about = "Train a two-module SNN on sequenced MNIST digit pairs"
)]
struct Args {
    /// Hidden neurons per module
    #[arg(long, default_value_t = 64)]
    num_hidden: usize,

    /// Cross-module connection probability (1.0 = dense, 0.0 = none)
    #[arg(long, default_value_t = 0.01)]
    sparsity: f64,

    /// Lower bound of the initial cross-module delays
    #[arg(long, default_value_t = 0.0)]
    delay_min: f32,

    /// Upper bound of the initial cross-module delays
    #[arg(long, default_value_t = 0.0)]
    delay_max: f32,

    /// Also learn within-module recurrent delays
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    delays_within: bool,

    /// Lower bound of the initial within-module delays
    #[arg(long, default_value_t = 0.0)]
    delay_within_min: f32,

    /// Upper bound of the initial within-module delays
    #[arg(long, default_value_t = 0.0)]
    delay_within_max: f32,

    /// Upper firing-rate regularisation strength
    #[arg(long, default_value_t = 5e-11)]
    k_reg: f32,

    /// Seed for weights, connectivity and pair sampling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory holding the four gzipped MNIST IDX files
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Directory for the CSV logs
    #[arg(long, default_value = "results")]
    results_dir: PathBuf,

    /// Upper limit on training epochs; not part of the run fingerprint
    #[arg(long, default_value_t = 500)]
    max_epochs: usize,
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig {
            num_hidden: args.num_hidden,
            sparsity: args.sparsity,
            delay_min: args.delay_min,
            delay_max: args.delay_max,
            delays_within: args.delays_within,
            delay_within_min: args.delay_within_min,
            delay_within_max: args.delay_within_max,
            k_reg: args.k_reg,
            seed: args.seed,
            data_dir: args.data_dir,
            results_dir: args.results_dir,
            max_epochs: args.max_epochs,
            ..RunConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RunConfig::from(Args::parse());
    tracing::info!(fingerprint = %config.fingerprint(), "Run configuration");

    let (train, test) = load_mnist(&config.data_dir)
        .with_context(|| format!("Failed to load MNIST from {}", config.data_dir.display()))?;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let topology =
        build_sequence_network(&config, &mut rng).context("Failed to build network")?;
    let options = CompilerOptions::from_config(&config, topology.delay_learn_connections());
    let mut network = ReferenceCompiler::new(options)
        .compile(&topology.network, &config.model_name())
        .context("Failed to compile network")?;

    let checkpoint_dir = config.checkpoint_dir();
    let serialiser = JsonSerialiser::create(&checkpoint_dir).with_context(|| {
        format!("Failed to create checkpoint directory {}", checkpoint_dir.display())
    })?;

    let summary = TrainingDriver::new(&config, &topology)?
        .run(&mut network, &train, &test, &serialiser)
        .context("Training failed")?;

    tracing::info!(
        epochs = summary.epochs_run,
        best_epoch = summary.best_epoch,
        best_accuracy = summary.best_accuracy,
        checkpoint = %summary.checkpoint_path.display(),
        "Done"
    );
    Ok(())
}
