//! Epoch driver: warm-up, dead-neuron revival, early stopping, CSV logs.
//!
//! The driver is an explicit state machine:
//!
//! ```text
//! Init -> (TrainEpoch -> DeadNeuronFix -> Evaluate -> CheckpointDecision)* -> Stopped
//! ```
//!
//! Every epoch draws fresh digit pairs for both the training and the
//! validation split, shuffles the training pairs and feeds them to the
//! compiled network in mini-batches. Early stopping tracks *training*
//! accuracy; the best epoch's connectivity is captured in memory when it is
//! reached and written once, keyed by that epoch, when the run stops.
//!
//! All weight edits go through [`CompiledNetwork::pull_weights`] /
//! [`CompiledNetwork::push_weights`]. Any error from the compiled network ends
//! the run; nothing is retried.

pub mod csv_log;

use crate::backend::{Batch, BatchOutput, CompiledNetwork};
use crate::checkpoint::{ConnectivitySnapshot, Serialiser};
use crate::core::{SnnError, SnnResult};
use crate::data::{Dataset, PairSequencer, SequencedDataset, SequencedExample};
use crate::topology::{ModuleHandles, SequenceNetwork};
use crate::RunConfig;
use csv_log::{CsvLog, EpochRecord};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::time::Instant;

// ============================================================================
// Hooks
// ============================================================================

/// Learning-rate warm-up applied before every batch.
///
/// Below `target` the rate is multiplied by `factor^batch` (`batch` counts
/// from zero within the epoch); at or above it the rate is pinned to `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EaseInSchedule {
    pub target: f32,
    pub factor: f32,
}

impl Default for EaseInSchedule {
    fn default() -> Self {
        Self {
            target: 0.001,
            factor: 1.05,
        }
    }
}

impl EaseInSchedule {
    pub fn rate_for_batch(&self, current: f32, batch: usize) -> f32 {
        if current < self.target {
            current * self.factor.powi(i32::try_from(batch).unwrap_or(i32::MAX))
        } else {
            self.target
        }
    }

    pub fn on_batch_begin<N: CompiledNetwork + ?Sized>(&self, batch: usize, network: &mut N) {
        let rate = self.rate_for_batch(network.learning_rate(), batch);
        network.set_learning_rate(rate);
    }
}

/// Add `increment` to every incoming weight (column of `weights`) of neurons
/// whose spike count is exactly zero. Returns how many neurons were revived.
///
/// # Errors
/// `ShapeMismatch` if `counts` does not have one entry per column.
pub fn revive_silent_neurons(
    weights: &mut Array2<f32>,
    counts: &Array1<f32>,
    increment: f32,
) -> SnnResult<usize> {
    if weights.ncols() != counts.len() {
        return Err(SnnError::ShapeMismatch(format!(
            "{} spike counts for {} postsynaptic neurons",
            counts.len(),
            weights.ncols()
        )));
    }
    let mut revived = 0;
    for (mut column, &count) in weights.axis_iter_mut(Axis(1)).zip(counts.iter()) {
        if count == 0.0 {
            column.mapv_inplace(|w| w + increment);
            revived += 1;
        }
    }
    Ok(revived)
}

// ============================================================================
// Early stopping
// ============================================================================

/// Outcome of recording one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Strictly better than every earlier epoch
    pub improved: bool,
    pub stop: bool,
}

/// Patience counter over per-epoch accuracy.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience: i32,
    remaining: i32,
    max_epochs: usize,
    best_epoch: usize,
    best_accuracy: f32,
}

impl EarlyStopping {
    pub fn new(patience: i32, max_epochs: usize) -> Self {
        Self {
            patience,
            remaining: patience,
            max_epochs,
            best_epoch: 0,
            best_accuracy: 0.0,
        }
    }

    /// Reset patience on a strict improvement, otherwise spend one unit; stop
    /// once patience goes negative or `epoch` is the last allowed one.
    pub fn record(&mut self, epoch: usize, accuracy: f32) -> Progress {
        let improved = accuracy > self.best_accuracy;
        if improved {
            self.best_accuracy = accuracy;
            self.best_epoch = epoch;
            self.remaining = self.patience;
        } else {
            self.remaining -= 1;
        }
        Progress {
            improved,
            stop: self.remaining < 0 || epoch + 1 >= self.max_epochs,
        }
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn best_accuracy(&self) -> f32 {
        self.best_accuracy
    }

    pub fn remaining(&self) -> i32 {
        self.remaining
    }
}

// ============================================================================
// Driver
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Init,
    TrainEpoch,
    DeadNeuronFix,
    Evaluate,
    CheckpointDecision,
    Stopped,
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSummary {
    pub epochs_run: usize,
    pub best_epoch: usize,
    pub best_accuracy: f32,
    /// Where the best epoch's snapshot was written
    pub checkpoint_path: PathBuf,
}

/// Mutable per-run data threaded through the state machine.
struct RunContext {
    train_log: CsvLog,
    valid_log: CsvLog,
    epoch: usize,
    epoch_start: Instant,
    train_set: SequencedDataset,
    valid_set: SequencedDataset,
    train_output: BatchOutput,
    best_snapshot: Option<ConnectivitySnapshot>,
}

/// Runs the epoch loop for a [`SequenceNetwork`] compiled by any backend.
#[derive(Debug)]
pub struct TrainingDriver<'a> {
    config: &'a RunConfig,
    modules: [ModuleHandles; 2],
    sequencer: PairSequencer,
    schedule: EaseInSchedule,
    stopping: EarlyStopping,
    rng: StdRng,
    state: DriverState,
}

impl<'a> TrainingDriver<'a> {
    /// # Errors
    /// `InvalidConfig` for a zero batch size.
    pub fn new(config: &'a RunConfig, topology: &SequenceNetwork) -> SnnResult<Self> {
        if config.batch_size == 0 {
            return Err(SnnError::InvalidConfig(
                "Batch size must be > 0".to_string(),
            ));
        }
        Ok(Self {
            config,
            modules: topology.modules.clone(),
            sequencer: PairSequencer::from_config(config),
            schedule: EaseInSchedule::default(),
            stopping: EarlyStopping::new(config.patience, config.max_epochs),
            rng: StdRng::seed_from_u64(config.seed),
            state: DriverState::Init,
        })
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stopping(&self) -> &EarlyStopping {
        &self.stopping
    }

    /// Train until early stopping or the epoch limit, then persist the best
    /// snapshot through `serialiser`.
    ///
    /// # Errors
    /// Dataset, log, network and serialiser failures, all fatal.
    pub fn run<N, S>(
        &mut self,
        network: &mut N,
        train: &Dataset,
        test: &Dataset,
        serialiser: &S,
    ) -> SnnResult<TrainingSummary>
    where
        N: CompiledNetwork + ?Sized,
        S: Serialiser + ?Sized,
    {
        self.state = DriverState::Init;
        let mut ctx = RunContext {
            train_log: CsvLog::create(&self.config.train_log_path())?,
            valid_log: CsvLog::create(&self.config.valid_log_path())?,
            epoch: 0,
            epoch_start: Instant::now(),
            train_set: SequencedDataset::default(),
            valid_set: SequencedDataset::default(),
            train_output: BatchOutput::default(),
            best_snapshot: None,
        };

        loop {
            self.state = match self.state {
                DriverState::Init => {
                    tracing::info!(
                        network = network.name(),
                        train = train.len(),
                        test = test.len(),
                        batch_size = self.config.batch_size,
                        max_epochs = self.config.max_epochs,
                        "Starting training"
                    );
                    if self.config.max_epochs == 0 {
                        DriverState::Stopped
                    } else {
                        DriverState::TrainEpoch
                    }
                }
                DriverState::TrainEpoch => {
                    ctx.epoch_start = Instant::now();
                    ctx.train_set = self.sequencer.sequence(train, train, &mut self.rng)?;
                    ctx.valid_set = self.sequencer.sequence(test, test, &mut self.rng)?;
                    ctx.train_output = self.train_epoch(network, &ctx.train_set)?;
                    DriverState::DeadNeuronFix
                }
                DriverState::DeadNeuronFix => {
                    self.revive(network, &ctx.train_output, ctx.epoch)?;
                    DriverState::Evaluate
                }
                DriverState::Evaluate => {
                    self.evaluate(network, &mut ctx)?;
                    DriverState::CheckpointDecision
                }
                DriverState::CheckpointDecision => {
                    let progress = self.stopping.record(ctx.epoch, ctx.train_output.accuracy());
                    if progress.improved {
                        ctx.best_snapshot = Some(network.snapshot(ctx.epoch)?);
                        tracing::info!(
                            epoch = ctx.epoch,
                            accuracy = self.stopping.best_accuracy(),
                            "New best epoch"
                        );
                    }
                    ctx.epoch += 1;
                    if progress.stop {
                        DriverState::Stopped
                    } else {
                        DriverState::TrainEpoch
                    }
                }
                DriverState::Stopped => {
                    let best_epoch = self.stopping.best_epoch();
                    let snapshot = match ctx.best_snapshot.take() {
                        Some(snapshot) => snapshot,
                        None => network.snapshot(best_epoch)?,
                    };
                    let checkpoint_path = serialiser.save(&snapshot)?;
                    tracing::info!(
                        epochs = ctx.epoch,
                        best_epoch,
                        best_accuracy = self.stopping.best_accuracy(),
                        checkpoint = %checkpoint_path.display(),
                        "Training finished"
                    );
                    return Ok(TrainingSummary {
                        epochs_run: ctx.epoch,
                        best_epoch,
                        best_accuracy: self.stopping.best_accuracy(),
                        checkpoint_path,
                    });
                }
            };
        }
    }

    /// Shuffle, batch and train on one epoch of pairs.
    fn train_epoch<N: CompiledNetwork + ?Sized>(
        &mut self,
        network: &mut N,
        train_set: &SequencedDataset,
    ) -> SnnResult<BatchOutput> {
        let mut indices: Vec<usize> = (0..train_set.len()).collect();
        shuffle_indices(&mut indices, &mut self.rng);

        let inputs = [self.modules[0].input, self.modules[1].input];
        let mut total = BatchOutput::default();
        for (b, chunk) in indices.chunks(self.config.batch_size).enumerate() {
            self.schedule.on_batch_begin(b, network);
            let examples: Vec<&SequencedExample> =
                chunk.iter().map(|&i| &train_set.examples[i]).collect();
            let batch = Batch::from_examples(&examples, inputs);
            let output = network.train_batch(&batch)?;
            tracing::debug!(
                batch = b,
                accuracy = output.accuracy(),
                loss = output.mean_loss(),
                lr = network.learning_rate(),
                "Batch done"
            );
            total.merge(output);
        }
        Ok(total)
    }

    fn revive<N: CompiledNetwork + ?Sized>(
        &self,
        network: &mut N,
        train_output: &BatchOutput,
        epoch: usize,
    ) -> SnnResult<()> {
        for module in &self.modules {
            let counts = train_output.spike_counts.get(&module.hidden).ok_or_else(|| {
                SnnError::Simulation(format!(
                    "No spike counts reported for population {}",
                    module.hidden.0
                ))
            })?;
            let mut weights = network.pull_weights(module.input_hidden)?;
            let revived =
                revive_silent_neurons(&mut weights, counts, self.config.dead_neuron_increment)?;
            network.push_weights(module.input_hidden, &weights)?;
            if revived > 0 {
                tracing::debug!(
                    epoch,
                    population = module.hidden.0,
                    revived,
                    "Boosted inputs of silent neurons"
                );
            }
        }
        Ok(())
    }

    fn evaluate<N: CompiledNetwork + ?Sized>(
        &self,
        network: &mut N,
        ctx: &mut RunContext,
    ) -> SnnResult<()> {
        let train_elapsed = ctx.epoch_start.elapsed().as_secs_f64();
        let valid_start = Instant::now();
        let inputs = [self.modules[0].input, self.modules[1].input];
        let examples: Vec<&SequencedExample> = ctx.valid_set.examples.iter().collect();
        let mut valid_output = BatchOutput::default();
        for chunk in examples.chunks(self.config.batch_size) {
            let batch = Batch::from_examples(chunk, inputs);
            valid_output.merge(network.evaluate_batch(&batch)?);
        }
        let valid_elapsed = valid_start.elapsed().as_secs_f64();

        ctx.train_log
            .write(&record(ctx.epoch, &ctx.train_output, train_elapsed))?;
        ctx.valid_log
            .write(&record(ctx.epoch, &valid_output, valid_elapsed))?;

        tracing::info!(
            epoch = ctx.epoch,
            train_accuracy = ctx.train_output.accuracy(),
            train_loss = ctx.train_output.mean_loss(),
            valid_accuracy = valid_output.accuracy(),
            valid_loss = valid_output.mean_loss(),
            lr = network.learning_rate(),
            secs = train_elapsed + valid_elapsed,
            "Epoch"
        );
        Ok(())
    }
}

fn record(epoch: usize, output: &BatchOutput, elapsed_secs: f64) -> EpochRecord {
    EpochRecord {
        epoch,
        num_trials: output.num_trials,
        num_correct: output.num_correct,
        accuracy: output.accuracy(),
        loss: output.mean_loss(),
        elapsed_secs,
    }
}

/// Fisher-Yates shuffle driven by the run's seeded RNG.
fn shuffle_indices<R: Rng + ?Sized>(indices: &mut [usize], rng: &mut R) {
    for i in (1..indices.len()).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::JsonSerialiser;
    use crate::core::{ConnectionId, PopulationId};
    use crate::data::mnist::IMAGE_PIXELS;
    use crate::topology::build_sequence_network;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeMap;

    /// Scripted network: per-epoch accuracy, fixed per-batch spike counts.
    struct MockNetwork {
        accuracies: Vec<f32>,
        epoch: usize,
        evaluated: bool,
        lr: f32,
        lr_seen: Vec<f32>,
        weights: BTreeMap<ConnectionId, Array2<f32>>,
        counts: BTreeMap<PopulationId, Array1<f32>>,
        snapshots: Vec<usize>,
    }

    impl MockNetwork {
        fn new(topology: &SequenceNetwork, num_hidden: usize, accuracies: Vec<f32>) -> Self {
            let mut weights = BTreeMap::new();
            let mut counts = BTreeMap::new();
            for module in &topology.modules {
                weights.insert(module.input_hidden, Array2::zeros((IMAGE_PIXELS, num_hidden)));
                counts.insert(module.hidden, Array1::ones(num_hidden));
            }
            Self {
                accuracies,
                epoch: 0,
                evaluated: false,
                lr: 1e-5,
                lr_seen: Vec::new(),
                weights,
                counts,
                snapshots: Vec::new(),
            }
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        fn output(&self, batch: &Batch<'_>) -> BatchOutput {
            let acc = self.accuracies.get(self.epoch).copied().unwrap_or(0.0);
            BatchOutput {
                num_trials: batch.len(),
                num_correct: (acc * batch.len() as f32).round() as usize,
                loss_sum: 0.5 * batch.len() as f32,
                spike_counts: self.counts.clone(),
            }
        }
    }

    impl CompiledNetwork for MockNetwork {
        fn name(&self) -> &str {
            "mock"
        }

        fn train_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput> {
            if self.evaluated {
                self.epoch += 1;
                self.evaluated = false;
            }
            self.lr_seen.push(self.lr);
            Ok(self.output(batch))
        }

        fn evaluate_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput> {
            self.evaluated = true;
            Ok(self.output(batch))
        }

        fn learning_rate(&self) -> f32 {
            self.lr
        }

        fn set_learning_rate(&mut self, learning_rate: f32) {
            self.lr = learning_rate;
        }

        fn pull_weights(&mut self, conn: ConnectionId) -> SnnResult<Array2<f32>> {
            self.weights
                .get(&conn)
                .cloned()
                .ok_or(SnnError::UnknownConnection(conn.0))
        }

        fn push_weights(&mut self, conn: ConnectionId, weights: &Array2<f32>) -> SnnResult<()> {
            self.weights.insert(conn, weights.clone());
            Ok(())
        }

        fn snapshot(&mut self, epoch: usize) -> SnnResult<ConnectivitySnapshot> {
            self.snapshots.push(epoch);
            Ok(ConnectivitySnapshot {
                epoch,
                network: "mock".to_string(),
                connections: Vec::new(),
            })
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn dataset(n: usize) -> Dataset {
        let images =
            Array2::from_shape_fn((n, IMAGE_PIXELS), |(i, j)| ((i * 31 + j * 7) % 256) as u8);
        let labels = (0..n).map(|i| (i % 10) as u8).collect();
        Dataset::new(images, labels).expect("dataset")
    }

    fn config(results: &std::path::Path, max_epochs: usize) -> RunConfig {
        RunConfig {
            num_hidden: 4,
            batch_size: 5,
            max_epochs,
            results_dir: results.to_path_buf(),
            ..RunConfig::default()
        }
    }

    fn topology(config: &RunConfig) -> SequenceNetwork {
        let mut rng = StdRng::seed_from_u64(0);
        build_sequence_network(config, &mut rng).expect("topology")
    }

    #[test]
    fn test_ease_in_schedule() {
        let schedule = EaseInSchedule::default();
        assert_abs_diff_eq!(schedule.rate_for_batch(1e-5, 0), 1e-5, epsilon = 1e-12);
        assert_abs_diff_eq!(schedule.rate_for_batch(1e-5, 2), 1e-5 * 1.1025, epsilon = 1e-10);
        assert_eq!(schedule.rate_for_batch(0.002, 3), 0.001);
        assert_eq!(schedule.rate_for_batch(0.001, 0), 0.001);
    }

    #[test]
    fn test_revive_only_silent_neurons() {
        let mut weights = ndarray::arr2(&[[0.1, -0.2, 0.3, 0.0], [0.5, 0.5, -0.5, 1.0]]);
        let before = weights.clone();
        let counts = ndarray::arr1(&[0.0, 2.0, 0.0, 1.0]);
        let revived = revive_silent_neurons(&mut weights, &counts, 0.002).expect("revive");
        assert_eq!(revived, 2);
        for ((i, j), &w) in weights.indexed_iter() {
            if counts[j] == 0.0 {
                assert_abs_diff_eq!(w, before[[i, j]] + 0.002, epsilon = 1e-7);
            } else {
                assert_eq!(w, before[[i, j]]);
            }
        }
        assert!(revive_silent_neurons(&mut weights, &ndarray::arr1(&[0.0]), 0.002).is_err());
    }

    #[test]
    fn test_early_stopping_after_patience() {
        let mut stopping = EarlyStopping::new(15, 500);
        assert!(stopping.record(0, 0.1).improved);
        assert!(stopping.record(1, 0.5).improved);
        for epoch in 2..17 {
            let progress = stopping.record(epoch, 0.5);
            assert!(!progress.improved);
            assert!(!progress.stop, "stopped early at {epoch}");
        }
        let progress = stopping.record(17, 0.4);
        assert!(progress.stop);
        assert_eq!(stopping.best_epoch(), 1);
        assert_eq!(stopping.remaining(), -1);
    }

    #[test]
    fn test_early_stopping_epoch_limit() {
        let mut stopping = EarlyStopping::new(15, 3);
        assert!(!stopping.record(0, 0.1).stop);
        assert!(!stopping.record(1, 0.2).stop);
        let last = stopping.record(2, 0.3);
        assert!(last.improved);
        assert!(last.stop);
    }

    #[test]
    fn test_driver_stops_and_saves_peak() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path(), 100);
        let topology = topology(&config);
        let mut accuracies = vec![0.2, 0.4, 0.6];
        accuracies.extend(std::iter::repeat(0.4).take(30));
        let mut network = MockNetwork::new(&topology, config.num_hidden, accuracies);
        let serialiser = JsonSerialiser::create(dir.path().join("ckpt")).expect("serialiser");

        let mut driver = TrainingDriver::new(&config, &topology).expect("driver");
        let summary = driver
            .run(&mut network, &dataset(10), &dataset(10), &serialiser)
            .expect("run");

        assert_eq!(driver.state(), DriverState::Stopped);
        assert_eq!(summary.best_epoch, 2);
        assert_eq!(summary.epochs_run, 2 + 16 + 1);
        assert_abs_diff_eq!(summary.best_accuracy, 0.6, epsilon = 1e-6);
        assert_eq!(network.snapshots, vec![0, 1, 2]);
        assert_eq!(serialiser.load(2).expect("best snapshot").epoch, 2);
        assert!(serialiser.load(18).is_err());

        let train_log = std::fs::read_to_string(config.train_log_path()).expect("train log");
        assert_eq!(train_log.lines().count(), 1 + summary.epochs_run);
        let valid_log = std::fs::read_to_string(config.valid_log_path()).expect("valid log");
        assert_eq!(valid_log.lines().count(), 1 + summary.epochs_run);
    }

    #[test]
    fn test_driver_revives_silent_hidden_neurons() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path(), 1);
        let topology = topology(&config);
        let mut network = MockNetwork::new(&topology, config.num_hidden, vec![0.2]);
        let first = &topology.modules[0];
        network
            .counts
            .insert(first.hidden, ndarray::arr1(&[0.0, 1.0, 0.0, 3.0]));
        let serialiser = JsonSerialiser::create(dir.path().join("ckpt")).expect("serialiser");

        let mut driver = TrainingDriver::new(&config, &topology).expect("driver");
        driver
            .run(&mut network, &dataset(10), &dataset(10), &serialiser)
            .expect("run");

        let w1 = &network.weights[&first.input_hidden];
        for row in w1.rows() {
            assert_abs_diff_eq!(row[0], 0.002, epsilon = 1e-7);
            assert_eq!(row[1], 0.0);
            assert_abs_diff_eq!(row[2], 0.002, epsilon = 1e-7);
            assert_eq!(row[3], 0.0);
        }
        let w2 = &network.weights[&topology.modules[1].input_hidden];
        assert!(w2.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_driver_warms_up_learning_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path(), 1);
        let topology = topology(&config);
        let mut network = MockNetwork::new(&topology, config.num_hidden, vec![0.2]);
        let serialiser = JsonSerialiser::create(dir.path().join("ckpt")).expect("serialiser");

        TrainingDriver::new(&config, &topology)
            .expect("driver")
            .run(&mut network, &dataset(15), &dataset(5), &serialiser)
            .expect("run");

        assert_eq!(network.lr_seen.len(), 3);
        assert_abs_diff_eq!(network.lr_seen[0], 1e-5, epsilon = 1e-12);
        assert_abs_diff_eq!(network.lr_seen[1], 1e-5 * 1.05, epsilon = 1e-11);
        assert_abs_diff_eq!(network.lr_seen[2], 1e-5 * 1.05 * 1.1025, epsilon = 1e-11);
    }

    #[test]
    fn test_missing_telemetry_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = config(dir.path(), 1);
        let topology = topology(&config);
        let mut network = MockNetwork::new(&topology, config.num_hidden, vec![0.2]);
        network.counts.clear();
        let serialiser = JsonSerialiser::create(dir.path().join("ckpt")).expect("serialiser");

        let result = TrainingDriver::new(&config, &topology)
            .expect("driver")
            .run(&mut network, &dataset(10), &dataset(10), &serialiser);
        assert!(matches!(result, Err(SnnError::Simulation(_))));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = config(dir.path(), 1);
        let topology = topology(&config);
        config.batch_size = 0;
        assert!(TrainingDriver::new(&config, &topology).is_err());
    }
}
