//! # seqsnn
//!
//! Training orchestration for a two-module spiking neural network on
//! sequenced MNIST digit pairs.
//!
//! ## Overview
//!
//! Each example shows two digits, one per module, in two disjoint time
//! windows. Images are latency encoded (brighter pixels spike earlier), the
//! two modules are densely recurrent and sparsely cross-connected, and a
//! shared 20-unit readout must report one of the two digits together with the
//! module that saw it.
//!
//! Gradient computation lives behind the [`backend::CompiledNetwork`] trait.
//! The crate ships a CPU [`backend::reference`] implementation that simulates
//! the declared network and trains its readout.
//!
//! ## Structure
//!
//! - [`core`]: Network declaration, initialisers, error type
//! - [`data`]: MNIST loading, latency encoding, pair sequencing
//! - [`topology`]: The two-module network builder
//! - [`backend`]: Compiler / compiled-network contract and the reference backend
//! - [`checkpoint`]: Connectivity snapshots and their serialiser
//! - [`training`]: Epoch driver: warm-up, dead-neuron revival, early stopping, CSV logs

pub mod backend;
pub mod checkpoint;
pub mod core;
pub mod data;
pub mod topology;
pub mod training;

pub use backend::reference::{ReferenceCompiler, ReferenceNetwork};
pub use backend::{Batch, BatchOutput, CompiledNetwork, Compiler, CompilerOptions};
pub use checkpoint::{ConnectivitySnapshot, JsonSerialiser, Serialiser};
pub use core::{ConnectionId, Network, PopulationId, SnnError, SnnResult};
pub use data::{
    load_mnist, merged_label, Dataset, EncodedSpikeTrain, LatencyEncoder, PairSequencer,
    SequencedDataset, SequencedExample,
};
pub use topology::{build_sequence_network, ModuleHandles, SequenceNetwork};
pub use training::{
    revive_silent_neurons, DriverState, EaseInSchedule, EarlyStopping, TrainingDriver,
    TrainingSummary,
};

use std::path::PathBuf;

/// Immutable run configuration.
///
/// The first block mirrors the command-line flags and feeds the run
/// [fingerprint](RunConfig::fingerprint); the rest are fixed experiment constants.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Hidden neurons per module
    pub num_hidden: usize,
    /// Cross-module connection probability (1.0 = dense)
    pub sparsity: f64,
    /// Initial cross-module delay range
    pub delay_min: f32,
    pub delay_max: f32,
    /// Learn delays of the within-module recurrent connections too
    pub delays_within: bool,
    /// Initial within-module delay range
    pub delay_within_min: f32,
    pub delay_within_max: f32,
    /// Upper firing-rate regularisation strength on hidden populations
    pub k_reg: f32,
    pub seed: u64,

    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub batch_size: usize,
    pub num_input: usize,
    /// Classes per module; the readout has twice as many units
    pub classes_per_module: usize,
    pub example_time: f32,
    pub dt: f32,
    /// Shift of the second presentation window
    pub sequence_offset: f32,
    pub encode_threshold: u8,
    pub max_epochs: usize,
    pub patience: i32,
    /// Added to every input weight of a hidden neuron that stayed silent for an epoch
    pub dead_neuron_increment: f32,
    pub max_delay_steps: usize,
    pub learning_rate: f32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_hidden: 64,
            sparsity: 0.01,
            delay_min: 0.0,
            delay_max: 0.0,
            delays_within: true,
            delay_within_min: 0.0,
            delay_within_max: 0.0,
            k_reg: 5e-11,
            seed: 0,
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results"),
            batch_size: 256,
            num_input: data::mnist::IMAGE_PIXELS,
            classes_per_module: data::mnist::NUM_CLASSES,
            example_time: 20.0,
            dt: 1.0,
            sequence_offset: 100.0,
            encode_threshold: 1,
            max_epochs: 500,
            patience: 15,
            dead_neuron_increment: 0.002,
            max_delay_steps: 150,
            learning_rate: 0.001 * 0.01,
        }
    }
}

impl RunConfig {
    /// Model parameters and seed joined with `_`, used to name logs and
    /// checkpoints.
    ///
    /// `max_epochs` and the data/results directories are not part of it. Two
    /// runs that differ only in those share paths, and the later one truncates
    /// the earlier one's CSV logs.
    pub fn fingerprint(&self) -> String {
        format!(
            "{}_{:?}_{:?}_{:?}_{}_{:?}_{:?}_{:?}_{}",
            self.num_hidden,
            self.sparsity,
            self.delay_min,
            self.delay_max,
            u8::from(self.delays_within),
            self.delay_within_min,
            self.delay_within_max,
            self.k_reg,
            self.seed
        )
    }

    /// Timesteps needed to cover both presentation windows.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn example_timesteps(&self) -> usize {
        (self.example_time / self.dt).ceil() as usize + (self.sequence_offset / self.dt) as usize
    }

    pub fn model_name(&self) -> String {
        format!("classifier_train_{}", self.fingerprint())
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        PathBuf::from(format!("checkpoints_mnist_sequence_{}", self.fingerprint()))
    }

    pub fn train_log_path(&self) -> PathBuf {
        self.results_dir
            .join(format!("train_output_mnist_sequence_{}.csv", self.fingerprint()))
    }

    pub fn valid_log_path(&self) -> PathBuf {
        self.results_dir
            .join(format!("valid_output_mnist_sequence_{}.csv", self.fingerprint()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_fingerprint() {
        let config = RunConfig::default();
        assert_eq!(config.fingerprint(), "64_0.01_0.0_0.0_1_0.0_0.0_5e-11_0");
    }

    #[test]
    fn test_fingerprint_tracks_flags() {
        let config = RunConfig {
            num_hidden: 128,
            sparsity: 1.0,
            delays_within: false,
            delay_max: 25.5,
            seed: 3,
            ..RunConfig::default()
        };
        assert_eq!(config.fingerprint(), "128_1.0_0.0_25.5_0_0.0_0.0_5e-11_3");
        assert!(config
            .train_log_path()
            .ends_with("train_output_mnist_sequence_128_1.0_0.0_25.5_0_0.0_0.0_5e-11_3.csv"));
    }

    #[test]
    fn test_fingerprint_ignores_epoch_limit() {
        let short = RunConfig {
            max_epochs: 3,
            ..RunConfig::default()
        };
        let long = RunConfig::default();
        assert_eq!(short.fingerprint(), long.fingerprint());
        assert_eq!(short.train_log_path(), long.train_log_path());
        assert_eq!(short.checkpoint_dir(), long.checkpoint_dir());
    }

    #[test]
    fn test_example_timesteps() {
        assert_eq!(RunConfig::default().example_timesteps(), 120);
    }
}
