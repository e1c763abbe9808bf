//! Compiler / compiled-network contract.
//!
//! A [`Compiler`] turns a declared [`Network`] into a [`CompiledNetwork`] that
//! owns every trainable weight and delay. The training driver only touches
//! that state through explicit [`pull_weights`](CompiledNetwork::pull_weights)
//! / [`push_weights`](CompiledNetwork::push_weights) calls, which must bracket
//! any local mutation.
//!
//! The crate ships one implementation, the CPU [`reference`] backend.

pub mod optimiser;
pub mod reference;

use crate::checkpoint::ConnectivitySnapshot;
use crate::core::{ConnectionId, Network, PopulationId, SnnError, SnnResult};
use crate::data::{EncodedSpikeTrain, SequencedExample};
use crate::RunConfig;
use ndarray::{Array1, Array2};
use std::collections::BTreeMap;

/// Options shared by all compilers.
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    pub example_timesteps: usize,
    pub dt: f32,
    /// Largest batch a compiled network accepts
    pub batch_size: usize,
    /// Initial weight learning rate
    pub learning_rate: f32,
    /// Connections whose delays should be learned
    pub delay_learn_conns: Vec<ConnectionId>,
    pub rng_seed: u64,
}

impl CompilerOptions {
    pub fn from_config(config: &RunConfig, delay_learn_conns: Vec<ConnectionId>) -> Self {
        Self {
            example_timesteps: config.example_timesteps(),
            dt: config.dt,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            delay_learn_conns,
            rng_seed: config.seed,
        }
    }
}

/// Compiles declared networks into runnable ones.
pub trait Compiler {
    type Output: CompiledNetwork;

    /// Compile `network` under `name`.
    ///
    /// # Errors
    /// Backend specific; typically `InvalidConfig` for unsupported declarations.
    fn compile(&self, network: &Network, name: &str) -> SnnResult<Self::Output>;
}

/// One mini-batch: spike trains per input population plus target classes.
#[derive(Debug, Clone)]
pub struct Batch<'a> {
    pub inputs: Vec<(PopulationId, Vec<&'a EncodedSpikeTrain>)>,
    pub labels: Vec<usize>,
}

impl<'a> Batch<'a> {
    /// Route module `k`'s spike train of every example to `module_inputs[k]`.
    pub fn from_examples(examples: &[&'a SequencedExample], module_inputs: [PopulationId; 2]) -> Self {
        let inputs = module_inputs
            .iter()
            .enumerate()
            .map(|(k, &pop)| (pop, examples.iter().map(|&ex| &ex.module_spikes[k]).collect()))
            .collect();
        let labels = examples.iter().map(|ex| usize::from(ex.label)).collect();
        Self { inputs, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Spike trains for `pop`, if the batch feeds it.
    pub fn input(&self, pop: PopulationId) -> Option<&[&'a EncodedSpikeTrain]> {
        self.inputs
            .iter()
            .find(|(p, _)| *p == pop)
            .map(|(_, trains)| trains.as_slice())
    }

    /// # Errors
    /// `ShapeMismatch` if an input list is not one train per label.
    pub fn validate(&self) -> SnnResult<()> {
        for (pop, trains) in &self.inputs {
            if trains.len() != self.labels.len() {
                return Err(SnnError::ShapeMismatch(format!(
                    "Population {}: {} spike trains for {} labels",
                    pop.0,
                    trains.len(),
                    self.labels.len()
                )));
            }
        }
        Ok(())
    }
}

/// Metrics and telemetry from one train or evaluate call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutput {
    pub num_trials: usize,
    pub num_correct: usize,
    /// Sum of per-example losses
    pub loss_sum: f32,
    /// Per-neuron spike counts of every recording population, summed over the batch
    pub spike_counts: BTreeMap<PopulationId, Array1<f32>>,
}

impl BatchOutput {
    /// Fold `other` into `self`.
    pub fn merge(&mut self, other: BatchOutput) {
        self.num_trials += other.num_trials;
        self.num_correct += other.num_correct;
        self.loss_sum += other.loss_sum;
        for (pop, counts) in other.spike_counts {
            self.spike_counts
                .entry(pop)
                .and_modify(|acc| *acc += &counts)
                .or_insert(counts);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn accuracy(&self) -> f32 {
        if self.num_trials == 0 {
            0.0
        } else {
            self.num_correct as f32 / self.num_trials as f32
        }
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn mean_loss(&self) -> f32 {
        if self.num_trials == 0 {
            0.0
        } else {
            self.loss_sum / self.num_trials as f32
        }
    }
}

/// A runnable network owning its trainable state.
pub trait CompiledNetwork {
    fn name(&self) -> &str;

    /// Run one batch forward and apply one optimiser step.
    ///
    /// # Errors
    /// Any failure is fatal to the run; callers do not retry.
    fn train_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput>;

    /// Run one batch forward without touching trainable state.
    ///
    /// # Errors
    /// Same as [`CompiledNetwork::train_batch`].
    fn evaluate_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);

    /// Copy a connection's weights into a local `(num_pre, num_post)` view.
    /// Absent synapses read as zero.
    ///
    /// # Errors
    /// `UnknownConnection` for an id the network does not have.
    fn pull_weights(&mut self, conn: ConnectionId) -> SnnResult<Array2<f32>>;

    /// Write a local view back. Entries for absent synapses are ignored.
    ///
    /// # Errors
    /// `UnknownConnection`, or `ShapeMismatch` if `weights` has the wrong shape.
    fn push_weights(&mut self, conn: ConnectionId, weights: &Array2<f32>) -> SnnResult<()>;

    /// Capture all weights and delays, tagged with `epoch`.
    ///
    /// # Errors
    /// Backend specific failure to read device state.
    fn snapshot(&mut self, epoch: usize) -> SnnResult<ConnectivitySnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::LatencyEncoder;

    fn example(label: u8) -> SequencedExample {
        let enc = LatencyEncoder::new(0.0, 20.0, 1);
        SequencedExample {
            module_spikes: [enc.encode(&[255u8, 0]), enc.encode(&[0u8, 128])],
            label,
            seq: true,
        }
    }

    #[test]
    fn test_batch_routes_modules() {
        let examples = [example(3), example(15)];
        let refs: Vec<&SequencedExample> = examples.iter().collect();
        let batch = Batch::from_examples(&refs, [PopulationId(0), PopulationId(1)]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.labels, vec![3, 15]);
        let first = batch.input(PopulationId(0)).expect("module 1");
        assert_eq!(first[0].end_spikes, vec![1, 1]);
        let second = batch.input(PopulationId(1)).expect("module 2");
        assert_eq!(second[1].end_spikes, vec![0, 1]);
        assert!(batch.input(PopulationId(7)).is_none());
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn test_batch_output_merge() {
        let mut a = BatchOutput {
            num_trials: 4,
            num_correct: 1,
            loss_sum: 2.0,
            spike_counts: BTreeMap::from([(PopulationId(2), ndarray::arr1(&[1.0, 0.0]))]),
        };
        let b = BatchOutput {
            num_trials: 4,
            num_correct: 3,
            loss_sum: 1.0,
            spike_counts: BTreeMap::from([
                (PopulationId(2), ndarray::arr1(&[2.0, 0.0])),
                (PopulationId(3), ndarray::arr1(&[5.0])),
            ]),
        };
        a.merge(b);
        assert_eq!(a.num_trials, 8);
        assert!((a.accuracy() - 0.5).abs() < 1e-6);
        assert!((a.mean_loss() - 0.375).abs() < 1e-6);
        assert_eq!(a.spike_counts[&PopulationId(2)], ndarray::arr1(&[3.0, 0.0]));
        assert_eq!(a.spike_counts[&PopulationId(3)], ndarray::arr1(&[5.0]));
    }
}
