//! Network declaration: populations, connections, initialisers.
//!
//! A [`Network`] is a plain description of a spiking network. It holds no
//! simulation state; a [`Compiler`](crate::backend::Compiler) turns it into a
//! runnable [`CompiledNetwork`](crate::backend::CompiledNetwork) that owns the
//! trainable weight and delay tensors.
//!
//! ## Structure
//!
//! ```text
//! Population  = neuron model + size (+ optional spike recording / rate regularisation)
//! Connection  = source -> target, connectivity (dense or explicit edge list),
//!               exponential synapse, delay budget
//! ```

use ndarray::Array2;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error type for all crate operations.
#[derive(Debug, Error)]
pub enum SnnError {
    /// Filesystem failure (dataset files, checkpoints, logs)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Snapshot (de)serialisation failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Malformed or inconsistent dataset file
    #[error("Dataset error: {0}")]
    Dataset(String),
    /// Invalid network or run configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    /// Shape mismatch between arrays and declared populations
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    /// Connection id not present in the compiled network
    #[error("Unknown connection: {0}")]
    UnknownConnection(usize),
    /// Failure inside a compiled network's train/evaluate step
    #[error("Simulation error: {0}")]
    Simulation(String),
    /// Dataset download failure
    #[error("Download error: {0}")]
    Download(String),
}

pub type SnnResult<T> = Result<T, SnnError>;

/// Index of a population inside its [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PopulationId(pub usize);

/// Index of a connection inside its [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub usize);

/// How an output population turns its membrane trace into class scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Readout {
    /// Maximum membrane voltage over the example
    MaxVar,
    /// Membrane voltage summed over the example
    SumVar,
}

/// Neuron model with its constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NeuronModel {
    /// Replays externally supplied spike times. `max_spikes` bounds the
    /// number of events a single batch may deliver to the population.
    SpikeInput { max_spikes: usize },
    /// Leaky integrate-and-fire, reset to zero on spike.
    LeakyIntegrateFire {
        v_thresh: f32,
        tau_mem: f32,
        tau_refrac: Option<f32>,
    },
    /// Non-spiking leaky integrator used as a readout.
    LeakyIntegrate { tau_mem: f32, readout: Readout },
}

impl NeuronModel {
    pub fn is_input(&self) -> bool {
        matches!(self, NeuronModel::SpikeInput { .. })
    }

    pub fn readout(&self) -> Option<Readout> {
        match self {
            NeuronModel::LeakyIntegrate { readout, .. } => Some(*readout),
            _ => None,
        }
    }
}

/// Upper firing-rate regularisation for a spiking population.
///
/// Neurons firing more than `nu_upper` spikes per example are penalised with
/// strength `lambda_upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRegularisation {
    pub lambda_upper: f32,
    pub nu_upper: f32,
}

/// A group of identical neurons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Population {
    pub name: String,
    pub model: NeuronModel,
    pub size: usize,
    /// Report per-neuron spike counts with every batch
    pub record_spikes: bool,
    pub regularisation: Option<RateRegularisation>,
}

impl Population {
    pub fn new(name: impl Into<String>, model: NeuronModel, size: usize) -> Self {
        Self {
            name: name.into(),
            model,
            size,
            record_spikes: false,
            regularisation: None,
        }
    }

    pub fn record_spikes(mut self, record: bool) -> Self {
        self.record_spikes = record;
        self
    }

    pub fn with_regularisation(mut self, regularisation: RateRegularisation) -> Self {
        self.regularisation = Some(regularisation);
        self
    }
}

/// Scalar initialiser for weights and delays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Initializer {
    Constant(f32),
    Normal { mean: f32, sd: f32 },
    /// Uniform over `[min, max)`; collapses to `min` when `max <= min`
    Uniform { min: f32, max: f32 },
}

impl Initializer {
    /// Draw a `(rows, cols)` matrix.
    ///
    /// # Errors
    /// `InvalidConfig` if the distribution parameters are not finite or the
    /// standard deviation is negative.
    pub fn sample_matrix<R: Rng + ?Sized>(
        &self,
        shape: (usize, usize),
        rng: &mut R,
    ) -> SnnResult<Array2<f32>> {
        match *self {
            Initializer::Constant(value) => Ok(Array2::from_elem(shape, value)),
            Initializer::Normal { mean, sd } => {
                let dist = normal(mean, sd)?;
                Ok(Array2::random_using(shape, dist, rng))
            }
            Initializer::Uniform { min, max } => {
                check_finite(min, max)?;
                if max <= min {
                    return Ok(Array2::from_elem(shape, min));
                }
                Ok(Array2::random_using(shape, Uniform::new(min, max), rng))
            }
        }
    }

    /// Draw `n` independent values.
    ///
    /// # Errors
    /// Same conditions as [`Initializer::sample_matrix`].
    pub fn sample_vec<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> SnnResult<Vec<f32>> {
        match *self {
            Initializer::Constant(value) => Ok(vec![value; n]),
            Initializer::Normal { mean, sd } => {
                let dist = normal(mean, sd)?;
                Ok((0..n).map(|_| dist.sample(rng)).collect())
            }
            Initializer::Uniform { min, max } => {
                check_finite(min, max)?;
                if max <= min {
                    return Ok(vec![min; n]);
                }
                let dist = Uniform::new(min, max);
                Ok((0..n).map(|_| dist.sample(rng)).collect())
            }
        }
    }
}

fn normal(mean: f32, sd: f32) -> SnnResult<Normal<f32>> {
    Normal::new(mean, sd).map_err(|e| {
        SnnError::InvalidConfig(format!("Normal(mean={mean}, sd={sd}): {e}"))
    })
}

fn check_finite(min: f32, max: f32) -> SnnResult<()> {
    if min.is_finite() && max.is_finite() {
        Ok(())
    } else {
        Err(SnnError::InvalidConfig(format!(
            "Uniform bounds must be finite, got [{min}, {max})"
        )))
    }
}

/// Which synapses exist between a source and a target population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Connectivity {
    /// Every pre neuron connects to every post neuron.
    Dense {
        weight: Initializer,
        delay: Initializer,
    },
    /// Explicit edge list; `pre_ind[k] -> post_ind[k]` is one synapse.
    Sparse {
        pre_ind: Vec<usize>,
        post_ind: Vec<usize>,
        weight: Initializer,
        delay: Initializer,
    },
}

impl Connectivity {
    /// Sample fixed-probability connectivity: each `(pre, post)` pair exists
    /// independently with probability `p`. The result may be empty.
    ///
    /// # Errors
    /// `InvalidConfig` if `p` is outside `[0, 1]`.
    pub fn fixed_probability<R: Rng + ?Sized>(
        num_pre: usize,
        num_post: usize,
        p: f64,
        weight: Initializer,
        delay: Initializer,
        rng: &mut R,
    ) -> SnnResult<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SnnError::InvalidConfig(format!(
                "Connection probability must be in [0, 1], got {p}"
            )));
        }
        let mut pre_ind = Vec::new();
        let mut post_ind = Vec::new();
        for pre in 0..num_pre {
            for post in 0..num_post {
                if rng.gen_bool(p) {
                    pre_ind.push(pre);
                    post_ind.push(post);
                }
            }
        }
        Ok(Connectivity::Sparse {
            pre_ind,
            post_ind,
            weight,
            delay,
        })
    }

    /// Number of synapses for a `num_pre x num_post` projection.
    pub fn num_synapses(&self, num_pre: usize, num_post: usize) -> usize {
        match self {
            Connectivity::Dense { .. } => num_pre * num_post,
            Connectivity::Sparse { pre_ind, .. } => pre_ind.len(),
        }
    }
}

/// A projection between two populations through exponential synapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub source: PopulationId,
    pub target: PopulationId,
    pub connectivity: Connectivity,
    /// Exponential synapse time constant
    pub tau_syn: f32,
    /// Largest synaptic delay, in timesteps, the compiled network must support
    pub max_delay_steps: usize,
    /// Whether a gradient backend should learn this connection's delays
    pub trainable_delays: bool,
}

impl Connection {
    pub fn new(
        name: impl Into<String>,
        source: PopulationId,
        target: PopulationId,
        connectivity: Connectivity,
        tau_syn: f32,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            target,
            connectivity,
            tau_syn,
            max_delay_steps: 0,
            trainable_delays: false,
        }
    }

    pub fn max_delay_steps(mut self, steps: usize) -> Self {
        self.max_delay_steps = steps;
        self
    }
}

/// A declared spiking network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub populations: Vec<Population>,
    pub connections: Vec<Connection>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_population(&mut self, population: Population) -> PopulationId {
        self.populations.push(population);
        PopulationId(self.populations.len() - 1)
    }

    /// Add a connection after validating its endpoints and edge indices.
    ///
    /// # Errors
    /// - `InvalidConfig` if an endpoint does not exist or the target is an input population
    /// - `ShapeMismatch` if an explicit edge list is ragged or out of range
    pub fn add_connection(&mut self, connection: Connection) -> SnnResult<ConnectionId> {
        let source = self.try_population(connection.source)?;
        let target = self.try_population(connection.target)?;
        if target.model.is_input() {
            return Err(SnnError::InvalidConfig(format!(
                "Connection '{}' targets input population '{}'",
                connection.name, target.name
            )));
        }
        if let Connectivity::Sparse {
            pre_ind, post_ind, ..
        } = &connection.connectivity
        {
            if pre_ind.len() != post_ind.len() {
                return Err(SnnError::ShapeMismatch(format!(
                    "Connection '{}': {} pre indices vs {} post indices",
                    connection.name,
                    pre_ind.len(),
                    post_ind.len()
                )));
            }
            if pre_ind.iter().any(|&i| i >= source.size)
                || post_ind.iter().any(|&j| j >= target.size)
            {
                return Err(SnnError::ShapeMismatch(format!(
                    "Connection '{}': edge index out of range for {}x{}",
                    connection.name, source.size, target.size
                )));
            }
        }
        self.connections.push(connection);
        Ok(ConnectionId(self.connections.len() - 1))
    }

    pub fn population(&self, id: PopulationId) -> &Population {
        &self.populations[id.0]
    }

    pub fn connection(&self, id: ConnectionId) -> &Connection {
        &self.connections[id.0]
    }

    fn try_population(&self, id: PopulationId) -> SnnResult<&Population> {
        self.populations.get(id.0).ok_or_else(|| {
            SnnError::InvalidConfig(format!("Population {} does not exist", id.0))
        })
    }

    /// The readout population, if exactly one is declared.
    pub fn readout_population(&self) -> Option<PopulationId> {
        let mut readouts = self
            .populations
            .iter()
            .enumerate()
            .filter(|(_, p)| p.model.readout().is_some());
        let first = readouts.next()?;
        if readouts.next().is_some() {
            return None;
        }
        Some(PopulationId(first.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lif() -> NeuronModel {
        NeuronModel::LeakyIntegrateFire {
            v_thresh: 1.0,
            tau_mem: 20.0,
            tau_refrac: None,
        }
    }

    #[test]
    fn test_uniform_collapses_when_empty_range() {
        let mut rng = StdRng::seed_from_u64(0);
        let init = Initializer::Uniform { min: 0.0, max: 0.0 };
        let m = init.sample_matrix((3, 4), &mut rng).expect("sample");
        assert!(m.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_uniform_within_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let init = Initializer::Uniform { min: 2.0, max: 5.0 };
        let v = init.sample_vec(500, &mut rng).expect("sample");
        assert!(v.iter().all(|&x| (2.0..5.0).contains(&x)));
    }

    #[test]
    fn test_normal_rejects_negative_sd() {
        let mut rng = StdRng::seed_from_u64(0);
        let init = Initializer::Normal { mean: 0.0, sd: -1.0 };
        assert!(init.sample_vec(1, &mut rng).is_err());
    }

    #[test]
    fn test_fixed_probability_extremes() {
        let mut rng = StdRng::seed_from_u64(3);
        let w = Initializer::Constant(0.1);
        let d = Initializer::Constant(0.0);
        let none = Connectivity::fixed_probability(5, 6, 0.0, w, d, &mut rng).expect("p=0");
        assert_eq!(none.num_synapses(5, 6), 0);
        let all = Connectivity::fixed_probability(5, 6, 1.0, w, d, &mut rng).expect("p=1");
        assert_eq!(all.num_synapses(5, 6), 30);
        assert!(Connectivity::fixed_probability(5, 6, 1.5, w, d, &mut rng).is_err());
    }

    #[test]
    fn test_add_connection_validates_edges() {
        let mut net = Network::new();
        let a = net.add_population(Population::new("a", lif(), 3));
        let b = net.add_population(Population::new("b", lif(), 2));
        let bad = Connectivity::Sparse {
            pre_ind: vec![0, 3],
            post_ind: vec![1, 1],
            weight: Initializer::Constant(1.0),
            delay: Initializer::Constant(0.0),
        };
        assert!(net.add_connection(Connection::new("ab", a, b, bad, 5.0)).is_err());

        let ragged = Connectivity::Sparse {
            pre_ind: vec![0],
            post_ind: vec![1, 1],
            weight: Initializer::Constant(1.0),
            delay: Initializer::Constant(0.0),
        };
        assert!(net.add_connection(Connection::new("ab", a, b, ragged, 5.0)).is_err());
    }

    #[test]
    fn test_cannot_target_input() {
        let mut net = Network::new();
        let input = net.add_population(Population::new(
            "in",
            NeuronModel::SpikeInput { max_spikes: 10 },
            4,
        ));
        let hidden = net.add_population(Population::new("h", lif(), 2));
        let dense = Connectivity::Dense {
            weight: Initializer::Constant(1.0),
            delay: Initializer::Constant(0.0),
        };
        assert!(net
            .add_connection(Connection::new("back", hidden, input, dense, 5.0))
            .is_err());
    }

    #[test]
    fn test_readout_population() {
        let mut net = Network::new();
        net.add_population(Population::new("h", lif(), 2));
        assert!(net.readout_population().is_none());
        let out = net.add_population(Population::new(
            "out",
            NeuronModel::LeakyIntegrate {
                tau_mem: 20.0,
                readout: Readout::MaxVar,
            },
            4,
        ));
        assert_eq!(net.readout_population(), Some(out));
    }
}
