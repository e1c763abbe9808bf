//! CPU reference backend.
//!
//! Clock-driven simulation of a declared [`Network`]:
//!
//! ```text
//! per step t (dt):
//!   I_c  = beta_c * I_c + arrivals_c(t)          exponential synapse, per connection
//!   v    = alpha * v + sum_c I_c                 LIF / LI membrane
//!   LIF: v >= v_thresh -> spike, v = 0
//!   spike of i at t arrives at t + 1 + delay_ij  integer-step delays
//! ```
//!
//! The readout score of each output unit is its maximum (or summed) membrane
//! voltage; the loss is softmax cross-entropy on those scores.
//!
//! ## Learning
//!
//! The readout voltage is linear in the hidden-to-output weights, so
//! `dL/dw_ij = (softmax_j - y_j) * psp_i(t*_j)` is exact for a fixed hidden
//! spike pattern (`psp_i` is the synapse-and-membrane filtered spike train of
//! hidden neuron `i`, `t*_j` the step where unit `j` peaked). Those are the
//! only task gradients computed here. Populations with a rate regulariser
//! additionally push down the input weights of neurons firing above
//! `nu_upper`. Spike-time gradients and delay learning are left to gradient
//! backends; delays stay at their initial values.
//!
//! Examples of a batch are simulated in parallel with Rayon (read-only access
//! to weights). Their metrics and gradients are then summed in example order
//! and applied as one Adam step, so results do not depend on the thread pool.

use super::optimiser::{Adam, AdamState};
use super::{Batch, BatchOutput, CompiledNetwork, Compiler, CompilerOptions};
use crate::checkpoint::{ConnectionSnapshot, ConnectivitySnapshot};
use crate::core::{
    ConnectionId, Connectivity, Network, NeuronModel, PopulationId, RateRegularisation, Readout,
    SnnError, SnnResult,
};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// Compiles networks for the CPU reference backend.
#[derive(Debug, Clone)]
pub struct ReferenceCompiler {
    options: CompilerOptions,
}

impl ReferenceCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }
}

#[derive(Debug, Clone)]
enum Dynamics {
    Input {
        max_spikes: usize,
    },
    Lif {
        alpha: f32,
        v_thresh: f32,
        refrac_steps: usize,
    },
    Li {
        alpha: f32,
    },
}

#[derive(Debug, Clone)]
struct CompiledPopulation {
    name: String,
    size: usize,
    dynamics: Dynamics,
    record_spikes: bool,
    regularisation: Option<RateRegularisation>,
}

/// What, if anything, updates a connection's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Plasticity {
    Fixed,
    /// Feeds the readout; trained on the task loss
    Readout,
    /// Input projection onto a rate-regularised population
    Regularised,
}

#[derive(Debug, Clone)]
struct CompiledConnection {
    name: String,
    source: usize,
    target: usize,
    /// `(num_pre, num_post)`; zero where `mask` is false
    weights: Array2<f32>,
    /// `None` for dense connectivity
    mask: Option<Array2<bool>>,
    /// Delays in time units, as initialised
    delays: Array2<f32>,
    delay_steps: Array2<usize>,
    beta: f32,
    plasticity: Plasticity,
    adam: Option<AdamState>,
}

impl CompiledConnection {
    fn num_pre(&self) -> usize {
        self.weights.nrows()
    }

    fn num_post(&self) -> usize {
        self.weights.ncols()
    }

    fn exists(&self, i: usize, j: usize) -> bool {
        self.mask.as_ref().map_or(true, |m| m[[i, j]])
    }

    fn ring_len(&self) -> usize {
        self.delay_steps.iter().copied().max().unwrap_or(0) + 2
    }
}

impl Compiler for ReferenceCompiler {
    type Output = ReferenceNetwork;

    fn compile(&self, network: &Network, name: &str) -> SnnResult<ReferenceNetwork> {
        let dt = self.options.dt;
        if dt <= 0.0 || self.options.example_timesteps == 0 {
            return Err(SnnError::InvalidConfig(
                "dt and example_timesteps must be > 0".to_string(),
            ));
        }
        let readout = network.readout_population().ok_or_else(|| {
            SnnError::InvalidConfig("Network needs exactly one readout population".to_string())
        })?;
        let readout_kind = network
            .population(readout)
            .model
            .readout()
            .unwrap_or(Readout::MaxVar);
        let mut rng = StdRng::seed_from_u64(self.options.rng_seed);

        let populations: Vec<CompiledPopulation> = network
            .populations
            .iter()
            .map(|p| CompiledPopulation {
                name: p.name.clone(),
                size: p.size,
                dynamics: match p.model {
                    NeuronModel::SpikeInput { max_spikes } => Dynamics::Input { max_spikes },
                    NeuronModel::LeakyIntegrateFire {
                        v_thresh,
                        tau_mem,
                        tau_refrac,
                    } => Dynamics::Lif {
                        alpha: (-dt / tau_mem).exp(),
                        v_thresh,
                        refrac_steps: tau_refrac.map_or(0, |t| steps(t, dt)),
                    },
                    NeuronModel::LeakyIntegrate { tau_mem, .. } => Dynamics::Li {
                        alpha: (-dt / tau_mem).exp(),
                    },
                },
                record_spikes: p.record_spikes,
                regularisation: p.regularisation,
            })
            .collect();

        let mut connections = Vec::with_capacity(network.connections.len());
        for conn in &network.connections {
            let num_pre = populations[conn.source.0].size;
            let num_post = populations[conn.target.0].size;
            let (weights, mask, delays) = match &conn.connectivity {
                Connectivity::Dense { weight, delay } => (
                    weight.sample_matrix((num_pre, num_post), &mut rng)?,
                    None,
                    delay.sample_matrix((num_pre, num_post), &mut rng)?,
                ),
                Connectivity::Sparse {
                    pre_ind,
                    post_ind,
                    weight,
                    delay,
                } => {
                    let w = weight.sample_vec(pre_ind.len(), &mut rng)?;
                    let d = delay.sample_vec(pre_ind.len(), &mut rng)?;
                    let mut weights = Array2::zeros((num_pre, num_post));
                    let mut delays = Array2::zeros((num_pre, num_post));
                    let mut mask = Array2::from_elem((num_pre, num_post), false);
                    for (k, (&i, &j)) in pre_ind.iter().zip(post_ind).enumerate() {
                        weights[[i, j]] = w[k];
                        delays[[i, j]] = d[k];
                        mask[[i, j]] = true;
                    }
                    (weights, Some(mask), delays)
                }
            };
            let delay_steps = delays.mapv(|d| steps(d, dt));
            if let Some(&worst) = delay_steps.iter().max() {
                if worst > conn.max_delay_steps {
                    return Err(SnnError::InvalidConfig(format!(
                        "Connection '{}' has a {worst}-step delay but a budget of {}",
                        conn.name, conn.max_delay_steps
                    )));
                }
            }

            let plasticity = if conn.target == readout {
                if delay_steps.iter().any(|&d| d != 0) {
                    return Err(SnnError::InvalidConfig(format!(
                        "Readout connection '{}' must not be delayed",
                        conn.name
                    )));
                }
                Plasticity::Readout
            } else if populations[conn.source.0].dynamics.is_input()
                && populations[conn.target.0].regularisation.is_some()
            {
                Plasticity::Regularised
            } else {
                Plasticity::Fixed
            };

            connections.push(CompiledConnection {
                name: conn.name.clone(),
                source: conn.source.0,
                target: conn.target.0,
                adam: (plasticity != Plasticity::Fixed)
                    .then(|| AdamState::new((num_pre, num_post))),
                weights,
                mask,
                delays,
                delay_steps,
                beta: (-dt / conn.tau_syn).exp(),
                plasticity,
            });
        }

        for id in &self.options.delay_learn_conns {
            let conn = connections
                .get(id.0)
                .ok_or(SnnError::UnknownConnection(id.0))?;
            tracing::warn!(
                connection = %conn.name,
                "Reference backend keeps delays fixed; delay learning is skipped"
            );
        }

        tracing::info!(
            name,
            populations = populations.len(),
            connections = connections.len(),
            timesteps = self.options.example_timesteps,
            "Compiled reference network"
        );

        Ok(ReferenceNetwork {
            name: name.to_string(),
            options: self.options.clone(),
            optimiser: Adam::new(self.options.learning_rate),
            populations,
            connections,
            readout: readout.0,
            readout_kind,
        })
    }
}

impl Dynamics {
    fn is_input(&self) -> bool {
        matches!(self, Dynamics::Input { .. })
    }
}

/// Nearest whole number of steps; used for delays and refractory periods.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn steps(time: f32, dt: f32) -> usize {
    (time / dt).round().max(0.0) as usize
}

/// Step during which an event at `time` is delivered.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bin(time: f32, dt: f32) -> usize {
    (time / dt).floor().max(0.0) as usize
}

/// Spikes of one presynaptic population passed through a readout
/// connection's synapse and the readout membrane, as if every weight were one.
struct PresynapticTrace {
    syn: Vec<f32>,
    mem: Vec<f32>,
    /// `[post][pre]`
    at_readout: Vec<Vec<f32>>,
}

impl PresynapticTrace {
    fn new(num_pre: usize, num_post: usize) -> Self {
        Self {
            syn: vec![0.0; num_pre],
            mem: vec![0.0; num_pre],
            at_readout: vec![vec![0.0; num_pre]; num_post],
        }
    }

    /// `arrived` are the presynaptic spikes of the previous step.
    fn advance(&mut self, beta: f32, alpha: f32, arrived: &[usize]) {
        self.syn.iter_mut().for_each(|s| *s *= beta);
        for &i in arrived {
            self.syn[i] += 1.0;
        }
        for (m, &s) in self.mem.iter_mut().zip(self.syn.iter()) {
            *m = alpha * *m + s;
        }
    }

    fn capture(&mut self, post: usize) {
        self.at_readout[post].clone_from(&self.mem);
    }

    fn accumulate(&mut self) {
        for row in &mut self.at_readout {
            for (r, &m) in row.iter_mut().zip(self.mem.iter()) {
                *r += m;
            }
        }
    }
}

/// A network compiled for the reference backend.
#[derive(Debug, Clone)]
pub struct ReferenceNetwork {
    name: String,
    options: CompilerOptions,
    optimiser: Adam,
    populations: Vec<CompiledPopulation>,
    connections: Vec<CompiledConnection>,
    readout: usize,
    readout_kind: Readout,
}

/// Result of simulating one example.
struct ExampleTrace {
    scores: Vec<f32>,
    /// Per population, per neuron
    spike_counts: Vec<Vec<f32>>,
    /// Indexed like `connections`; for readout connections the filtered
    /// presynaptic trace at each output unit's peak, `[post][pre]`
    readout_traces: Vec<Option<Vec<Vec<f32>>>>,
}

/// Batch accumulator.
struct Accumulator {
    output: BatchOutput,
    /// Summed gradients, indexed like `connections`; `None` for fixed ones
    grads: Vec<Option<Array2<f32>>>,
}

impl ReferenceNetwork {
    fn connection(&self, id: ConnectionId) -> SnnResult<&CompiledConnection> {
        self.connections
            .get(id.0)
            .ok_or(SnnError::UnknownConnection(id.0))
    }

    fn new_accumulator(&self, with_grads: bool) -> Accumulator {
        Accumulator {
            output: BatchOutput::default(),
            grads: self
                .connections
                .iter()
                .map(|c| {
                    (with_grads && c.plasticity != Plasticity::Fixed)
                        .then(|| Array2::zeros(c.weights.dim()))
                })
                .collect(),
        }
    }

    fn check_batch(&self, batch: &Batch<'_>) -> SnnResult<()> {
        batch.validate()?;
        if batch.len() > self.options.batch_size {
            return Err(SnnError::ShapeMismatch(format!(
                "Batch of {} examples, compiled for at most {}",
                batch.len(),
                self.options.batch_size
            )));
        }
        let num_outputs = self.populations[self.readout].size;
        if let Some(&bad) = batch.labels.iter().find(|&&l| l >= num_outputs) {
            return Err(SnnError::ShapeMismatch(format!(
                "Label {bad} outside readout of {num_outputs} units"
            )));
        }
        for (p, pop) in self.populations.iter().enumerate() {
            let Dynamics::Input { max_spikes } = pop.dynamics else {
                continue;
            };
            let trains = batch.input(PopulationId(p)).ok_or_else(|| {
                SnnError::ShapeMismatch(format!("Batch has no spikes for input '{}'", pop.name))
            })?;
            if let Some(bad) = trains.iter().find(|t| t.num_neurons() != pop.size) {
                return Err(SnnError::ShapeMismatch(format!(
                    "Input '{}' has {} neurons, spike train has {}",
                    pop.name,
                    pop.size,
                    bad.num_neurons()
                )));
            }
            let total: usize = trains.iter().map(|t| t.num_spikes()).sum();
            if total > max_spikes {
                return Err(SnnError::Simulation(format!(
                    "Input '{}' received {total} spikes, capacity is {max_spikes}",
                    pop.name
                )));
            }
        }
        Ok(())
    }

    /// Simulate example `k` of `batch`.
    fn simulate(&self, batch: &Batch<'_>, k: usize) -> ExampleTrace {
        let num_steps = self.options.example_timesteps;
        let dt = self.options.dt;

        // Input spikes binned by step
        let mut input_events: Vec<Vec<Vec<usize>>> = vec![Vec::new(); self.populations.len()];
        for (p, pop) in self.populations.iter().enumerate() {
            if !pop.dynamics.is_input() {
                continue;
            }
            let mut by_step = vec![Vec::new(); num_steps];
            if let Some(trains) = batch.input(PopulationId(p)) {
                for (neuron, time) in trains[k].events() {
                    let step = bin(time, dt);
                    if step < num_steps {
                        by_step[step].push(neuron);
                    }
                }
            }
            input_events[p] = by_step;
        }

        let mut v: Vec<Vec<f32>> = self.populations.iter().map(|p| vec![0.0; p.size]).collect();
        let mut refrac: Vec<Vec<usize>> =
            self.populations.iter().map(|p| vec![0; p.size]).collect();
        let mut spike_counts: Vec<Vec<f32>> =
            self.populations.iter().map(|p| vec![0.0; p.size]).collect();
        let mut spikes: Vec<Vec<usize>> = vec![Vec::new(); self.populations.len()];
        let mut prev_spikes: Vec<Vec<usize>> = vec![Vec::new(); self.populations.len()];

        let mut isyn: Vec<Vec<f32>> = self
            .connections
            .iter()
            .map(|c| vec![0.0; c.num_post()])
            .collect();
        let mut rings: Vec<Vec<Vec<f32>>> = self
            .connections
            .iter()
            .map(|c| vec![vec![0.0; c.num_post()]; c.ring_len()])
            .collect();

        // Readout bookkeeping
        let num_out = self.populations[self.readout].size;
        let out_alpha = match self.populations[self.readout].dynamics {
            Dynamics::Li { alpha } => alpha,
            _ => 1.0,
        };
        let mut scores = match self.readout_kind {
            Readout::MaxVar => vec![f32::NEG_INFINITY; num_out],
            Readout::SumVar => vec![0.0; num_out],
        };
        let mut traces: Vec<Option<PresynapticTrace>> = self
            .connections
            .iter()
            .map(|c| {
                (c.plasticity == Plasticity::Readout)
                    .then(|| PresynapticTrace::new(c.num_pre(), num_out))
            })
            .collect();

        for t in 0..num_steps {
            // Synaptic currents
            for (ci, conn) in self.connections.iter().enumerate() {
                let slot = t % rings[ci].len();
                for (i, arrived) in isyn[ci].iter_mut().zip(rings[ci][slot].iter_mut()) {
                    *i = conn.beta * *i + *arrived;
                    *arrived = 0.0;
                }
            }

            // Membranes
            for (p, pop) in self.populations.iter().enumerate() {
                spikes[p].clear();
                match pop.dynamics {
                    Dynamics::Input { .. } => spikes[p].extend_from_slice(&input_events[p][t]),
                    Dynamics::Lif {
                        alpha,
                        v_thresh,
                        refrac_steps,
                    } => {
                        let current = self.total_current(p, &isyn);
                        for j in 0..pop.size {
                            if refrac[p][j] > 0 {
                                refrac[p][j] -= 1;
                                continue;
                            }
                            v[p][j] = alpha * v[p][j] + current[j];
                            if v[p][j] >= v_thresh {
                                v[p][j] = 0.0;
                                refrac[p][j] = refrac_steps;
                                spikes[p].push(j);
                            }
                        }
                    }
                    Dynamics::Li { alpha } => {
                        let current = self.total_current(p, &isyn);
                        for j in 0..pop.size {
                            v[p][j] = alpha * v[p][j] + current[j];
                        }
                    }
                }
                for &j in &spikes[p] {
                    spike_counts[p][j] += 1.0;
                }
            }

            // Presynaptic traces mirror the readout's synapse and membrane filters
            for (conn, trace) in self.connections.iter().zip(traces.iter_mut()) {
                if let Some(trace) = trace {
                    trace.advance(conn.beta, out_alpha, &prev_spikes[conn.source]);
                }
            }

            let out_v = &v[self.readout];
            match self.readout_kind {
                Readout::MaxVar => {
                    for j in 0..num_out {
                        if out_v[j] > scores[j] {
                            scores[j] = out_v[j];
                            for trace in traces.iter_mut().flatten() {
                                trace.capture(j);
                            }
                        }
                    }
                }
                Readout::SumVar => {
                    for j in 0..num_out {
                        scores[j] += out_v[j];
                    }
                    for trace in traces.iter_mut().flatten() {
                        trace.accumulate();
                    }
                }
            }

            // Emit spikes into delay rings
            for (ci, conn) in self.connections.iter().enumerate() {
                let ring_len = rings[ci].len();
                for &i in &spikes[conn.source] {
                    for j in 0..conn.num_post() {
                        if conn.exists(i, j) {
                            let slot = (t + 1 + conn.delay_steps[[i, j]]) % ring_len;
                            rings[ci][slot][j] += conn.weights[[i, j]];
                        }
                    }
                }
            }

            std::mem::swap(&mut spikes, &mut prev_spikes);
        }

        ExampleTrace {
            scores,
            spike_counts,
            readout_traces: traces
                .into_iter()
                .map(|t| t.map(|t| t.at_readout))
                .collect(),
        }
    }

    fn total_current(&self, target: usize, isyn: &[Vec<f32>]) -> Vec<f32> {
        let mut current = vec![0.0; self.populations[target].size];
        for (ci, conn) in self.connections.iter().enumerate() {
            if conn.target == target {
                for (c, &i) in current.iter_mut().zip(isyn[ci].iter()) {
                    *c += i;
                }
            }
        }
        current
    }

    /// Fold one simulated example into `acc`.
    fn accumulate(
        &self,
        acc: &mut Accumulator,
        trace: ExampleTrace,
        batch: &Batch<'_>,
        k: usize,
    ) {
        let label = batch.labels[k];
        let probs = softmax(&trace.scores);
        let predicted = argmax(&trace.scores);
        acc.output.num_trials += 1;
        if predicted == label {
            acc.output.num_correct += 1;
        }
        acc.output.loss_sum += -probs[label].max(f32::MIN_POSITIVE).ln();

        for (p, pop) in self.populations.iter().enumerate() {
            if pop.record_spikes {
                let counts = Array1::from(trace.spike_counts[p].clone());
                acc.output
                    .spike_counts
                    .entry(PopulationId(p))
                    .and_modify(|a| *a += &counts)
                    .or_insert(counts);
            }
        }

        for (ci, conn) in self.connections.iter().enumerate() {
            let Some(grad) = acc.grads[ci].as_mut() else {
                continue;
            };
            match conn.plasticity {
                Plasticity::Readout => {
                    let Some(traces) = trace.readout_traces[ci].as_ref() else {
                        continue;
                    };
                    for j in 0..conn.num_post() {
                        let err = probs[j] - if j == label { 1.0 } else { 0.0 };
                        for i in 0..conn.num_pre() {
                            if conn.exists(i, j) {
                                grad[[i, j]] += err * traces[j][i];
                            }
                        }
                    }
                }
                Plasticity::Regularised => {
                    let Some(reg) = self.populations[conn.target].regularisation else {
                        continue;
                    };
                    let excess: Vec<(usize, f32)> = trace.spike_counts[conn.target]
                        .iter()
                        .enumerate()
                        .filter(|(_, &c)| c > reg.nu_upper)
                        .map(|(j, &c)| (j, reg.lambda_upper * (c - reg.nu_upper)))
                        .collect();
                    if excess.is_empty() {
                        continue;
                    }
                    if let Some(trains) = batch.input(PopulationId(conn.source)) {
                        for (i, _) in trains[k].events() {
                            for &(j, g) in &excess {
                                if conn.exists(i, j) {
                                    grad[[i, j]] += g;
                                }
                            }
                        }
                    }
                }
                Plasticity::Fixed => {}
            }
        }
    }

    /// Simulation runs in parallel; per-example results are then folded in
    /// example order so the f32 sums do not depend on the thread count.
    fn run_batch(&self, batch: &Batch<'_>, with_grads: bool) -> SnnResult<Accumulator> {
        self.check_batch(batch)?;
        let traces: Vec<ExampleTrace> = (0..batch.len())
            .into_par_iter()
            .map(|k| self.simulate(batch, k))
            .collect();
        let mut acc = self.new_accumulator(with_grads);
        for (k, trace) in traces.into_iter().enumerate() {
            self.accumulate(&mut acc, trace, batch, k);
        }
        Ok(acc)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn index(i: usize) -> u32 {
    i as u32
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exp: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

fn argmax(scores: &[f32]) -> usize {
    scores
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

impl CompiledNetwork for ReferenceNetwork {
    fn name(&self) -> &str {
        &self.name
    }

    #[allow(clippy::cast_precision_loss)]
    fn train_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput> {
        let acc = self.run_batch(batch, true)?;
        if batch.is_empty() {
            return Ok(acc.output);
        }
        let scale = 1.0 / batch.len() as f32;
        let optimiser = self.optimiser;
        for (conn, grad) in self.connections.iter_mut().zip(acc.grads) {
            let (Some(grad), Some(state)) = (grad, conn.adam.as_mut()) else {
                continue;
            };
            optimiser.step(state, &mut conn.weights, &(grad * scale));
        }
        tracing::debug!(
            trials = acc.output.num_trials,
            correct = acc.output.num_correct,
            loss = acc.output.mean_loss(),
            lr = optimiser.alpha,
            "Trained batch"
        );
        Ok(acc.output)
    }

    fn evaluate_batch(&mut self, batch: &Batch<'_>) -> SnnResult<BatchOutput> {
        Ok(self.run_batch(batch, false)?.output)
    }

    fn learning_rate(&self) -> f32 {
        self.optimiser.alpha
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.optimiser.alpha = learning_rate;
    }

    fn pull_weights(&mut self, conn: ConnectionId) -> SnnResult<Array2<f32>> {
        Ok(self.connection(conn)?.weights.clone())
    }

    fn push_weights(&mut self, conn: ConnectionId, weights: &Array2<f32>) -> SnnResult<()> {
        let target = self
            .connections
            .get_mut(conn.0)
            .ok_or(SnnError::UnknownConnection(conn.0))?;
        if weights.dim() != target.weights.dim() {
            return Err(SnnError::ShapeMismatch(format!(
                "Connection '{}' is {:?}, got {:?}",
                target.name,
                target.weights.dim(),
                weights.dim()
            )));
        }
        match &target.mask {
            None => target.weights.assign(weights),
            Some(mask) => ndarray::Zip::from(&mut target.weights)
                .and(weights)
                .and(mask)
                .for_each(|w, &new, &present| {
                    if present {
                        *w = new;
                    }
                }),
        }
        Ok(())
    }

    fn snapshot(&mut self, epoch: usize) -> SnnResult<ConnectivitySnapshot> {
        let connections = self
            .connections
            .iter()
            .map(|c| {
                let mut snap = ConnectionSnapshot {
                    name: c.name.clone(),
                    num_pre: c.num_pre(),
                    num_post: c.num_post(),
                    pre_ind: Vec::new(),
                    post_ind: Vec::new(),
                    weights: Vec::new(),
                    delays: Vec::new(),
                };
                for ((i, j), &w) in c.weights.indexed_iter() {
                    if c.exists(i, j) {
                        snap.pre_ind.push(index(i));
                        snap.post_ind.push(index(j));
                        snap.weights.push(w);
                        snap.delays.push(c.delays[[i, j]]);
                    }
                }
                snap
            })
            .collect();
        Ok(ConnectivitySnapshot {
            epoch,
            network: self.name.clone(),
            connections,
        })
    }
}
