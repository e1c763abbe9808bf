//! The two-module sequence network.
//!
//! ```text
//!  input_1 ──dense──▶ hidden_1 ◀──┐ recurrent (delayed)
//!                        │  ▲ ────┘
//!               cross    ▼  │   cross (sparse, delayed)
//!  input_2 ──dense──▶ hidden_2 ◀──┐ recurrent (delayed)
//!                        │ ───────┘
//!  hidden_1 ──▶ output[0..10)      hidden_2 ──▶ output[10..20)
//! ```
//!
//! Each hidden module writes only into its own half of the readout, so one
//! module can never drive the other module's class logits directly.

use crate::core::{
    ConnectionId, Connection, Connectivity, Initializer, Network, NeuronModel, Population,
    PopulationId, RateRegularisation, Readout, SnnError, SnnResult,
};
use crate::RunConfig;
use rand::Rng;
use std::ops::Range;

pub const V_THRESH: f32 = 1.0;
pub const TAU_MEM: f32 = 20.0;
pub const TAU_SYN: f32 = 5.0;
/// Spike count above which the rate regulariser starts penalising
pub const NU_UPPER: f32 = 1.0;

const INPUT_HIDDEN_WEIGHT: Initializer = Initializer::Normal {
    mean: 0.078,
    sd: 0.045,
};
const HIDDEN_HIDDEN_WEIGHT: Initializer = Initializer::Normal { mean: 0.0, sd: 0.02 };
const HIDDEN_OUTPUT_WEIGHT: Initializer = Initializer::Normal {
    mean: 0.2,
    sd: 0.37,
};
const NO_DELAY: Initializer = Initializer::Constant(0.0);

/// Ids of one module's populations and connections.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleHandles {
    pub input: PopulationId,
    pub hidden: PopulationId,
    pub input_hidden: ConnectionId,
    pub recurrent: ConnectionId,
    pub hidden_output: ConnectionId,
    /// Readout units this module connects to
    pub output_classes: Range<usize>,
}

/// The declared network plus typed handles into it.
#[derive(Debug, Clone)]
pub struct SequenceNetwork {
    pub network: Network,
    pub modules: [ModuleHandles; 2],
    pub output: PopulationId,
    /// Cross-module connections, `hidden_1 -> hidden_2` first; empty when sparsity is 0
    pub cross: Vec<ConnectionId>,
}

impl SequenceNetwork {
    /// Connections whose delays a gradient backend should learn.
    pub fn delay_learn_connections(&self) -> Vec<ConnectionId> {
        self.network
            .connections
            .iter()
            .enumerate()
            .filter(|(_, c)| c.trainable_delays)
            .map(|(i, _)| ConnectionId(i))
            .collect()
    }
}

/// Declare the two-module network described by `config`.
///
/// # Errors
/// `InvalidConfig` on a non-positive population size, a negative or
/// out-of-budget delay range, or invalid initialiser parameters.
pub fn build_sequence_network<R: Rng + ?Sized>(
    config: &RunConfig,
    rng: &mut R,
) -> SnnResult<SequenceNetwork> {
    validate(config)?;
    let num_hidden = config.num_hidden;
    let mut network = Network::new();

    let regularisation = RateRegularisation {
        lambda_upper: config.k_reg,
        nu_upper: NU_UPPER,
    };
    let inputs: Vec<PopulationId> = (1..=2)
        .map(|m| {
            network.add_population(Population::new(
                format!("input_{m}"),
                NeuronModel::SpikeInput {
                    max_spikes: config.batch_size * config.num_input,
                },
                config.num_input,
            ))
        })
        .collect();
    let hidden: Vec<PopulationId> = (1..=2)
        .map(|m| {
            network.add_population(
                Population::new(
                    format!("hidden_{m}"),
                    NeuronModel::LeakyIntegrateFire {
                        v_thresh: V_THRESH,
                        tau_mem: TAU_MEM,
                        tau_refrac: None,
                    },
                    num_hidden,
                )
                .record_spikes(true)
                .with_regularisation(regularisation),
            )
        })
        .collect();
    let output = network.add_population(Population::new(
        "output",
        NeuronModel::LeakyIntegrate {
            tau_mem: TAU_MEM,
            readout: Readout::MaxVar,
        },
        2 * config.classes_per_module,
    ));

    let mut input_hidden = Vec::with_capacity(2);
    for m in 0..2 {
        input_hidden.push(network.add_connection(Connection::new(
            format!("input_hidden_{}", m + 1),
            inputs[m],
            hidden[m],
            Connectivity::Dense {
                weight: INPUT_HIDDEN_WEIGHT,
                delay: NO_DELAY,
            },
            TAU_SYN,
        ))?);
    }

    let within_delay = Initializer::Uniform {
        min: config.delay_within_min,
        max: config.delay_within_max,
    };
    let mut recurrent = Vec::with_capacity(2);
    for m in 0..2 {
        let mut conn = Connection::new(
            format!("hidden_{0}_hidden_{0}", m + 1),
            hidden[m],
            hidden[m],
            Connectivity::Dense {
                weight: HIDDEN_HIDDEN_WEIGHT,
                delay: within_delay,
            },
            TAU_SYN,
        )
        .max_delay_steps(config.max_delay_steps);
        conn.trainable_delays = config.delays_within;
        recurrent.push(network.add_connection(conn)?);
    }

    let cross_delay = Initializer::Uniform {
        min: config.delay_min,
        max: config.delay_max,
    };
    let mut cross = Vec::with_capacity(2);
    for (pre, post) in [(0usize, 1usize), (1, 0)] {
        let Some(connectivity) = cross_connectivity(config, cross_delay, rng)? else {
            continue;
        };
        let mut conn = Connection::new(
            format!("hidden_{}_hidden_{}", pre + 1, post + 1),
            hidden[pre],
            hidden[post],
            connectivity,
            TAU_SYN,
        )
        .max_delay_steps(config.max_delay_steps);
        conn.trainable_delays = true;
        cross.push(network.add_connection(conn)?);
    }
    if cross.is_empty() {
        tracing::warn!(sparsity = config.sparsity, "Modules are not cross-connected");
    }

    let mut hidden_output = Vec::with_capacity(2);
    let mut output_classes = Vec::with_capacity(2);
    for m in 0..2 {
        let classes = m * config.classes_per_module..(m + 1) * config.classes_per_module;
        let (pre_ind, post_ind) = block_edges(num_hidden, classes.clone());
        hidden_output.push(network.add_connection(Connection::new(
            format!("hidden_{}_output", m + 1),
            hidden[m],
            output,
            Connectivity::Sparse {
                pre_ind,
                post_ind,
                weight: HIDDEN_OUTPUT_WEIGHT,
                delay: NO_DELAY,
            },
            TAU_SYN,
        ))?);
        output_classes.push(classes);
    }

    let module = |m: usize| ModuleHandles {
        input: inputs[m],
        hidden: hidden[m],
        input_hidden: input_hidden[m],
        recurrent: recurrent[m],
        hidden_output: hidden_output[m],
        output_classes: output_classes[m].clone(),
    };
    let modules = [module(0), module(1)];

    tracing::debug!(
        populations = network.populations.len(),
        connections = network.connections.len(),
        cross_synapses = cross
            .iter()
            .map(|&c| {
                let conn = network.connection(c);
                conn.connectivity.num_synapses(num_hidden, num_hidden)
            })
            .sum::<usize>(),
        "Built sequence network"
    );

    Ok(SequenceNetwork {
        network,
        modules,
        output,
        cross,
    })
}

fn validate(config: &RunConfig) -> SnnResult<()> {
    if config.num_hidden == 0 || config.num_input == 0 || config.classes_per_module == 0 {
        return Err(SnnError::InvalidConfig(
            "Population sizes must be > 0".to_string(),
        ));
    }
    let budget = config.max_delay_steps as f32 * config.dt;
    for (name, min, max) in [
        ("delay", config.delay_min, config.delay_max),
        ("delay_within", config.delay_within_min, config.delay_within_max),
    ] {
        if min < 0.0 || max < 0.0 {
            return Err(SnnError::InvalidConfig(format!(
                "{name} range [{min}, {max}) must be non-negative"
            )));
        }
        if min.max(max) > budget {
            return Err(SnnError::InvalidConfig(format!(
                "{name} range [{min}, {max}) exceeds {} delay steps",
                config.max_delay_steps
            )));
        }
    }
    Ok(())
}

/// Cross-module connectivity for `config.sparsity`, or `None` when the
/// modules stay disconnected.
///
/// A fixed-probability draw that produces no synapse is replaced by a single
/// random edge so the two modules are never fully disconnected.
fn cross_connectivity<R: Rng + ?Sized>(
    config: &RunConfig,
    delay: Initializer,
    rng: &mut R,
) -> SnnResult<Option<Connectivity>> {
    let n = config.num_hidden;
    if config.sparsity >= 1.0 {
        return Ok(Some(Connectivity::Dense {
            weight: HIDDEN_HIDDEN_WEIGHT,
            delay,
        }));
    }
    if config.sparsity <= 0.0 {
        return Ok(None);
    }
    let mut connectivity =
        Connectivity::fixed_probability(n, n, config.sparsity, HIDDEN_HIDDEN_WEIGHT, delay, rng)?;
    if let Connectivity::Sparse {
        pre_ind, post_ind, ..
    } = &mut connectivity
    {
        if pre_ind.is_empty() {
            pre_ind.push(rng.gen_range(0..n));
            post_ind.push(rng.gen_range(0..n));
        }
    }
    Ok(Some(connectivity))
}

/// All-to-all edges from `0..num_pre` onto the `post` range, grouped by post unit.
fn block_edges(num_pre: usize, post: Range<usize>) -> (Vec<usize>, Vec<usize>) {
    let mut pre_ind = Vec::with_capacity(num_pre * post.len());
    let mut post_ind = Vec::with_capacity(num_pre * post.len());
    for j in post {
        for i in 0..num_pre {
            pre_ind.push(i);
            post_ind.push(j);
        }
    }
    (pre_ind, post_ind)
}
