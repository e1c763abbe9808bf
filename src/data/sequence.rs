//! Pairing two digits into one sequenced example.
//!
//! Every example presents two images, one to each module, in two disjoint time
//! windows. A coin flip `seq` decides which module sees its digit first. The
//! 20-way target names one of the two digits, offset by 10 when it belongs to
//! module 2; the parity `sigma = (label1 + label2) % 2` picks which one:
//!
//! ```text
//! seq = 1 (module 1 first):  label1 * sigma + (1 - sigma) * (label2 + 10)
//! seq = 0 (module 2 first):  (label2 + 10) * sigma + (1 - sigma) * label1
//! ```
//!
//! So an odd pair is labelled with the earlier digit and an even pair with the
//! later one.

use super::encoding::{EncodedSpikeTrain, LatencyEncoder};
use super::mnist::Dataset;
use crate::core::{SnnError, SnnResult};
use crate::RunConfig;
use rand::seq::index;
use rand::Rng;
use rayon::prelude::*;

/// Merged 20-way label of a digit pair. Both labels must be below 10.
pub fn merged_label(label1: u8, label2: u8, seq: bool) -> u8 {
    debug_assert!(
        label1 < 10 && label2 < 10,
        "digit labels {label1}, {label2} out of range"
    );
    let odd = (label1 ^ label2) & 1 == 1;
    if odd == seq {
        label1
    } else {
        label2 + 10
    }
}

/// One pair of encoded digits and its merged label.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencedExample {
    /// Spike trains for module 1 and module 2
    pub module_spikes: [EncodedSpikeTrain; 2],
    pub label: u8,
    /// True when module 1 received the earlier window
    pub seq: bool,
}

/// All sequenced examples of one split for one epoch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequencedDataset {
    pub examples: Vec<SequencedExample>,
}

impl SequencedDataset {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

/// Samples digit pairs and encodes them into the two time windows.
#[derive(Debug, Clone, Copy)]
pub struct PairSequencer {
    pub early: LatencyEncoder,
    pub late: LatencyEncoder,
}

impl PairSequencer {
    /// Windows `[2dt, example_time - 2dt)` and the same shifted by `offset`.
    pub fn new(example_time: f32, dt: f32, offset: f32, threshold: u8) -> Self {
        let min_time = 2.0 * dt;
        let max_time = example_time - 2.0 * dt;
        Self {
            early: LatencyEncoder::new(min_time, max_time, threshold),
            late: LatencyEncoder::new(min_time + offset, max_time + offset, threshold),
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.example_time,
            config.dt,
            config.sequence_offset,
            config.encode_threshold,
        )
    }

    /// Build `primary.len()` pairs: image 1 from `primary`, image 2 from `secondary`.
    ///
    /// Random draws happen sequentially in a fixed order (primary indices,
    /// secondary indices, orderings) so a seeded `rng` reproduces the same
    /// dataset; encoding then runs in parallel.
    ///
    /// # Errors
    /// `InvalidConfig` if either dataset is empty.
    pub fn sequence<R: Rng + ?Sized>(
        &self,
        primary: &Dataset,
        secondary: &Dataset,
        rng: &mut R,
    ) -> SnnResult<SequencedDataset> {
        if primary.is_empty() || secondary.is_empty() {
            return Err(SnnError::InvalidConfig(
                "Cannot sequence pairs from an empty dataset".to_string(),
            ));
        }
        let num_pairs = primary.len();
        let indices_1 = draw_without_repeats(rng, primary.len(), num_pairs);
        let indices_2 = draw_without_repeats(rng, secondary.len(), num_pairs);
        let sequence: Vec<bool> = (0..num_pairs).map(|_| rng.gen_range(0..2) == 1).collect();

        let examples = (0..num_pairs)
            .into_par_iter()
            .map(|k| {
                let (i1, i2, seq) = (indices_1[k], indices_2[k], sequence[k]);
                let (enc_1, enc_2) = if seq {
                    (&self.early, &self.late)
                } else {
                    (&self.late, &self.early)
                };
                SequencedExample {
                    module_spikes: [
                        enc_1.encode(primary.image(i1)),
                        enc_2.encode(secondary.image(i2)),
                    ],
                    label: merged_label(primary.label(i1), secondary.label(i2), seq),
                    seq,
                }
            })
            .collect();

        Ok(SequencedDataset { examples })
    }
}

/// `amount` indices from `0..len`, no index repeated within any run of `len`.
fn draw_without_repeats<R: Rng + ?Sized>(rng: &mut R, len: usize, amount: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(amount);
    while out.len() < amount {
        let take = (amount - out.len()).min(len);
        out.extend(index::sample(rng, len, take).into_iter());
    }
    out
}
