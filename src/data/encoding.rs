//! Linear latency encoding.
//!
//! Each pixel strictly above the threshold fires exactly once; brighter pixels
//! fire earlier:
//!
//! ```text
//! t = ((255 - intensity) / 255) * (max_time - min_time) + min_time
//! ```
//!
//! Spikes are stored per neuron in index order (not globally time-sorted) as a
//! prefix-count array plus a flat list of times.

use serde::{Deserialize, Serialize};

/// Spike events of one encoded image.
///
/// `end_spikes[i]` is the number of spikes emitted by neurons `0..=i`, so the
/// times of neuron `i` are `spike_times[end_spikes[i-1]..end_spikes[i]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSpikeTrain {
    pub end_spikes: Vec<u32>,
    pub spike_times: Vec<f32>,
}

impl EncodedSpikeTrain {
    pub fn num_neurons(&self) -> usize {
        self.end_spikes.len()
    }

    pub fn num_spikes(&self) -> usize {
        self.spike_times.len()
    }

    /// Spike times of neuron `neuron`, or `None` past the last neuron.
    pub fn neuron_spike_times(&self, neuron: usize) -> Option<&[f32]> {
        let start = match neuron.checked_sub(1) {
            None => 0,
            Some(prev) => *self.end_spikes.get(prev)? as usize,
        };
        let end = *self.end_spikes.get(neuron)? as usize;
        self.spike_times.get(start..end)
    }

    /// `(neuron, time)` pairs in neuron order.
    pub fn events(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        (0..self.num_neurons()).flat_map(move |n| {
            self.neuron_spike_times(n)
                .into_iter()
                .flatten()
                .map(move |&t| (n, t))
        })
    }
}

/// Linear latency encoder over a fixed time window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyEncoder {
    pub min_time: f32,
    pub max_time: f32,
    /// Pixels must be strictly greater than this to fire
    pub threshold: u8,
}

impl LatencyEncoder {
    pub fn new(min_time: f32, max_time: f32, threshold: u8) -> Self {
        Self {
            min_time,
            max_time,
            threshold,
        }
    }

    /// Encode one image of intensities in `0..=255`.
    pub fn encode<'a, I>(&self, pixels: I) -> EncodedSpikeTrain
    where
        I: IntoIterator<Item = &'a u8>,
    {
        let time_range = self.max_time - self.min_time;
        let mut end_spikes = Vec::new();
        let mut spike_times = Vec::new();
        for &intensity in pixels {
            if intensity > self.threshold {
                let latency = (255.0 - f32::from(intensity)) / 255.0;
                spike_times.push(latency * time_range + self.min_time);
            }
            end_spikes.push(spike_times.len() as u32);
        }
        EncodedSpikeTrain {
            end_spikes,
            spike_times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_encode_example() {
        let encoder = LatencyEncoder::new(0.0, 20.0, 1);
        let train = encoder.encode(&[0u8, 0, 255, 10]);
        assert_eq!(train.end_spikes, vec![0, 0, 1, 2]);
        assert_eq!(train.num_spikes(), 2);
        assert_abs_diff_eq!(train.spike_times[0], 0.0);
        assert_abs_diff_eq!(train.spike_times[1], 19.215_687, epsilon = 1e-4);

        let events: Vec<_> = train.events().collect();
        assert_eq!(events[0].0, 2);
        assert_eq!(events[1].0, 3);
    }

    #[test]
    fn test_threshold_is_strict() {
        let encoder = LatencyEncoder::new(0.0, 20.0, 10);
        let train = encoder.encode(&[10u8, 11]);
        assert_eq!(train.end_spikes, vec![0, 1]);
    }

    #[test]
    fn test_silent_image_has_no_spikes() {
        let encoder = LatencyEncoder::new(2.0, 18.0, 1);
        let train = encoder.encode(&[0u8, 1, 1, 0]);
        assert!(train.spike_times.is_empty());
        assert_eq!(train.end_spikes, vec![0; 4]);
    }

    #[test]
    fn test_end_spikes_monotone_and_counts_active() {
        let encoder = LatencyEncoder::new(102.0, 118.0, 1);
        let pixels: Vec<u8> = (0..784).map(|i| ((i * 37) % 256) as u8).collect();
        let train = encoder.encode(&pixels);
        let active = pixels.iter().filter(|&&p| p > 1).count();

        assert_eq!(train.num_neurons(), 784);
        assert!(train.end_spikes.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*train.end_spikes.last().expect("last") as usize, active);
        assert_eq!(train.spike_times.len(), active);
        assert!(train
            .spike_times
            .iter()
            .all(|&t| (102.0..=118.0).contains(&t)));
    }

    #[test]
    fn test_brighter_fires_earlier() {
        let encoder = LatencyEncoder::new(2.0, 18.0, 1);
        let train = encoder.encode(&[50u8, 200]);
        let dim = train.neuron_spike_times(0).expect("neuron 0");
        let bright = train.neuron_spike_times(1).expect("neuron 1");
        assert!(bright[0] < dim[0]);
    }

    #[test]
    fn test_spike_times_out_of_range() {
        let train = LatencyEncoder::new(0.0, 20.0, 1).encode(&[0u8, 255, 0]);
        assert_eq!(train.neuron_spike_times(0), Some(&[][..]));
        assert_eq!(train.neuron_spike_times(1).map(<[f32]>::len), Some(1));
        assert_eq!(train.neuron_spike_times(3), None);
        assert_eq!(train.neuron_spike_times(usize::MAX), None);
        assert_eq!(train.events().count(), 1);
    }
}
