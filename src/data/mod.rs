//! Dataset loading and preprocessing.
//!
//! - [`mnist`]: gzipped IDX file loading into [`Dataset`]s
//! - [`encoding`]: linear latency encoding of images into spike trains
//! - [`sequence`]: pairing two digits into one temporally sequenced example

pub mod encoding;
pub mod mnist;
pub mod sequence;

pub use encoding::{EncodedSpikeTrain, LatencyEncoder};
pub use mnist::{load_mnist, Dataset, MnistFiles};
pub use sequence::{merged_label, PairSequencer, SequencedDataset, SequencedExample};
