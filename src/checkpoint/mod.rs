//! Connectivity snapshots and their persistence.
//!
//! A snapshot stores every connection as an edge list so dense and sparse
//! projections share one format. Snapshots are written as
//! `<epoch>-connectivity.json` inside the run's checkpoint directory.

use crate::core::{SnnError, SnnResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

/// Weights and delays of one connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub name: String,
    pub num_pre: usize,
    pub num_post: usize,
    pub pre_ind: Vec<u32>,
    pub post_ind: Vec<u32>,
    pub weights: Vec<f32>,
    /// Delays in time units
    pub delays: Vec<f32>,
}

impl ConnectionSnapshot {
    pub fn num_synapses(&self) -> usize {
        self.pre_ind.len()
    }
}

/// All connections of a network at one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySnapshot {
    pub epoch: usize,
    pub network: String,
    pub connections: Vec<ConnectionSnapshot>,
}

impl ConnectivitySnapshot {
    pub fn connection(&self, name: &str) -> Option<&ConnectionSnapshot> {
        self.connections.iter().find(|c| c.name == name)
    }

    /// # Errors
    /// `ShapeMismatch` if any connection's edge arrays have different lengths.
    pub fn validate(&self) -> SnnResult<()> {
        for c in &self.connections {
            let n = c.pre_ind.len();
            if c.post_ind.len() != n || c.weights.len() != n || c.delays.len() != n {
                return Err(SnnError::ShapeMismatch(format!(
                    "Snapshot of '{}' has ragged edge arrays",
                    c.name
                )));
            }
        }
        Ok(())
    }
}

/// Persists snapshots keyed by epoch.
pub trait Serialiser {
    /// Write `snapshot`, returning where it went.
    ///
    /// # Errors
    /// `Io` / `Json` on write failure.
    fn save(&self, snapshot: &ConnectivitySnapshot) -> SnnResult<PathBuf>;

    /// Read the snapshot saved for `epoch`.
    ///
    /// # Errors
    /// `Io` if missing, `Json` if malformed.
    fn load(&self, epoch: usize) -> SnnResult<ConnectivitySnapshot>;
}

/// JSON files in one directory.
#[derive(Debug, Clone)]
pub struct JsonSerialiser {
    dir: PathBuf,
}

impl JsonSerialiser {
    /// Use `dir`, creating it if absent. Existing snapshots are kept and
    /// overwritten only when the same epoch is saved again.
    ///
    /// # Errors
    /// `Io` if the directory cannot be created.
    pub fn create(dir: impl Into<PathBuf>) -> SnnResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch}-connectivity.json"))
    }
}

impl Serialiser for JsonSerialiser {
    fn save(&self, snapshot: &ConnectivitySnapshot) -> SnnResult<PathBuf> {
        snapshot.validate()?;
        let path = self.path_for(snapshot.epoch);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, snapshot)?;
        writer.flush()?;
        Ok(path)
    }

    fn load(&self, epoch: usize) -> SnnResult<ConnectivitySnapshot> {
        let reader = BufReader::new(File::open(self.path_for(epoch))?);
        let snapshot: ConnectivitySnapshot = serde_json::from_reader(reader)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
