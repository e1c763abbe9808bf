//! Per-epoch CSV metric logs.

use crate::core::SnnResult;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const HEADER: &str = "epoch,num_trials,num_correct,accuracy,loss,elapsed_secs";

/// One row of a training or validation log.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochRecord {
    pub epoch: usize,
    pub num_trials: usize,
    pub num_correct: usize,
    pub accuracy: f32,
    /// Mean per-example loss
    pub loss: f32,
    pub elapsed_secs: f64,
}

/// Truncating CSV writer, flushed after every row so the file can be tailed.
#[derive(Debug)]
pub struct CsvLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvLog {
    /// Create (or truncate) `path`, creating parent directories, and write the header.
    ///
    /// # Errors
    /// `Io` if the file cannot be created.
    pub fn create(path: &Path) -> SnnResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        writeln!(writer, "{HEADER}")?;
        writer.flush()?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    /// `Io` on write failure.
    pub fn write(&mut self, record: &EpochRecord) -> SnnResult<()> {
        writeln!(
            self.writer,
            "{},{},{},{},{},{:.3}",
            record.epoch,
            record.num_trials,
            record.num_correct,
            record.accuracy,
            record.loss,
            record.elapsed_secs
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results").join("train.csv");
        let mut log = CsvLog::create(&path).expect("create");
        log.write(&EpochRecord {
            epoch: 0,
            num_trials: 4,
            num_correct: 1,
            accuracy: 0.25,
            loss: 1.5,
            elapsed_secs: 0.5,
        })
        .expect("write");
        let text = fs::read_to_string(log.path()).expect("read");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![HEADER, "0,4,1,0.25,1.5,0.500"]);
    }
}
