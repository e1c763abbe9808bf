//! MNIST IDX loading.
//!
//! Reads the four gzipped IDX files of the digit dataset. Header layout is
//! big-endian `u32`s: magic, item count, and for images rows and columns.

use crate::core::{SnnError, SnnResult};
use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use ndarray::{Array2, ArrayView1};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

pub const IMAGE_MAGIC: u32 = 2_051;
pub const LABEL_MAGIC: u32 = 2_049;
pub const IMAGE_SIDE: usize = 28;
pub const IMAGE_PIXELS: usize = IMAGE_SIDE * IMAGE_SIDE;
pub const NUM_CLASSES: usize = 10;

/// File names of the four MNIST archives.
#[derive(Debug, Clone)]
pub struct MnistFiles {
    pub train_images: &'static str,
    pub train_labels: &'static str,
    pub test_images: &'static str,
    pub test_labels: &'static str,
}

impl Default for MnistFiles {
    fn default() -> Self {
        Self {
            train_images: "train-images-idx3-ubyte.gz",
            train_labels: "train-labels-idx1-ubyte.gz",
            test_images: "t10k-images-idx3-ubyte.gz",
            test_labels: "t10k-labels-idx1-ubyte.gz",
        }
    }
}

impl MnistFiles {
    pub fn all(&self) -> [&'static str; 4] {
        [
            self.train_images,
            self.train_labels,
            self.test_images,
            self.test_labels,
        ]
    }
}

/// Labelled images, one row of `images` per label.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// `(n, 784)` pixel intensities
    pub images: Array2<u8>,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Build a dataset, checking that images and labels line up.
    ///
    /// # Errors
    /// `Dataset` if the row count differs from the label count or a label is >= 10.
    pub fn new(images: Array2<u8>, labels: Vec<u8>) -> SnnResult<Self> {
        if images.nrows() != labels.len() {
            return Err(SnnError::Dataset(format!(
                "{} images but {} labels",
                images.nrows(),
                labels.len()
            )));
        }
        if let Some(bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
            return Err(SnnError::Dataset(format!("Label {bad} out of range")));
        }
        Ok(Self { images, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn image(&self, index: usize) -> ArrayView1<'_, u8> {
        self.images.row(index)
    }

    pub fn label(&self, index: usize) -> u8 {
        self.labels[index]
    }
}

/// Load the training and test splits from `dir`.
///
/// With the `download` feature, missing archives are fetched into `dir` first.
///
/// # Errors
/// `Io` if a file cannot be opened or decompressed, `Dataset` on a malformed header
/// or payload.
pub fn load_mnist(dir: &Path) -> SnnResult<(Dataset, Dataset)> {
    let files = MnistFiles::default();

    #[cfg(feature = "download")]
    download::fetch_missing(dir, &files)?;

    let train = Dataset::new(
        read_idx_images(&require(dir, files.train_images)?)?,
        read_idx_labels(&require(dir, files.train_labels)?)?,
    )?;
    let test = Dataset::new(
        read_idx_images(&require(dir, files.test_images)?)?,
        read_idx_labels(&require(dir, files.test_labels)?)?,
    )?;
    tracing::info!(
        train = train.len(),
        test = test.len(),
        dir = %dir.display(),
        "Loaded MNIST"
    );
    Ok((train, test))
}

fn require(dir: &Path, name: &str) -> SnnResult<PathBuf> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(SnnError::Dataset(format!(
            "Missing dataset file {}",
            path.display()
        )))
    }
}

fn open_gz(path: &Path) -> SnnResult<GzDecoder<BufReader<File>>> {
    Ok(GzDecoder::new(BufReader::new(File::open(path)?)))
}

/// Read a gzipped IDX3 image file into an `(n, 784)` array.
///
/// # Errors
/// `Dataset` on wrong magic, image size or payload length.
pub fn read_idx_images(path: &Path) -> SnnResult<Array2<u8>> {
    let mut decoder = open_gz(path)?;
    let magic = decoder.read_u32::<BigEndian>()?;
    if magic != IMAGE_MAGIC {
        return Err(SnnError::Dataset(format!(
            "{}: image magic {magic}, expected {IMAGE_MAGIC}",
            path.display()
        )));
    }
    let n = decoder.read_u32::<BigEndian>()? as usize;
    let rows = decoder.read_u32::<BigEndian>()? as usize;
    let cols = decoder.read_u32::<BigEndian>()? as usize;
    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        return Err(SnnError::Dataset(format!(
            "{}: images are {rows}x{cols}, expected {IMAGE_SIDE}x{IMAGE_SIDE}",
            path.display()
        )));
    }
    let mut data = Vec::with_capacity(n * IMAGE_PIXELS);
    decoder.read_to_end(&mut data)?;
    if data.len() != n * IMAGE_PIXELS {
        return Err(SnnError::Dataset(format!(
            "{}: payload is {} bytes, expected {}",
            path.display(),
            data.len(),
            n * IMAGE_PIXELS
        )));
    }
    Array2::from_shape_vec((n, IMAGE_PIXELS), data)
        .map_err(|e| SnnError::Dataset(format!("{}: {e}", path.display())))
}

/// Read a gzipped IDX1 label file.
///
/// # Errors
/// `Dataset` on wrong magic or payload length.
pub fn read_idx_labels(path: &Path) -> SnnResult<Vec<u8>> {
    let mut decoder = open_gz(path)?;
    let magic = decoder.read_u32::<BigEndian>()?;
    if magic != LABEL_MAGIC {
        return Err(SnnError::Dataset(format!(
            "{}: label magic {magic}, expected {LABEL_MAGIC}",
            path.display()
        )));
    }
    let n = decoder.read_u32::<BigEndian>()? as usize;
    let mut labels = Vec::with_capacity(n);
    decoder.read_to_end(&mut labels)?;
    if labels.len() != n {
        return Err(SnnError::Dataset(format!(
            "{}: {} labels, header says {n}",
            path.display(),
            labels.len()
        )));
    }
    Ok(labels)
}

#[cfg(feature = "download")]
mod download {
    use super::MnistFiles;
    use crate::core::{SnnError, SnnResult};
    use std::fs;
    use std::path::Path;

    const BASE_URL: &str = "https://storage.googleapis.com/cvdf-datasets/mnist";

    pub(super) fn fetch_missing(dir: &Path, files: &MnistFiles) -> SnnResult<()> {
        fs::create_dir_all(dir)?;
        for name in files.all() {
            let path = dir.join(name);
            if path.is_file() {
                continue;
            }
            let url = format!("{BASE_URL}/{name}");
            tracing::info!(%url, "Downloading");
            let bytes = fetch(&url)?;
            fs::write(&path, bytes)?;
        }
        Ok(())
    }

    fn fetch(url: &str) -> SnnResult<Vec<u8>> {
        let to_err = |e: curl::Error| SnnError::Download(format!("{url}: {e}"));
        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(to_err)?;
        easy.follow_location(true).map_err(to_err)?;
        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|chunk| {
                    body.extend_from_slice(chunk);
                    Ok(chunk.len())
                })
                .map_err(to_err)?;
            transfer.perform().map_err(to_err)?;
        }
        let status = easy.response_code().map_err(to_err)?;
        if status != 200 {
            return Err(SnnError::Download(format!("{url}: HTTP {status}")));
        }
        Ok(body)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    pub(crate) fn write_gz(path: &Path, bytes: &[u8]) {
        let mut enc = GzEncoder::new(File::create(path).expect("create"), Compression::fast());
        enc.write_all(bytes).expect("write");
        enc.finish().expect("finish");
    }

    pub(crate) fn idx_images(images: &[[u8; IMAGE_PIXELS]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(IMAGE_MAGIC).expect("magic");
        out.write_u32::<BigEndian>(images.len() as u32).expect("n");
        out.write_u32::<BigEndian>(IMAGE_SIDE as u32).expect("rows");
        out.write_u32::<BigEndian>(IMAGE_SIDE as u32).expect("cols");
        for img in images {
            out.extend_from_slice(img);
        }
        out
    }

    pub(crate) fn idx_labels(labels: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.write_u32::<BigEndian>(LABEL_MAGIC).expect("magic");
        out.write_u32::<BigEndian>(labels.len() as u32).expect("n");
        out.extend_from_slice(labels);
        out
    }

    #[test]
    fn test_read_images_and_labels() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut img = [0u8; IMAGE_PIXELS];
        img[5] = 200;
        let img_path = dir.path().join("img.gz");
        let lbl_path = dir.path().join("lbl.gz");
        write_gz(&img_path, &idx_images(&[img, [7u8; IMAGE_PIXELS]]));
        write_gz(&lbl_path, &idx_labels(&[4, 9]));

        let images = read_idx_images(&img_path).expect("images");
        let labels = read_idx_labels(&lbl_path).expect("labels");
        assert_eq!(images.dim(), (2, IMAGE_PIXELS));
        assert_eq!(images[[0, 5]], 200);
        assert_eq!(images[[1, 0]], 7);
        assert_eq!(labels, vec![4, 9]);
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lbl.gz");
        // Label file read as images
        write_gz(&path, &idx_labels(&[1, 2, 3]));
        assert!(matches!(read_idx_images(&path), Err(SnnError::Dataset(_))));
    }

    #[test]
    fn test_truncated_payload_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("lbl.gz");
        let mut bytes = idx_labels(&[1, 2, 3]);
        bytes.pop();
        write_gz(&path, &bytes);
        assert!(matches!(read_idx_labels(&path), Err(SnnError::Dataset(_))));
    }

    #[test]
    fn test_dataset_rejects_bad_labels() {
        let images = Array2::zeros((2, IMAGE_PIXELS));
        assert!(Dataset::new(images.clone(), vec![1]).is_err());
        assert!(Dataset::new(images.clone(), vec![1, 10]).is_err());
        assert!(Dataset::new(images, vec![1, 9]).is_ok());
    }

    #[cfg(not(feature = "download"))]
    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_mnist(dir.path()).expect_err("empty dir");
        assert!(err.to_string().contains("train-images-idx3-ubyte.gz"));
    }
}
