//! Dataset decoding (IDX binaries and delimited text) and the array preparation steps around it.
use byteorder::{BigEndian, ReadBytesExt};
use csv::{ReaderBuilder, Trim};
use flate2::read::GzDecoder;
use log::{debug, warn};
use ndarray::{s, Array2, ArrayView2, Axis};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use std::fs::{self, File};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::{MlError, Result};

/// IDX element type code for unsigned bytes, the only one decoded here.
const IDX_UNSIGNED_BYTE: u8 = 0x08;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Inputs `x` of shape `(n, n_features)` paired with labels `y` of shape `(n, n_labels)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f64>,
    y: Array2<f64>,
}

impl Dataset {
    pub fn new(x: Array2<f64>, y: Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 || x.ncols() == 0 || y.ncols() == 0 {
            return Err(MlError::EmptyDataset);
        }
        MlError::check_size("label rows", "input rows", y.nrows(), x.nrows())?;
        Ok(Self { x, y })
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f64> {
        self.y.view()
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.x.nrows() == 0
    }

    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>) {
        (self.x, self.y)
    }

    /// Shuffles rows with a seeded generator and holds out `test_fraction` of them.
    ///
    /// Returns `(train, test)`; both sides keep at least one example.
    pub fn split(&self, test_fraction: f64, seed: u64) -> Result<(Dataset, Dataset)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(MlError::InvalidConfig(format!(
                "test fraction must be in (0, 1), got {test_fraction}"
            )));
        }
        let n = self.len();
        if n < 2 {
            return Err(MlError::InvalidConfig(format!(
                "cannot split {n} example(s) into train and test sets"
            )));
        }
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(n_test);

        let pick = |idx: &[usize]| {
            Dataset::new(self.x.select(Axis(0), idx), self.y.select(Axis(0), idx))
        };
        Ok((pick(train_idx)?, pick(test_idx)?))
    }
}

/// Decodes an uncompressed IDX blob into a `(count, product of remaining dims)` array.
///
/// Header: two zero bytes, the element type (must be unsigned byte), the
/// number of dimensions, then one big-endian `u32` per dimension. The
/// payload must hold exactly as many bytes as the dimensions announce.
pub fn decode_idx(bytes: &[u8]) -> Result<Array2<f64>> {
    let mut r = Cursor::new(bytes);
    let magic = r
        .read_u32::<BigEndian>()
        .map_err(|_| MlError::InvalidHeader("shorter than the magic number".to_owned()))?;
    let [zero_a, zero_b, kind, n_dims] = magic.to_be_bytes();
    if zero_a != 0 || zero_b != 0 {
        return Err(MlError::InvalidHeader(format!("bad magic {magic:#010x}")));
    }
    if kind != IDX_UNSIGNED_BYTE {
        return Err(MlError::InvalidHeader(format!(
            "element type {kind:#04x} is not unsigned byte"
        )));
    }
    if n_dims == 0 {
        return Err(MlError::InvalidHeader("no dimensions".to_owned()));
    }

    let dims = (0..n_dims)
        .map(|i| {
            r.read_u32::<BigEndian>().map(|d| d as usize).map_err(|_| {
                MlError::InvalidHeader(format!("truncated after {i} of {n_dims} dimensions"))
            })
        })
        .collect::<Result<Vec<usize>>>()?;

    let count = dims[0];
    if count == 0 {
        return Err(MlError::EmptyDataset);
    }
    let width: usize = dims[1..].iter().product();
    if width == 0 {
        return Err(MlError::InvalidHeader(format!("zero-sized dimension in {dims:?}")));
    }
    let expected = count
        .checked_mul(width)
        .ok_or_else(|| MlError::InvalidHeader(format!("dimensions {dims:?} overflow")))?;

    let payload = &bytes[r.position() as usize..];
    if payload.len() != expected {
        return Err(MlError::PayloadSize {
            expected,
            got: payload.len(),
        });
    }
    debug!("decoded IDX payload with dims {dims:?} into {count}x{width}");

    let values = payload.iter().map(|&b| f64::from(b)).collect();
    Array2::from_shape_vec((count, width), values)
        .map_err(|e| MlError::InvalidHeader(e.to_string()))
}

/// Reads an IDX file, gunzipping it first when it starts with the gzip magic.
pub fn load_idx(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|e| MlError::from_open(e, path))?;
    if !raw.starts_with(&GZIP_MAGIC) {
        return decode_idx(&raw);
    }
    let mut contents = Vec::new();
    GzDecoder::new(raw.as_slice()).read_to_end(&mut contents)?;
    decode_idx(&contents)
}

/// Parses a text table: the first line is a header and is skipped, every
/// other non-blank line becomes a row. Values are separated by commas,
/// whitespace, or any run of both.
pub fn parse_text<R: Read>(reader: R) -> Result<Array2<f64>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut data = Vec::new();
    let mut width = None;
    let mut n_rows = 0;
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or_default() as usize;
        let start = data.len();
        for token in record.iter().flat_map(str::split_whitespace) {
            let value = token.parse::<f64>().map_err(|_| MlError::Parse {
                line,
                token: token.to_owned(),
            })?;
            data.push(value);
        }
        let row_len = data.len() - start;
        if row_len == 0 {
            continue;
        }
        match width {
            None => width = Some(row_len),
            Some(expected) if expected != row_len => {
                return Err(MlError::RaggedRows {
                    row: n_rows,
                    got: row_len,
                    expected,
                })
            }
            Some(_) => {}
        }
        n_rows += 1;
    }

    let width = width.ok_or(MlError::EmptyDataset)?;
    let got = data.len();
    Array2::from_shape_vec((n_rows, width), data).map_err(|_| MlError::ShapeMismatch {
        a: "parsed values",
        b: "rows x columns",
        got,
        expected: n_rows * width,
    })
}

/// [`parse_text`] on a file.
pub fn load_text(path: impl AsRef<Path>) -> Result<Array2<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MlError::from_open(e, path))?;
    parse_text(file)
}

/// Splits a table into the first `n_features` columns (x) and the rest (y).
pub fn split_columns(
    data: ArrayView2<f64>,
    n_features: usize,
) -> Result<(Array2<f64>, Array2<f64>)> {
    if n_features == 0 || n_features >= data.ncols() {
        return Err(MlError::InvalidConfig(format!(
            "cannot take {n_features} feature columns out of {}",
            data.ncols()
        )));
    }
    Ok((
        data.slice(s![.., ..n_features]).to_owned(),
        data.slice(s![.., n_features..]).to_owned(),
    ))
}

/// Prepends a column of ones: `(n, f)` becomes `(n, f + 1)`.
pub fn prepend_bias(x: ArrayView2<f64>) -> Array2<f64> {
    let mut out = Array2::ones((x.nrows(), x.ncols() + 1));
    out.slice_mut(s![.., 1..]).assign(&x);
    out
}

/// Rescales every column to `[0, 1]` by its min and max, then shifts it to `[-0.5, 0.5]`.
///
/// A constant column has no range to rescale by and becomes all zeros.
pub fn min_max_normalize(x: ArrayView2<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for (j, mut col) in out.columns_mut().into_iter().enumerate() {
        let min = col.fold(f64::INFINITY, |a, &b| a.min(b));
        let max = col.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let range = max - min;
        if !(range.is_finite() && range > 0.0) {
            warn!("column {j} is constant, normalizing it to 0");
            col.fill(0.0);
            continue;
        }
        col.mapv_inplace(|v| (v - min) / range - 0.5);
    }
    out
}

/// Divides every value by `divisor`, e.g. 255 for pixel intensities.
pub fn scale(x: ArrayView2<f64>, divisor: f64) -> Array2<f64> {
    &x / divisor
}

/// 1 where the label equals `target`, 0 elsewhere.
pub fn binarize(labels: ArrayView2<f64>, target: f64) -> Array2<f64> {
    labels.mapv(|v| if v == target { 1.0 } else { 0.0 })
}

/// One column per entry of `classes`, with a single 1 in the column of each label.
pub fn one_hot(labels: ArrayView2<f64>, classes: &[f64]) -> Result<Array2<f64>> {
    MlError::check_size("label columns", "one", labels.ncols(), 1)?;
    let mut encoded = Array2::zeros((labels.nrows(), classes.len()));
    for (i, &label) in labels.column(0).iter().enumerate() {
        let j = classes
            .iter()
            .position(|&c| c == label)
            .ok_or(MlError::UnknownClass(label))?;
        encoded[[i, j]] = 1.0;
    }
    Ok(encoded)
}

/// The two halves of the MNIST distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl Split {
    fn prefix(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "t10k",
        }
    }
}

/// Loads raw MNIST pixels `(n, 784)` and labels `(n, 1)` from the standard
/// gzipped file names inside `dir`.
pub fn load_mnist(dir: impl AsRef<Path>, split: Split) -> Result<Dataset> {
    let dir = dir.as_ref();
    let prefix = split.prefix();
    let images = load_idx(dir.join(format!("{prefix}-images-idx3-ubyte.gz")))?;
    let labels = load_idx(dir.join(format!("{prefix}-labels-idx1-ubyte.gz")))?;
    Dataset::new(images, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use flate2::{write::GzEncoder, Compression};
    use ndarray::array;
    use std::io::Write;
    use std::path::PathBuf;

    fn idx_blob(dims: &[u32], payload: &[u8]) -> Vec<u8> {
        let mut blob = vec![0, 0, IDX_UNSIGNED_BYTE, dims.len() as u8];
        for d in dims {
            blob.extend_from_slice(&d.to_be_bytes());
        }
        blob.extend_from_slice(payload);
        blob
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("descent_ml_{}_{name}", std::process::id()))
    }

    #[test]
    fn decodes_two_single_pixel_images() {
        let blob = idx_blob(&[2, 1, 1], &[10, 20]);
        assert_eq!(decode_idx(&blob).unwrap(), array![[10.0], [20.0]]);
    }

    #[test]
    fn labels_become_a_column() {
        let blob = idx_blob(&[3], &[7, 0, 9]);
        assert_eq!(decode_idx(&blob).unwrap(), array![[7.0], [0.0], [9.0]]);
    }

    #[test]
    fn images_are_flattened() {
        let blob = idx_blob(&[1, 2, 2], &[1, 2, 3, 4]);
        assert_eq!(decode_idx(&blob).unwrap(), array![[1.0, 2.0, 3.0, 4.0]]);
    }

    #[test]
    fn malformed_headers_fail_fast() {
        assert!(matches!(decode_idx(&[0, 0]), Err(MlError::InvalidHeader(_))));
        assert!(matches!(
            decode_idx(&[1, 0, 8, 1, 0, 0, 0, 1, 5]),
            Err(MlError::InvalidHeader(_))
        ));
        let mut truncated = idx_blob(&[2, 1, 1], &[]);
        truncated.truncate(10);
        assert!(matches!(decode_idx(&truncated), Err(MlError::InvalidHeader(_))));
    }

    #[test]
    fn short_payload_returns_nothing() {
        let blob = idx_blob(&[2, 1, 1], &[10]);
        assert!(matches!(
            decode_idx(&blob),
            Err(MlError::PayloadSize {
                expected: 2,
                got: 1
            })
        ));
    }

    #[test]
    fn zero_count_is_an_empty_dataset() {
        let blob = idx_blob(&[0, 28, 28], &[]);
        assert!(matches!(decode_idx(&blob), Err(MlError::EmptyDataset)));
    }

    #[test]
    fn gzipped_files_are_decompressed() {
        let path = temp_path("labels.gz");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&idx_blob(&[2], &[3, 4])).unwrap();
        fs::write(&path, enc.finish().unwrap()).unwrap();

        let labels = load_idx(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(labels, array![[3.0], [4.0]]);
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let err = load_idx(temp_path("does-not-exist.gz")).unwrap_err();
        assert!(matches!(err, MlError::FileNotFound { .. }));
        let err = load_text(temp_path("does-not-exist.txt")).unwrap_err();
        assert!(matches!(err, MlError::FileNotFound { .. }));
    }

    #[test]
    fn text_skips_header_and_mixes_delimiters() {
        let text = "Reservations  Pizza\n13  33\n2,\t16\n\n14 ,, 32\n";
        let data = parse_text(text.as_bytes()).unwrap();
        assert_eq!(data, array![[13.0, 33.0], [2.0, 16.0], [14.0, 32.0]]);
    }

    #[test]
    fn text_rejects_bad_tokens_and_ragged_rows() {
        let err = parse_text("a b\n1 x\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MlError::Parse { line: 2, .. }), "{err}");
        let err = parse_text("a b\n1 2\n3\n".as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            MlError::RaggedRows {
                row: 1,
                got: 1,
                expected: 2
            }
        ));
        assert!(matches!(
            parse_text("only a header\n".as_bytes()),
            Err(MlError::EmptyDataset)
        ));
    }

    #[test]
    fn text_shape_errors_are_row_errors() {
        for text in ["x y\n1 2\n3 4\n5 6 7\n", "x\n1\n2 3\n", "x y z\n1 2 3\n4 5\n"] {
            let err = parse_text(text.as_bytes()).unwrap_err();
            assert!(matches!(err, MlError::RaggedRows { .. }), "{err}");
        }
    }

    #[test]
    fn split_columns_separates_labels() {
        let data = array![[1.0, 2.0, 0.0], [3.0, 4.0, 1.0]];
        let (x, y) = split_columns(data.view(), 2).unwrap();
        assert_eq!(x, array![[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(y, array![[0.0], [1.0]]);
        assert!(split_columns(data.view(), 3).is_err());
    }

    #[test]
    fn prepend_bias_adds_leading_ones() {
        let x = array![[2.0, 3.0], [4.0, 5.0]];
        assert_eq!(prepend_bias(x.view()), array![[1.0, 2.0, 3.0], [1.0, 4.0, 5.0]]);
    }

    #[test]
    fn normalize_round_trips() {
        let x = array![[1.0, -4.0], [3.0, 6.0], [2.0, 1.0]];
        let n = min_max_normalize(x.view());
        let mins = [1.0, -4.0];
        let maxs = [3.0, 6.0];
        for ((i, j), &v) in n.indexed_iter() {
            assert!((-0.5..=0.5).contains(&v));
            let back = (v + 0.5) * (maxs[j] - mins[j]) + mins[j];
            assert_abs_diff_eq!(back, x[[i, j]], epsilon = 1e-12);
        }
    }

    #[test]
    fn normalize_keeps_constant_columns_finite() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let n = min_max_normalize(x.view());
        assert!(n.iter().all(|v| v.is_finite()));
        assert_eq!(n.column(0).to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn bias_column_survives_normalization() {
        let x = array![[10.0, 3.0], [20.0, 3.0], [15.0, 9.0]];
        let augmented = prepend_bias(min_max_normalize(x.view()).view());
        assert!(augmented.column(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn binarize_marks_target_class() {
        let labels = array![[5.0], [3.0], [5.0]];
        assert_eq!(binarize(labels.view(), 5.0), array![[1.0], [0.0], [1.0]]);
    }

    #[test]
    fn one_hot_follows_class_order() {
        let labels = array![[2.0], [0.0], [1.0]];
        let encoded = one_hot(labels.view(), &[0.0, 1.0, 2.0]).unwrap();
        assert_eq!(
            encoded,
            array![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        );
        for row in encoded.rows() {
            assert_eq!(row.sum(), 1.0);
        }
        assert!(matches!(
            one_hot(array![[4.0]].view(), &[0.0, 1.0]),
            Err(MlError::UnknownClass(_))
        ));
    }

    #[test]
    fn split_is_seeded_and_disjoint() {
        let x = Array2::from_shape_fn((10, 1), |(i, _)| i as f64);
        let data = Dataset::new(x.clone(), x).unwrap();
        let (train, test) = data.split(0.2, 3).unwrap();
        assert_eq!((train.len(), test.len()), (8, 2));
        assert_eq!(data.split(0.2, 3).unwrap().1, test);

        let mut seen: Vec<f64> = train.x().iter().chain(test.x().iter()).copied().collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..10).map(f64::from).collect::<Vec<_>>());
        assert_eq!(train.x(), train.y());
    }

    #[test]
    fn dataset_rejects_mismatched_rows() {
        let err = Dataset::new(Array2::zeros((3, 2)), Array2::zeros((2, 1))).unwrap_err();
        assert!(matches!(err, MlError::ShapeMismatch { .. }));
        assert!(matches!(
            Dataset::new(Array2::zeros((0, 2)), Array2::zeros((0, 1))),
            Err(MlError::EmptyDataset)
        ));
    }
}
