//! Saving and loading parameter sets as gzip-compressed JSON.
//!
//! The dump is the ordered list of parameter matrices, each stored as its
//! shape plus row-major values. Values read back bit-identical.
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{MlError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct MatrixDto {
    rows: usize,
    cols: usize,
    data: Vec<f64>, // row-major
}

#[derive(Debug, Serialize, Deserialize)]
struct ParamsDto {
    params: Vec<MatrixDto>,
}

impl ParamsDto {
    fn from_params(params: &[Array2<f64>]) -> Result<Self> {
        if params.iter().flatten().any(|v| !v.is_finite()) {
            return Err(MlError::NonFinite("parameter set"));
        }
        let params = params
            .iter()
            .map(|p| MatrixDto {
                rows: p.nrows(),
                cols: p.ncols(),
                data: p.iter().copied().collect(),
            })
            .collect();
        Ok(Self { params })
    }

    fn into_params(self) -> Result<Vec<Array2<f64>>> {
        self.params
            .into_iter()
            .map(|m| {
                Array2::from_shape_vec((m.rows, m.cols), m.data)
                    .map_err(|e| MlError::Persistence(e.to_string()))
            })
            .collect()
    }
}

/// Writes `params` to `writer`.
pub fn write_params<W: Write>(writer: W, params: &[Array2<f64>]) -> Result<()> {
    let dto = ParamsDto::from_params(params)?;
    let mut enc = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut enc, &dto)?;
    enc.finish()?;
    Ok(())
}

/// Reads a parameter set written by [`write_params`].
pub fn read_params<R: Read>(reader: R) -> Result<Vec<Array2<f64>>> {
    let dto: ParamsDto = serde_json::from_reader(GzDecoder::new(reader))?;
    dto.into_params()
}

pub fn save_params(path: impl AsRef<Path>, params: &[Array2<f64>]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_params(&mut writer, params)?;
    writer.flush()?;
    Ok(())
}

pub fn load_params(path: impl AsRef<Path>) -> Result<Vec<Array2<f64>>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| MlError::from_open(e, path))?;
    read_params(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::network::TwoLayerNetwork;
    use ndarray::array;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn round_trip_is_bit_identical() {
        let net = TwoLayerNetwork::new(4, 3, 2, &mut StdRng::seed_from_u64(9)).unwrap();
        let mut buf = Vec::new();
        write_params(&mut buf, net.params()).unwrap();

        let params = read_params(buf.as_slice()).unwrap();
        assert_eq!(params.len(), 2);
        for (saved, loaded) in net.params().iter().zip(&params) {
            assert_eq!(saved.dim(), loaded.dim());
            for (a, b) in saved.iter().zip(loaded.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
        assert_eq!(TwoLayerNetwork::from_params(params).unwrap(), net);
    }

    #[test]
    fn round_trip_through_a_file() {
        let name = format!("descent_ml_{}_params.gz", std::process::id());
        let path = std::env::temp_dir().join(name);
        let params = vec![array![[0.1, -2.5e-17], [3.0, 1e300]]];
        save_params(&path, &params).unwrap();
        let loaded = load_params(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, params);
    }

    #[test]
    fn non_finite_values_are_refused() {
        let mut buf = Vec::new();
        let err = write_params(&mut buf, &[array![[f64::NAN]]]).unwrap_err();
        assert!(matches!(err, MlError::NonFinite(_)));
    }

    #[test]
    fn garbage_does_not_load() {
        assert!(read_params(&b"not gzip"[..]).is_err());
    }
}
