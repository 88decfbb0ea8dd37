//! Blob codec for the model store.
//!
//! Three payload kinds, all native-endian:
//!
//! * `VF`: a flat run of `f32`.
//! * `VI`: a flat run of `i32`.
//! * `VVF`: a `[u32 rows, u32 cols]` header followed by `rows * cols` `f32`
//!   values in row-major order.

use crate::error::{InversionError, Result};

/// Row-major dense matrix decoded from a `VVF` blob.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(InversionError::ModelLoad(format!(
                "matrix {rows}x{cols} needs {} values, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn set(&mut self, r: usize, c: usize, v: f32) {
        self.data[r * self.cols + c] = v;
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

fn check_word_aligned(name: &str, bytes: &[u8]) -> Result<()> {
    if bytes.len() % 4 != 0 {
        return Err(InversionError::ModelLoad(format!(
            "blob {name}: length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(())
}

pub fn decode_vf(name: &str, bytes: &[u8]) -> Result<Vec<f32>> {
    check_word_aligned(name, bytes)?;
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

pub fn decode_vi(name: &str, bytes: &[u8]) -> Result<Vec<i32>> {
    check_word_aligned(name, bytes)?;
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

pub fn decode_vvf(name: &str, bytes: &[u8]) -> Result<Matrix> {
    if bytes.len() < 8 {
        return Err(InversionError::ModelLoad(format!(
            "blob {name}: missing matrix header"
        )));
    }
    let (header, body) = bytes.split_at(8);
    let rows: u32 = bytemuck::pod_read_unaligned(&header[..4]);
    let cols: u32 = bytemuck::pod_read_unaligned(&header[4..]);
    let data = decode_vf(name, body)?;
    Matrix::new(rows as usize, cols as usize, data).map_err(|e| match e {
        InversionError::ModelLoad(msg) => InversionError::ModelLoad(format!("blob {name}: {msg}")),
        other => other,
    })
}

pub fn encode_vf(values: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

pub fn encode_vi(values: &[i32]) -> Vec<u8> {
    bytemuck::cast_slice(values).to_vec()
}

pub fn encode_vvf(matrix: &Matrix) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 4 * matrix.data.len());
    out.extend_from_slice(bytemuck::bytes_of(&(matrix.rows as u32)));
    out.extend_from_slice(bytemuck::bytes_of(&(matrix.cols as u32)));
    out.extend_from_slice(bytemuck::cast_slice(&matrix.data));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vvf_header_is_rows_then_cols() {
        let m = Matrix::new(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let bytes = encode_vvf(&m);
        assert_eq!(bytes.len(), 8 + 24);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(&bytes[..4]), 2);
        assert_eq!(bytemuck::pod_read_unaligned::<u32>(&bytes[4..8]), 3);

        let back = decode_vvf("m", &bytes).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.row(1), &[4.0, 5.0, 6.0]);
        assert_eq!(back.get(0, 2), 3.0);
    }

    #[test]
    fn decodes_from_unaligned_slices() {
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(&encode_vi(&[-7, 1, 1 << 20]));
        assert_eq!(decode_vi("x", &bytes[1..]).unwrap(), vec![-7, 1, 1 << 20]);
    }

    #[test]
    fn ragged_blob_is_rejected() {
        let err = decode_vf("MvnMu", &[0u8; 10]).unwrap_err();
        assert!(err.to_string().contains("MvnMu"));
        assert!(decode_vvf("Cov", &[0u8; 4]).is_err());
    }

    #[test]
    fn vvf_body_must_match_header() {
        let m = Matrix::new(2, 2, vec![1.0; 4]).unwrap();
        let mut bytes = encode_vvf(&m);
        bytes.truncate(bytes.len() - 4);
        let err = decode_vvf("Cov", &bytes).unwrap_err();
        assert!(matches!(err, InversionError::ModelLoad(ref m) if m.starts_with("blob Cov: matrix 2x2")));
        assert_eq!(err.to_string().matches("Model load error").count(), 1);
    }

    #[test]
    fn matrix_set_and_zeros() {
        let mut m = Matrix::zeros(3, 2);
        m.set(2, 1, 9.5);
        assert_eq!(m.row(2), &[0.0, 9.5]);
        assert!(Matrix::new(3, 3, vec![0.0; 8]).is_err());
    }
}
