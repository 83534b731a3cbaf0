//! テスト用の最小限の MAT ファイル（レベル5, リトルエンディアン, 非圧縮）書き出し。
#![allow(dead_code)]

use std::io::{self, Write};
use std::path::Path;

const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;
const COMPLEX_FLAG: u32 = 0x0800;

/// 列優先で値を保持する倍精度配列。
pub struct MatArray {
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    pub real: Vec<f64>,
    pub imag: Option<Vec<f64>>,
}

impl MatArray {
    /// `value(row, col)` から列優先の実数配列を作ります。
    pub fn from_fn(name: &str, rows: usize, cols: usize, value: impl Fn(usize, usize) -> f64) -> Self {
        let mut real = Vec::with_capacity(rows * cols);
        for col in 0..cols {
            for row in 0..rows {
                real.push(value(row, col));
            }
        }
        Self {
            name: name.to_string(),
            rows,
            cols,
            real,
            imag: None,
        }
    }

    pub fn with_imag(mut self, imag: Vec<f64>) -> Self {
        self.imag = Some(imag);
        self
    }
}

fn element(buf: &mut Vec<u8>, data_type: u32, payload: &[u8]) {
    buf.extend_from_slice(&data_type.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    let padding = (8 - payload.len() % 8) % 8;
    buf.extend(std::iter::repeat_n(0u8, padding));
}

fn doubles(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn matrix(array: &MatArray) -> Vec<u8> {
    let mut body = Vec::new();
    let mut flags = MX_DOUBLE_CLASS;
    if array.imag.is_some() {
        flags |= COMPLEX_FLAG;
    }
    let flag_bytes: Vec<u8> = [flags, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
    element(&mut body, MI_UINT32, &flag_bytes);
    let dims: Vec<u8> = [array.rows as i32, array.cols as i32]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    element(&mut body, MI_INT32, &dims);
    element(&mut body, MI_INT8, array.name.as_bytes());
    element(&mut body, MI_DOUBLE, &doubles(&array.real));
    if let Some(imag) = &array.imag {
        element(&mut body, MI_DOUBLE, &doubles(imag));
    }
    let mut out = Vec::new();
    element(&mut out, MI_MATRIX, &body);
    out
}

pub fn write_mat(path: &Path, arrays: &[MatArray]) -> io::Result<()> {
    let mut header = b"MATLAB 5.0 MAT-file, written by kdv-pinn tests".to_vec();
    header.resize(116, b' ');
    header.extend_from_slice(&[0u8; 8]);
    header.extend_from_slice(&0x0100u16.to_le_bytes());
    header.extend_from_slice(b"IM");

    let mut file = std::fs::File::create(path)?;
    file.write_all(&header)?;
    for array in arrays {
        file.write_all(&matrix(array))?;
    }
    Ok(())
}

/// 進行する孤立波に似た滑らかな解 `u(x, t)`。
pub fn wave(x: f64, t: f64) -> f64 {
    let z = 2.0 * (x - 0.5 * t);
    1.0 / z.cosh().powi(2)
}

/// `x` (nx x 1), `tt` (1 x nt), `uu` (nx x nt, 複素数・虚部ゼロ) を持つ KdV.mat を書き出します。
pub fn write_kdv_file(dir: &Path, nx: usize, nt: usize) -> (Vec<f64>, Vec<f64>) {
    let x: Vec<f64> = (0..nx)
        .map(|i| -2.0 + 4.0 * i as f64 / (nx - 1) as f64)
        .collect();
    let t: Vec<f64> = (0..nt).map(|j| 0.05 * j as f64).collect();
    let uu = MatArray::from_fn("uu", nx, nt, |i, j| wave(x[i], t[j])).with_imag(vec![0.0; nx * nt]);
    write_mat(
        &dir.join("KdV.mat"),
        &[
            MatArray::from_fn("x", nx, 1, |i, _| x[i]),
            MatArray::from_fn("tt", 1, nt, |_, j| t[j]),
            uu,
        ],
    )
    .unwrap();
    (x, t)
}
