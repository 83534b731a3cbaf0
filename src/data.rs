//! MATファイル（MATLAB レベル5形式）からのデータ読み込み。
//!
//! MATLABは配列を列優先で保存するため、読み込み時に行優先の
//! `[行, 列]` 形状へ並べ替えてから [`TensorData`] として返します。

use crate::error::{PinnError, Result};
use burn::tensor::TensorData;
use matfile::{MatFile, NumericData};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// フィールド名から配列への対応。
pub type DataMap = BTreeMap<String, TensorData>;

/// 読み込み済みのMATファイル。
pub struct MatData {
    name: String,
    inner: MatFile,
}

/// `root_path` 直下の `file_name` を読み込みます。
///
/// ファイルが存在しない場合は [`PinnError::DataNotFound`]、
/// 解析できない場合は [`PinnError::DataFormat`] を返します。
pub fn load_data(root_path: &Path, file_name: &str) -> Result<MatData> {
    let path = root_path.join(file_name);
    if !path.is_file() {
        return Err(PinnError::DataNotFound { path });
    }
    let reader = BufReader::new(File::open(&path)?);
    let inner = MatFile::parse(reader).map_err(|e| {
        PinnError::DataFormat(format!("'{}' を解析できません: {:?}", path.display(), e))
    })?;
    log::debug!(
        "'{}' を読み込みました (配列数: {})",
        path.display(),
        inner.arrays().len()
    );
    Ok(MatData {
        name: file_name.to_string(),
        inner,
    })
}

impl MatData {
    /// フィールドの実部を32ビット浮動小数点の2次元配列として取り出します。
    ///
    /// 虚部は破棄されます。ゼロでない虚部を含む場合は警告を出力します。
    pub fn real_f32(&self, field: &str) -> Result<TensorData> {
        let array = self.inner.find_by_name(field).ok_or_else(|| {
            PinnError::DataFormat(format!(
                "'{}' にフィールド '{}' がありません",
                self.name, field
            ))
        })?;
        let size = array.size();
        if size.len() != 2 {
            return Err(PinnError::DataFormat(format!(
                "フィールド '{}' は2次元配列である必要があります (次元: {:?})",
                field, size
            )));
        }
        let (rows, cols) = (size[0], size[1]);
        let (real, imag_nonzero) = real_part(array.data());
        if imag_nonzero {
            log::warn!(
                "フィールド '{}' のゼロでない虚部を破棄しました",
                field
            );
        }
        if real.len() != rows * cols {
            return Err(PinnError::DataFormat(format!(
                "フィールド '{}' の要素数 {} が形状 {}x{} と一致しません",
                field,
                real.len(),
                rows,
                cols
            )));
        }

        let mut row_major = vec![0.0f32; rows * cols];
        for col in 0..cols {
            for row in 0..rows {
                row_major[row * cols + col] = real[col * rows + row];
            }
        }
        Ok(TensorData::new(row_major, [rows, cols]))
    }

    /// 行または列が1のフィールドを1次元のベクトルとして取り出します。
    pub fn vector_f32(&self, field: &str) -> Result<Vec<f32>> {
        let data = self.real_f32(field)?;
        if !data.shape.iter().any(|&d| d == 1) {
            return Err(PinnError::DataFormat(format!(
                "フィールド '{}' はベクトルではありません (形状: {:?})",
                field, data.shape
            )));
        }
        to_vec(&data)
    }
}

/// [`TensorData`] から `f32` のベクトルを取り出します。
pub fn to_vec(data: &TensorData) -> Result<Vec<f32>> {
    data.to_vec::<f32>()
        .map_err(|e| PinnError::DataFormat(format!("f32 配列に変換できません: {:?}", e)))
}

fn real_part(data: &NumericData) -> (Vec<f32>, bool) {
    fn convert<T: Copy + Into<f64>>(real: &[T], imag: &Option<Vec<T>>) -> (Vec<f32>, bool) {
        let nonzero = imag
            .as_ref()
            .is_some_and(|im| im.iter().any(|&v| Into::<f64>::into(v) != 0.0));
        (real.iter().map(|&v| Into::<f64>::into(v) as f32).collect(), nonzero)
    }

    match data {
        NumericData::Int8 { real, imag } => convert(real, imag),
        NumericData::UInt8 { real, imag } => convert(real, imag),
        NumericData::Int16 { real, imag } => convert(real, imag),
        NumericData::UInt16 { real, imag } => convert(real, imag),
        NumericData::Int32 { real, imag } => convert(real, imag),
        NumericData::UInt32 { real, imag } => convert(real, imag),
        NumericData::Int64 { real, imag } => (
            real.iter().map(|&v| v as f32).collect(),
            imag.as_ref().is_some_and(|im| im.iter().any(|&v| v != 0)),
        ),
        NumericData::UInt64 { real, imag } => (
            real.iter().map(|&v| v as f32).collect(),
            imag.as_ref().is_some_and(|im| im.iter().any(|&v| v != 0)),
        ),
        NumericData::Single { real, imag } => convert(real, imag),
        NumericData::Double { real, imag } => convert(real, imag),
    }
}
