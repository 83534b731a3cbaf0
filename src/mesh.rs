//! 空間・時間の格子と、その上の解フィールド。

use crate::config::DataConfig;
use crate::data::{self, DataMap};
use crate::error::{PinnError, Result};
use crate::jet::Jet;
use crate::kdv::DATA_FILENAME;
use burn::tensor::TensorData;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;

/// 1次元空間 x 時間の格子。`solution` の各フィールドは `[空間, 時間]` の形状です。
#[derive(Clone, Debug)]
pub struct Mesh {
    pub spatial: Vec<f32>,
    pub time: Vec<f32>,
    pub solution: DataMap,
}

impl Mesh {
    /// 格子と解フィールドから作成し、形状の整合性を検査します。
    pub fn new(spatial: Vec<f32>, time: Vec<f32>, solution: DataMap) -> Result<Self> {
        if spatial.len() < 2 || time.is_empty() {
            return Err(PinnError::DataFormat(format!(
                "格子が小さすぎます (空間: {}, 時間: {})",
                spatial.len(),
                time.len()
            )));
        }
        let lower = spatial.iter().copied().fold(f32::INFINITY, f32::min);
        let upper = spatial.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !(upper > lower) {
            return Err(PinnError::DataFormat(format!(
                "空間格子の範囲が退化しています ([{lower}, {upper}])"
            )));
        }
        for (name, field) in &solution {
            if field.shape != [spatial.len(), time.len()] {
                return Err(PinnError::DataFormat(format!(
                    "フィールド '{}' の形状 {:?} が格子 [{}, {}] と一致しません",
                    name,
                    field.shape,
                    spatial.len(),
                    time.len()
                )));
            }
        }
        Ok(Self {
            spatial,
            time,
            solution,
        })
    }

    /// `root_path` の `KdV.mat` から格子を、`read_data_fn` から解フィールドを読み込みます。
    ///
    /// 格子と解は常に同じファイルから読み込まれます。
    pub fn from_dataset<F>(data: &DataConfig, read_data_fn: F) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<DataMap>,
    {
        Self::from_file(
            Path::new(&data.root_path),
            DATA_FILENAME,
            &data.spatial_key,
            &data.time_key,
            read_data_fn,
        )
    }

    fn from_file<F>(
        root_path: &Path,
        file_name: &str,
        spatial_key: &str,
        time_key: &str,
        read_data_fn: F,
    ) -> Result<Self>
    where
        F: FnOnce(&Path) -> Result<DataMap>,
    {
        let file = data::load_data(root_path, file_name)?;
        let spatial = file.vector_f32(spatial_key)?;
        let time = file.vector_f32(time_key)?;
        let solution = read_data_fn(root_path)?;
        log::info!(
            "格子を読み込みました: 空間 {} 点, 時間 {} 点, フィールド {:?}",
            spatial.len(),
            time.len(),
            solution.keys().collect::<Vec<_>>()
        );
        Self::new(spatial, time, solution)
    }

    /// 空間の範囲。
    pub fn domain(&self) -> Domain {
        let lower = self.spatial.iter().copied().fold(f32::INFINITY, f32::min);
        let upper = self.spatial.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Domain {
            lower: lower as f64,
            upper: upper as f64,
        }
    }

    /// 時刻インデックス `idx_t` におけるフィールドの空間分布。
    pub fn snapshot(&self, field: &str, idx_t: usize) -> Result<Snapshot> {
        let data = self.field(field)?;
        if idx_t >= self.time.len() {
            return Err(PinnError::Config(format!(
                "時刻インデックス {} が範囲外です (時間点数: {})",
                idx_t,
                self.time.len()
            )));
        }
        let values = data::to_vec(data)?;
        let nt = self.time.len();
        let u = (0..self.spatial.len())
            .map(|i| values[i * nt + idx_t])
            .collect();
        Ok(Snapshot {
            time: self.time[idx_t],
            x: self.spatial.clone(),
            u,
        })
    }

    fn field(&self, name: &str) -> Result<&TensorData> {
        self.solution
            .get(name)
            .ok_or_else(|| PinnError::DataFormat(format!("解フィールド '{name}' がありません")))
    }
}

/// 空間座標の範囲。ネットワークへの入力は `[-1, 1]` に正規化します。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Domain {
    pub lower: f64,
    pub upper: f64,
}

impl Domain {
    pub fn normalize<B: burn::prelude::Backend>(&self, x: Jet<B>) -> Jet<B> {
        let scale = 2.0 / (self.upper - self.lower);
        x.affine(scale, -self.lower * scale - 1.0)
    }
}

/// ある時刻での空間点と値の組。
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub time: f32,
    pub x: Vec<f32>,
    pub u: Vec<f32>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// 重複なしで `n` 点を無作為に選びます。
    pub fn sample(&self, n: usize, seed: u64) -> Result<Snapshot> {
        if n == 0 || n > self.len() {
            return Err(PinnError::Config(format!(
                "{} 点から {} 点は選べません",
                self.len(),
                n
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let mut indices = rand::seq::index::sample(&mut rng, self.len(), n).into_vec();
        indices.sort_unstable();
        Ok(Snapshot {
            time: self.time,
            x: indices.iter().map(|&i| self.x[i]).collect(),
            u: indices.iter().map(|&i| self.u[i]).collect(),
        })
    }
}
