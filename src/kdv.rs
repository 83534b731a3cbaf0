//! Korteweg-de Vries 方程式のためのコールバック。
//!
//! ```text
//! u_t + l1 * u * u_x + exp(l2) * u_xxx = 0
//! ```
//!
//! 学習エンジンは [`read_data_fn`] を起動時に1度だけ、[`pde_fn`] を残差評価ごとに呼びます。

use crate::data::{self, DataMap};
use crate::error::Result;
use crate::jet::{Coordinate, fwd_gradient};
use crate::pinn::{ExtraVariables, Outputs};
use burn::prelude::Backend;
use std::path::Path;

/// データセットのファイル名
pub const DATA_FILENAME: &str = "KdV.mat";

/// `root_path` の `KdV.mat` から厳密解 `uu` を読み込み、`u` として返します。
///
/// 虚部は破棄され、32ビット浮動小数点の `[空間, 時間]` 配列になります。
pub fn read_data_fn(root_path: &Path) -> Result<DataMap> {
    let data = data::load_data(root_path, DATA_FILENAME)?;
    let exact_u = data.real_f32("uu")?;
    Ok(DataMap::from([("u".to_string(), exact_u)]))
}

/// 偏微分方程式の残差 `f = -l1 * u * u_x - exp(l2) * u_xxx` を計算し、`f` として書き込みます。
pub fn pde_fn<B: Backend>(
    mut outputs: Outputs<B>,
    x: &Coordinate<B>,
    extra_variables: &ExtraVariables<B>,
) -> Result<Outputs<B>> {
    let u = outputs.get("u")?.clone();
    let u_x = fwd_gradient(&u, x)?;
    let u_xx = fwd_gradient(&u_x, x)?;
    let u_xxx = fwd_gradient(&u_xx, x)?;

    let l1 = extra_variables.get("l1")?.unsqueeze::<2>();
    let l2 = extra_variables.get("l2")?.unsqueeze::<2>();
    let f = u
        .mul(&u_x)
        .scale(l1.neg())
        .sub(u_xxx.scale(l2.exp()));

    outputs.insert("f", f);
    Ok(outputs)
}
