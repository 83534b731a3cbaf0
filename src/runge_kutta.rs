//! Gauss-Legendre 陰的ルンゲ＝クッタ法のブッチャー表。
//!
//! 離散時間PINNでは、2つの時刻スナップショットの間をq段の陰的ルンゲ＝クッタ法で
//! 結び、ネットワークが各段の値を出力します。

use crate::error::{PinnError, Result};

/// q段のブッチャー表。`a` は行優先の `q x q` 行列です。
#[derive(Clone, Debug)]
pub struct ButcherTableau {
    pub stages: usize,
    pub a: Vec<f64>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl ButcherTableau {
    /// q段 Gauss-Legendre 法（次数 2q）の係数を計算します。
    ///
    /// 節点 `c` はずらしたLegendre多項式の根、`a_ij` は節点上のLagrange基底
    /// `l_j` を `[0, c_i]` で積分した値、`b_j` は `[0, 1]` での積分値です。
    pub fn gauss_legendre(stages: usize) -> Result<Self> {
        if stages == 0 {
            return Err(PinnError::Config(
                "ルンゲ＝クッタ法の段数は1以上である必要があります".to_string(),
            ));
        }
        let (roots, weights) = legendre_roots(stages);
        let c: Vec<f64> = roots.iter().map(|r| 0.5 * (r + 1.0)).collect();
        let b: Vec<f64> = weights.iter().map(|w| 0.5 * w).collect();

        let mut a = vec![0.0; stages * stages];
        for i in 0..stages {
            for j in 0..stages {
                a[i * stages + j] = roots
                    .iter()
                    .zip(&weights)
                    .map(|(r, w)| {
                        let tau = 0.5 * c[i] * (r + 1.0);
                        0.5 * c[i] * w * lagrange(&c, j, tau)
                    })
                    .sum();
            }
        }

        Ok(Self { stages, a, b, c })
    }

    /// `A^T` を行優先で返します。
    pub fn a_transposed(&self) -> Vec<f64> {
        let q = self.stages;
        let mut out = vec![0.0; q * q];
        for i in 0..q {
            for j in 0..q {
                out[j * q + i] = self.a[i * q + j];
            }
        }
        out
    }

    /// `(b - A)^T` を行優先で返します（`b` は各行にブロードキャスト）。
    pub fn b_minus_a_transposed(&self) -> Vec<f64> {
        let q = self.stages;
        let mut out = vec![0.0; q * q];
        for i in 0..q {
            for j in 0..q {
                out[j * q + i] = self.b[j] - self.a[i * q + j];
            }
        }
        out
    }
}

/// 時間刻み `dt` に対して、打ち切り誤差が倍精度の丸め誤差程度になる段数。
pub fn stages_for_step(dt: f64) -> Result<usize> {
    if !(dt > 0.0 && dt < 1.0) {
        return Err(PinnError::Config(format!(
            "時間刻み {dt} から段数を決められません。段数を明示してください"
        )));
    }
    let q = (0.5 * f64::EPSILON.ln() / dt.ln()).ceil();
    Ok((q as usize).max(1))
}

/// `[-1, 1]` 上のLegendre多項式 `P_n` の根とGauss求積の重み（昇順）。
fn legendre_roots(n: usize) -> (Vec<f64>, Vec<f64>) {
    let mut roots = vec![0.0; n];
    let mut weights = vec![0.0; n];
    for i in 0..n {
        let mut x = (std::f64::consts::PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..100 {
            let (p, dp) = legendre(n, x);
            let dx = p / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        let (_, dp) = legendre(n, x);
        // 初期値は降順に並ぶので、昇順になるよう逆から詰める
        roots[n - 1 - i] = x;
        weights[n - 1 - i] = 2.0 / ((1.0 - x * x) * dp * dp);
    }
    (roots, weights)
}

/// `P_n(x)` と `P_n'(x)` を三項漸化式で評価します。
fn legendre(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let n = n as f64;
    let dp = n * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

fn lagrange(nodes: &[f64], j: usize, t: f64) -> f64 {
    nodes
        .iter()
        .enumerate()
        .filter(|&(m, _)| m != j)
        .map(|(_, &cm)| (t - cm) / (nodes[j] - cm))
        .product()
}
