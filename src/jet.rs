//! # 前進モード自動微分（Taylorジェット）
//!
//! 入力座標 `x` に関する打ち切りTaylor級数
//!
//! ```text
//! u(x + h) = u_0 + u_1 h + u_2 h^2 + ... + u_K h^K
//! ```
//!
//! の係数 `u_k = u^(k)(x) / k!` をテンソルとして保持し、演算ごとに係数を伝播させます。
//! 差分近似ではないため、3階微分でも打ち切り誤差は生じません。
//!
//! 係数は `burn` のテンソル演算だけで組み立てるため、自動微分バックエンド上では
//! ネットワークの重みや追加変数に関する逆伝播もそのまま行えます。
//! 各行（サンプル）は独立に扱われ、行ごとに自分自身の座標で微分されます。

use crate::error::{PinnError, Result};
use burn::nn::Linear;
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// 打ち切りTaylor級数。`coeffs[k]` が `k` 次の係数です。
#[derive(Clone, Debug)]
pub struct Jet<B: Backend> {
    coeffs: Vec<Tensor<B, 2>>,
}

impl<B: Backend> Jet<B> {
    /// 座標に依存しない定数。`order` 次までの係数はすべてゼロになります。
    pub fn constant(value: Tensor<B, 2>, order: usize) -> Self {
        let zeros = Tensor::zeros_like(&value);
        let mut coeffs = Vec::with_capacity(order + 1);
        coeffs.push(value);
        coeffs.extend(std::iter::repeat_n(zeros, order));
        Self { coeffs }
    }

    /// 保持している最高次数。
    pub fn order(&self) -> usize {
        self.coeffs.len() - 1
    }

    /// 0次の係数（関数値）。
    pub fn value(&self) -> Tensor<B, 2> {
        self.coeffs[0].clone()
    }

    /// `k` 階導関数 `u^(k) = k! * u_k` を返します。
    pub fn derivative(&self, k: usize) -> Option<Tensor<B, 2>> {
        let coeff = self.coeffs.get(k)?;
        let factorial: f64 = (1..=k).map(|i| i as f64).product();
        Some(coeff.clone().mul_scalar(factorial))
    }

    /// 級数を項別微分し、次数を1つ下げたジェットを返します。
    fn shift(&self) -> Option<Self> {
        if self.order() == 0 {
            return None;
        }
        let coeffs = self.coeffs[1..]
            .iter()
            .enumerate()
            .map(|(k, c)| c.clone().mul_scalar((k + 1) as f64))
            .collect();
        Some(Self { coeffs })
    }

    pub fn add(self, other: Self) -> Self {
        let order = self.order().min(other.order());
        let coeffs = self
            .coeffs
            .into_iter()
            .zip(other.coeffs)
            .take(order + 1)
            .map(|(a, b)| a + b)
            .collect();
        Self { coeffs }
    }

    pub fn sub(self, other: Self) -> Self {
        let order = self.order().min(other.order());
        let coeffs = self
            .coeffs
            .into_iter()
            .zip(other.coeffs)
            .take(order + 1)
            .map(|(a, b)| a - b)
            .collect();
        Self { coeffs }
    }

    /// 級数同士の積（Cauchy積）。次数は小さい方に揃えます。
    pub fn mul(&self, other: &Self) -> Self {
        let order = self.order().min(other.order());
        let coeffs = (0..=order)
            .map(|k| cauchy_term(&self.coeffs, &other.coeffs, k))
            .collect();
        Self { coeffs }
    }

    /// 座標に依存しない係数（ブロードキャスト可能なテンソル）を全次数に掛けます。
    pub fn scale(self, factor: Tensor<B, 2>) -> Self {
        let coeffs = self
            .coeffs
            .into_iter()
            .map(|c| c * factor.clone())
            .collect();
        Self { coeffs }
    }

    /// アフィン変換 `a * u + b`。定数項 `b` は値にのみ加わります。
    pub fn affine(self, a: f64, b: f64) -> Self {
        let coeffs = self
            .coeffs
            .into_iter()
            .enumerate()
            .map(|(k, c)| {
                let c = c.mul_scalar(a);
                if k == 0 { c.add_scalar(b) } else { c }
            })
            .collect();
        Self { coeffs }
    }

    /// 全結合層。バイアスは値にのみ加わり、高次の係数は重み行列との積になります。
    pub fn linear(self, layer: &Linear<B>) -> Self {
        let weight = layer.weight.val();
        let coeffs = self
            .coeffs
            .into_iter()
            .enumerate()
            .map(|(k, c)| {
                if k == 0 {
                    layer.forward(c)
                } else {
                    c.matmul(weight.clone())
                }
            })
            .collect();
        Self { coeffs }
    }

    /// 双曲線正接。
    ///
    /// `y = tanh(z)` は `y' = (1 - y^2) z'` を満たすため、`s = 1 - y^2` として
    /// `y_k = (1/k) * sum_{j=1..k} j * z_j * s_{k-j}` で係数を逐次求めます。
    pub fn tanh(&self) -> Self {
        let order = self.order();
        let z = &self.coeffs;
        let mut y: Vec<Tensor<B, 2>> = Vec::with_capacity(order + 1);
        let mut s: Vec<Tensor<B, 2>> = Vec::with_capacity(order);
        y.push(z[0].clone().tanh());
        for k in 1..=order {
            let m = k - 1;
            let y_sq = cauchy_term(&y, &y, m);
            s.push(if m == 0 {
                y_sq.neg().add_scalar(1.0)
            } else {
                y_sq.neg()
            });
            let mut acc = z[1].clone() * s[k - 1].clone();
            for j in 2..=k {
                acc = acc + (z[j].clone() * s[k - j].clone()).mul_scalar(j as f64);
            }
            y.push(acc.div_scalar(k as f64));
        }
        Self { coeffs: y }
    }
}

fn cauchy_term<B: Backend>(a: &[Tensor<B, 2>], b: &[Tensor<B, 2>], k: usize) -> Tensor<B, 2> {
    let mut acc = a[0].clone() * b[k].clone();
    for j in 1..=k {
        acc = acc + a[j].clone() * b[k - j].clone();
    }
    acc
}

/// ネットワークへ与える入力座標。
///
/// [`Coordinate::require_grad`] で微分の種（`dx/dx = 1`）を与えたものだけが
/// [`fwd_gradient`] の微分変数になれます。
#[derive(Clone, Debug)]
pub struct Coordinate<B: Backend> {
    jet: Jet<B>,
    requires_grad: bool,
}

impl<B: Backend> Coordinate<B> {
    /// 微分を要求しない座標。形状は `[点数, 1]`。
    pub fn new(values: Tensor<B, 2>) -> Self {
        Self {
            jet: Jet::constant(values, 0),
            requires_grad: false,
        }
    }

    /// `order` 階までの微分を要求します。
    pub fn require_grad(self, order: usize) -> Self {
        let values = self.jet.value();
        let mut coeffs = Vec::with_capacity(order + 1);
        coeffs.push(values.clone());
        if order >= 1 {
            coeffs.push(Tensor::ones_like(&values));
        }
        if order >= 2 {
            let zeros = Tensor::zeros_like(&values);
            coeffs.extend(std::iter::repeat_n(zeros, order - 1));
        }
        Self {
            jet: Jet { coeffs },
            requires_grad: order >= 1,
        }
    }

    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    pub fn values(&self) -> Tensor<B, 2> {
        self.jet.value()
    }

    /// 座標自身のジェット（恒等写像 `u(x) = x`）。
    pub fn jet(&self) -> &Jet<B> {
        &self.jet
    }
}

/// `u` の `x` に関する1階導関数を前進モードで求めます。
///
/// 戻り値は次数が1つ低いジェットなので、続けて呼ぶことで高階導関数が得られます。
/// `x` が微分を要求していない場合や、`u` に残りの次数がない場合は
/// [`PinnError::NonDifferentiableInput`] を返します。
pub fn fwd_gradient<B: Backend>(u: &Jet<B>, x: &Coordinate<B>) -> Result<Jet<B>> {
    if !x.requires_grad() {
        return Err(PinnError::NonDifferentiableInput(
            "座標が微分を要求していません".to_string(),
        ));
    }
    u.shift().ok_or_else(|| {
        PinnError::NonDifferentiableInput(
            "これ以上高階の導関数を求める次数が残っていません".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;

    fn column(values: &[f32]) -> Tensor<TestBackend, 2> {
        let device = Default::default();
        Tensor::<TestBackend, 1>::from_floats(values, &device).reshape([values.len(), 1])
    }

    fn assert_close(actual: Tensor<TestBackend, 2>, expected: &[f32], tol: f32) {
        let actual = actual.into_data().to_vec::<f32>().unwrap();
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < tol, "{a} != {e}");
        }
    }

    #[test]
    fn seeded_coordinate_is_identity() {
        let x = Coordinate::new(column(&[0.5, -1.0])).require_grad(3);
        let u = x.jet().clone();
        assert_eq!(u.order(), 3);
        let u_x = fwd_gradient(&u, &x).unwrap();
        let u_xx = fwd_gradient(&u_x, &x).unwrap();
        assert_close(u_x.value(), &[1.0, 1.0], 1e-7);
        assert_close(u_xx.value(), &[0.0, 0.0], 1e-7);
    }

    #[test]
    fn product_follows_power_rule() {
        // u = x^3 なので u' = 3x^2, u'' = 6x, u''' = 6
        let x = Coordinate::new(column(&[2.0, -0.5])).require_grad(3);
        let u = x.jet().mul(x.jet()).mul(x.jet());
        assert_close(u.value(), &[8.0, -0.125], 1e-6);
        assert_close(u.derivative(1).unwrap(), &[12.0, 0.75], 1e-5);
        assert_close(u.derivative(2).unwrap(), &[12.0, -3.0], 1e-5);
        assert_close(u.derivative(3).unwrap(), &[6.0, 6.0], 1e-5);
    }

    #[test]
    fn tanh_matches_analytic_derivatives() {
        let points = [0.3f32, -1.2, 0.0];
        let x = Coordinate::new(column(&points)).require_grad(3);
        let y = x.jet().clone().affine(2.0, 0.0).tanh();

        let mut d1 = Vec::new();
        let mut d2 = Vec::new();
        let mut d3 = Vec::new();
        for &p in &points {
            let t = (2.0 * p as f64).tanh();
            let s = 1.0 - t * t;
            d1.push((2.0 * s) as f32);
            d2.push((4.0 * -2.0 * t * s) as f32);
            d3.push((8.0 * -2.0 * s * (1.0 - 3.0 * t * t)) as f32);
        }
        assert_close(y.derivative(1).unwrap(), &d1, 1e-5);
        assert_close(y.derivative(2).unwrap(), &d2, 1e-4);
        assert_close(y.derivative(3).unwrap(), &d3, 1e-4);
    }

    #[test]
    fn linear_layer_propagates_through_weights() {
        let device = Default::default();
        let mut layer = burn::nn::LinearConfig::new(1, 2).init::<TestBackend>(&device);
        layer.weight = burn::module::Param::from_tensor(Tensor::from_data(
            TensorData::new(vec![3.0f32, -1.0], [1, 2]),
            &device,
        ));
        let x = Coordinate::new(column(&[1.0])).require_grad(2);
        let y = x.jet().clone().linear(&layer);
        assert_close(y.derivative(1).unwrap(), &[3.0, -1.0], 1e-6);
        assert_close(y.derivative(2).unwrap(), &[0.0, 0.0], 1e-6);
    }

    #[test]
    fn gradient_requires_seeded_coordinate() {
        let x = Coordinate::new(column(&[1.0]));
        let u = Jet::constant(column(&[2.0]), 3);
        assert!(matches!(
            fwd_gradient(&u, &x),
            Err(PinnError::NonDifferentiableInput(_))
        ));
    }

    #[test]
    fn gradient_fails_when_order_is_exhausted() {
        let x = Coordinate::new(column(&[1.0])).require_grad(1);
        let u_x = fwd_gradient(x.jet(), &x).unwrap();
        assert!(matches!(
            fwd_gradient(&u_x, &x),
            Err(PinnError::NonDifferentiableInput(_))
        ));
    }
}
