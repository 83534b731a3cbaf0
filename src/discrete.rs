//! 離散時間モデルによる係数同定。
//!
//! 時刻 `t0`, `t1` の2つのスナップショットをq段の陰的ルンゲ＝クッタ法で結びます。
//! ネットワークの出力 `U`（各段の値）と残差 `F` から
//!
//! ```text
//! U0 = U - dt * F A^T      （t0 の値に戻す）
//! U1 = U + dt * F (b - A)^T（t1 の値へ進める）
//! ```
//!
//! を作り、それぞれ観測値との二乗誤差の和を損失とします。

use crate::config::{DataConfig, NetConfig};
use crate::error::{PinnError, Result};
use crate::jet::Coordinate;
use crate::mesh::{Domain, Mesh, Snapshot};
use crate::pinn::{ExtraVariables, Outputs, Pinn};
use crate::runge_kutta::{ButcherTableau, stages_for_step};
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

/// 残差関数が必要とする微分の階数
pub const DERIVATIVE_ORDER: usize = 3;

/// 格子全体から組み立てた同定問題。
#[derive(Clone, Debug)]
pub struct DiscreteProblem {
    pub domain: Domain,
    pub dt: f64,
    pub tableau: ButcherTableau,
    pub snapshot0: Snapshot,
    pub snapshot1: Snapshot,
}

impl DiscreteProblem {
    pub fn from_mesh(mesh: &Mesh, data: &DataConfig, net: &NetConfig) -> Result<Self> {
        let snapshot0 = mesh.snapshot("u", data.idx_t0)?;
        let snapshot1 = mesh.snapshot("u", data.idx_t1)?;
        let dt = (snapshot1.time - snapshot0.time) as f64;
        if !(dt > 0.0) {
            return Err(PinnError::DataFormat(format!(
                "時刻が増加していません (t0 = {}, t1 = {})",
                snapshot0.time, snapshot1.time
            )));
        }
        let stages = match net.stages {
            Some(q) => q,
            None => stages_for_step(dt)?,
        };
        let tableau = ButcherTableau::gauss_legendre(stages)?;
        log::info!(
            "スナップショット t0 = {:.3}, t1 = {:.3} (dt = {:.3}), ルンゲ＝クッタ段数 {}",
            snapshot0.time,
            snapshot1.time,
            dt,
            stages
        );
        Ok(Self {
            domain: mesh.domain(),
            dt,
            tableau,
            snapshot0,
            snapshot1,
        })
    }

    pub fn stages(&self) -> usize {
        self.tableau.stages
    }
}

/// ブッチャー表をテンソルにしたもの。
#[derive(Clone, Debug)]
pub struct RungeKuttaOperator<B: Backend> {
    dt: f64,
    a_t: Tensor<B, 2>,
    b_minus_a_t: Tensor<B, 2>,
}

impl<B: Backend> RungeKuttaOperator<B> {
    pub fn new(problem: &DiscreteProblem, device: &B::Device) -> Self {
        let q = problem.stages();
        let matrix = |values: Vec<f64>| {
            let values: Vec<f32> = values.into_iter().map(|v| v as f32).collect();
            Tensor::<B, 2>::from_data(TensorData::new(values, [q, q]), device)
        };
        Self {
            dt: problem.dt,
            a_t: matrix(problem.tableau.a_transposed()),
            b_minus_a_t: matrix(problem.tableau.b_minus_a_transposed()),
        }
    }

    /// 段の値から `t0` における値を復元します。
    pub fn to_t0(&self, u: Tensor<B, 2>, f: Tensor<B, 2>) -> Tensor<B, 2> {
        u - f.matmul(self.a_t.clone()).mul_scalar(self.dt)
    }

    /// 段の値から `t1` における値を求めます。
    pub fn to_t1(&self, u: Tensor<B, 2>, f: Tensor<B, 2>) -> Tensor<B, 2> {
        u + f.matmul(self.b_minus_a_t.clone()).mul_scalar(self.dt)
    }
}

/// テンソル化したスナップショット。`x`, `u` とも形状は `[点数, 1]`。
#[derive(Clone, Debug)]
pub struct SnapshotBatch<B: Backend> {
    pub x: Tensor<B, 2>,
    pub u: Tensor<B, 2>,
}

impl<B: Backend> SnapshotBatch<B> {
    pub fn new(snapshot: &Snapshot, device: &B::Device) -> Self {
        let n = snapshot.len();
        Self {
            x: Tensor::<B, 1>::from_floats(snapshot.x.as_slice(), device).reshape([n, 1]),
            u: Tensor::<B, 1>::from_floats(snapshot.u.as_slice(), device).reshape([n, 1]),
        }
    }
}

/// 点 `x` における段の予測値 `U` と残差 `F` を求めます。
pub fn stage_residuals<B, P>(
    pinn: &Pinn<B>,
    domain: &Domain,
    x: &Tensor<B, 2>,
    pde_fn: &P,
) -> Result<(Tensor<B, 2>, Tensor<B, 2>)>
where
    B: Backend,
    P: Fn(Outputs<B>, &Coordinate<B>, &ExtraVariables<B>) -> Result<Outputs<B>>,
{
    let coords = Coordinate::new(x.clone()).require_grad(DERIVATIVE_ORDER);
    let outputs = pinn.forward(domain.normalize(coords.jet().clone()));
    let outputs = pde_fn(outputs, &coords, &pinn.extra)?;
    Ok((outputs.get("u")?.value(), outputs.get("f")?.value()))
}

/// 2つのスナップショットそれぞれの二乗誤差和。
pub fn snapshot_losses<B, P>(
    pinn: &Pinn<B>,
    domain: &Domain,
    operator: &RungeKuttaOperator<B>,
    batch0: &SnapshotBatch<B>,
    batch1: &SnapshotBatch<B>,
    pde_fn: &P,
) -> Result<(Tensor<B, 1>, Tensor<B, 1>)>
where
    B: Backend,
    P: Fn(Outputs<B>, &Coordinate<B>, &ExtraVariables<B>) -> Result<Outputs<B>>,
{
    let (u, f) = stage_residuals(pinn, domain, &batch0.x, pde_fn)?;
    let loss0 = sum_squared_error(operator.to_t0(u, f), batch0.u.clone());
    let (u, f) = stage_residuals(pinn, domain, &batch1.x, pde_fn)?;
    let loss1 = sum_squared_error(operator.to_t1(u, f), batch1.u.clone());
    Ok((loss0, loss1))
}

/// `target` は `[点数, 1]` で、全段にブロードキャストされます。
fn sum_squared_error<B: Backend>(pred: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    let diff = pred - target;
    (diff.clone() * diff).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExperimentConfig;
    use crate::data::DataMap;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn mesh() -> Mesh {
        let spatial: Vec<f32> = (0..11).map(|i| -1.0 + 0.2 * i as f32).collect();
        let time = vec![0.0, 0.1, 0.2, 0.3];
        let values = vec![0.5f32; 11 * 4];
        let solution = DataMap::from([("u".to_string(), TensorData::new(values, [11, 4]))]);
        Mesh::new(spatial, time, solution).unwrap()
    }

    fn config() -> ExperimentConfig {
        let mut config = ExperimentConfig::with_defaults("unused");
        config.data.idx_t0 = 0;
        config.data.idx_t1 = 3;
        config.net.stages = Some(3);
        config
    }

    #[test]
    fn problem_uses_configured_snapshots() {
        let config = config();
        let problem = DiscreteProblem::from_mesh(&mesh(), &config.data, &config.net).unwrap();
        assert_eq!(problem.stages(), 3);
        assert!((problem.dt - 0.3).abs() < 1e-6);
        assert_eq!(problem.snapshot1.len(), 11);
        assert_eq!(problem.domain.lower, -1.0);
    }

    #[test]
    fn non_increasing_time_is_rejected() {
        let spatial: Vec<f32> = (0..11).map(|i| -1.0 + 0.2 * i as f32).collect();
        let time = vec![0.3, 0.2, 0.1, 0.0];
        let solution = DataMap::from([("u".to_string(), TensorData::new(vec![0.5f32; 44], [11, 4]))]);
        let mesh = Mesh::new(spatial, time, solution).unwrap();
        let config = config();
        let result = DiscreteProblem::from_mesh(&mesh, &config.data, &config.net);
        assert!(matches!(result, Err(PinnError::DataFormat(_))));
    }

    #[test]
    fn zero_residual_keeps_stage_values() {
        let config = config();
        let problem = DiscreteProblem::from_mesh(&mesh(), &config.data, &config.net).unwrap();
        let device = Default::default();
        let op = RungeKuttaOperator::<TestBackend>::new(&problem, &device);
        let u = Tensor::<TestBackend, 2>::ones([2, 3], &device);
        let f = Tensor::<TestBackend, 2>::zeros([2, 3], &device);
        let back = op.to_t0(u.clone(), f.clone()).into_data().to_vec::<f32>().unwrap();
        let fwd = op.to_t1(u, f).into_data().to_vec::<f32>().unwrap();
        assert!(back.iter().chain(&fwd).all(|&v| v == 1.0));
    }

    #[test]
    fn constant_rate_advances_by_dt() {
        // f が定数 r なら、t1 の値は U + dt * r * (1 - c_i) になる
        let config = config();
        let problem = DiscreteProblem::from_mesh(&mesh(), &config.data, &config.net).unwrap();
        let device = Default::default();
        let op = RungeKuttaOperator::<TestBackend>::new(&problem, &device);
        let u = Tensor::<TestBackend, 2>::zeros([1, 3], &device);
        let f = Tensor::<TestBackend, 2>::ones([1, 3], &device);
        let fwd = op.to_t1(u, f).into_data().to_vec::<f32>().unwrap();
        for (v, c) in fwd.iter().zip(&problem.tableau.c) {
            let expected = problem.dt * (1.0 - c);
            assert!((*v as f64 - expected).abs() < 1e-5, "{v} != {expected}");
        }
    }

    #[test]
    fn losses_are_finite_for_fresh_network() {
        let config = config();
        let problem = DiscreteProblem::from_mesh(&mesh(), &config.data, &config.net).unwrap();
        let device = Default::default();
        let pinn = Pinn::<TestBackend>::new(
            &crate::model::ModelConfig::new(problem.stages()).with_hidden(vec![8, 8]),
            &config.extra,
            &device,
        );
        let op = RungeKuttaOperator::new(&problem, &device);
        let b0 = SnapshotBatch::new(&problem.snapshot0, &device);
        let b1 = SnapshotBatch::new(&problem.snapshot1, &device);
        let (l0, l1) =
            snapshot_losses(&pinn, &problem.domain, &op, &b0, &b1, &crate::kdv::pde_fn::<TestBackend>)
                .unwrap();
        let l0 = l0.into_scalar();
        let l1 = l1.into_scalar();
        assert!(l0.is_finite() && l0 >= 0.0);
        assert!(l1.is_finite() && l1 >= 0.0);
    }
}
