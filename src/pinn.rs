use crate::error::{PinnError, Result};
use crate::jet::Jet;
use crate::model::{Model, ModelConfig};
use burn::config::Config;
use burn::module::{Module, Param};
use burn::prelude::Backend;
use burn::tensor::Tensor;
use std::collections::BTreeMap;

/// 追加変数の初期値。
#[derive(Config, Debug)]
pub struct ExtraVariablesConfig {
    #[config(default = 0.0)]
    pub l1: f64,
    #[config(default = "-6.0")]
    pub l2: f64,
}

impl ExtraVariablesConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ExtraVariables<B> {
        ExtraVariables {
            l1: scalar_param(self.l1, device),
            l2: scalar_param(self.l2, device),
        }
    }
}

fn scalar_param<B: Backend>(value: f64, device: &B::Device) -> Param<Tensor<B, 1>> {
    Param::from_tensor(Tensor::from_floats([value as f32], device))
}

/// ネットワークの重みと同時に学習される物理モデルのスカラー係数。
///
/// 残差関数は現在の値を読み取るだけで、更新はオプティマイザが行います。
#[derive(Module, Debug)]
pub struct ExtraVariables<B: Backend> {
    l1: Param<Tensor<B, 1>>,
    l2: Param<Tensor<B, 1>>,
}

impl<B: Backend> ExtraVariables<B> {
    pub const NAMES: [&'static str; 2] = ["l1", "l2"];

    /// 名前で係数を取り出します。形状は `[1]` です。
    pub fn get(&self, name: &str) -> Result<Tensor<B, 1>> {
        match name {
            "l1" => Ok(self.l1.val()),
            "l2" => Ok(self.l2.val()),
            other => Err(PinnError::UnknownVariable(other.to_string())),
        }
    }
}

/// フィールド名から予測値（ジェット）への対応。
///
/// 順伝播ごとに作られ、保存はされません。
#[derive(Clone, Debug)]
pub struct Outputs<B: Backend> {
    fields: BTreeMap<String, Jet<B>>,
}

impl<B: Backend> Default for Outputs<B> {
    fn default() -> Self {
        Self {
            fields: BTreeMap::new(),
        }
    }
}

impl<B: Backend> Outputs<B> {
    pub fn insert(&mut self, name: impl Into<String>, value: Jet<B>) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<&Jet<B>> {
        self.fields
            .get(name)
            .ok_or_else(|| PinnError::MissingOutput(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

/// ネットワークと追加変数をまとめた学習対象。
#[derive(Module, Debug)]
pub struct Pinn<B: Backend> {
    pub net: Model<B>,
    pub extra: ExtraVariables<B>,
}

impl<B: Backend> Pinn<B> {
    pub fn new(
        model: &ModelConfig,
        extra: &ExtraVariablesConfig,
        device: &B::Device,
    ) -> Self {
        Self {
            net: model.init(device),
            extra: extra.init(device),
        }
    }

    /// 入力座標のジェットから、出力 `u` を含む [`Outputs`] を作ります。
    pub fn forward(&self, input: Jet<B>) -> Outputs<B> {
        let mut outputs = Outputs::default();
        outputs.insert("u", self.net.forward_jet(input));
        outputs
    }

    /// 学習中の係数 `l1` と、物理係数 `exp(l2)` の現在値。
    pub fn coefficients(&self) -> Result<(f64, f64)> {
        use burn::tensor::ElementConversion;
        let l1 = self.extra.get("l1")?.into_scalar().elem::<f64>();
        let l2 = self.extra.get("l2")?.into_scalar().elem::<f64>();
        Ok((l1, l2.exp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn extra_variables_lookup_by_name() {
        let device = Default::default();
        let extra = ExtraVariablesConfig::new()
            .with_l1(0.5)
            .init::<TestBackend>(&device);
        let l1 = extra.get("l1").unwrap().into_data().to_vec::<f32>().unwrap();
        assert_eq!(l1, vec![0.5]);
        for name in ExtraVariables::<TestBackend>::NAMES {
            assert!(extra.get(name).is_ok());
        }
        assert!(matches!(
            extra.get("l3"),
            Err(PinnError::UnknownVariable(_))
        ));
    }

    #[test]
    fn missing_output_is_reported() {
        let outputs = Outputs::<TestBackend>::default();
        assert!(!outputs.contains("u"));
        assert!(matches!(outputs.get("u"), Err(PinnError::MissingOutput(_))));
    }

    #[test]
    fn coefficients_apply_exponential_to_l2() {
        let device = Default::default();
        let pinn = Pinn::<TestBackend>::new(
            &ModelConfig::new(1).with_hidden(vec![4]),
            &ExtraVariablesConfig::new().with_l1(1.0).with_l2(0.0),
            &device,
        );
        let (l1, l2) = pinn.coefficients().unwrap();
        assert!((l1 - 1.0).abs() < 1e-6);
        assert!((l2 - 1.0).abs() < 1e-6);
    }
}
