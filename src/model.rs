use crate::jet::Jet;
use burn::config::Config;
use burn::module::Module;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::Backend;

/// ネットワーク構造の設定。
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// 出力次元（ルンゲ＝クッタ法の段数）
    pub output_dim: usize,
    #[config(default = 1)]
    pub input_dim: usize,
    #[config(default = "vec![50, 50, 50, 50]")]
    pub hidden: Vec<usize>,
}

impl ModelConfig {
    /// 新しいモデルを初期化します。重みは Xavier 正規分布で初期化します。
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        let mut dims = Vec::with_capacity(self.hidden.len() + 2);
        dims.push(self.input_dim);
        dims.extend(&self.hidden);
        dims.push(self.output_dim);

        let linears = dims
            .windows(2)
            .map(|w| {
                LinearConfig::new(w[0], w[1])
                    .with_initializer(Initializer::XavierNormal { gain: 1.0 })
                    .init(device)
            })
            .collect();
        Model { linears }
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 正規化済みの空間座標xを入力とし、各ルンゲ＝クッタ段における物理量uを予測する
/// 多層パーセプトロン（MLP）です。
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    linears: Vec<Linear<B>>,
}

impl<B: Backend> Model<B> {
    /// 入力座標のジェットを順伝播し、出力のジェットを返します。
    ///
    /// 最終層以外の後に tanh を挟みます。
    pub fn forward_jet(&self, input: Jet<B>) -> Jet<B> {
        let last = self.linears.len().saturating_sub(1);
        let mut x = input;
        for (i, linear) in self.linears.iter().enumerate() {
            x = x.linear(linear);
            if i < last {
                x = x.tanh();
            }
        }
        x
    }
}
