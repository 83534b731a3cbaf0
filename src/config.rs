//! 実験設定。
//!
//! `burn` の `Config` として定義しているため、JSONファイルへの保存・読み込みができます。
//! 階層は `data` / `net` / `extra` / `training` と、最適化対象のメトリクス名です。

use crate::error::{PinnError, Result};
use crate::pinn::ExtraVariablesConfig;
use burn::config::Config;
use burn::optim::AdamConfig;

/// データセットと時刻スナップショットの設定。
#[derive(Config, Debug)]
pub struct DataConfig {
    /// `KdV.mat` を置いたディレクトリ
    pub root_path: String,
    #[config(default = "\"x\".to_string()")]
    pub spatial_key: String,
    #[config(default = "\"tt\".to_string()")]
    pub time_key: String,
    /// 1つ目のスナップショットの時刻インデックス
    #[config(default = 40)]
    pub idx_t0: usize,
    /// 2つ目のスナップショットの時刻インデックス
    #[config(default = 160)]
    pub idx_t1: usize,
    #[config(default = 199)]
    pub n0: usize,
    #[config(default = 201)]
    pub n1: usize,
    #[config(default = 1234)]
    pub seed: u64,
}

/// ネットワーク構造。出力次元はルンゲ＝クッタ法の段数から決まります。
#[derive(Config, Debug)]
pub struct NetConfig {
    #[config(default = "vec![50, 50, 50, 50]")]
    pub hidden: Vec<usize>,
    /// 段数。指定しない場合は時間刻みから決めます。
    #[config(default = "None")]
    pub stages: Option<usize>,
}

#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 10000)]
    pub num_epochs: usize,
    #[config(default = 200)]
    pub log_every: usize,
    /// 評価用の真の係数 `l1`
    #[config(default = "Some(1.0)")]
    pub true_l1: Option<f64>,
    /// 評価用の真の係数 `exp(l2)`
    #[config(default = "Some(0.0025)")]
    pub true_l2: Option<f64>,
}

#[derive(Config)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub net: NetConfig,
    pub extra: ExtraVariablesConfig,
    pub training: TrainingConfig,
    /// 学習後に取り出すメトリクス名
    #[config(default = "vec![\"val/error_u\".to_string()]")]
    pub optimized_metric: Vec<String>,
    #[config(default = "\"artifacts\".to_string()")]
    pub artifact_dir: String,
}

impl ExperimentConfig {
    /// `root_path` 以外を既定値とした設定。
    pub fn with_defaults(root_path: impl Into<String>) -> Self {
        Self::new(
            DataConfig::new(root_path.into()),
            NetConfig::new(),
            ExtraVariablesConfig::new(),
            TrainingConfig::new(AdamConfig::new()),
        )
    }

    /// JSONファイルから読み込み、検査します。
    pub fn from_file(path: &str) -> Result<Self> {
        let config = Self::load(path)
            .map_err(|e| PinnError::Config(format!("'{path}' を読み込めません: {e:?}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let data = &self.data;
        if data.idx_t0 >= data.idx_t1 {
            return Err(PinnError::Config(format!(
                "idx_t0 ({}) は idx_t1 ({}) より小さい必要があります",
                data.idx_t0, data.idx_t1
            )));
        }
        if data.n0 == 0 || data.n1 == 0 {
            return Err(PinnError::Config("n0, n1 は1以上である必要があります".to_string()));
        }
        if self.net.stages == Some(0) {
            return Err(PinnError::Config("stages は1以上である必要があります".to_string()));
        }
        if self.training.num_epochs == 0 || self.training.log_every == 0 {
            return Err(PinnError::Config(
                "num_epochs, log_every は1以上である必要があります".to_string(),
            ));
        }
        if !(self.training.learning_rate > 0.0) {
            return Err(PinnError::Config(format!(
                "learning_rate ({}) は正である必要があります",
                self.training.learning_rate
            )));
        }
        Ok(())
    }

    /// 実行前に設定内容をログへ出力します。
    pub fn log_summary(&self) {
        log::info!(
            "データ: {}/ (スナップショット {} -> {}, 点数 {} / {})",
            self.data.root_path,
            self.data.idx_t0,
            self.data.idx_t1,
            self.data.n0,
            self.data.n1
        );
        log::info!(
            "ネットワーク: 隠れ層 {:?}, 段数 {}",
            self.net.hidden,
            self.net
                .stages
                .map_or_else(|| "自動".to_string(), |q| q.to_string())
        );
        log::info!(
            "学習: {} エポック, 学習率 {}",
            self.training.num_epochs,
            self.training.learning_rate
        );
        log::debug!("設定全体: {}", self);
    }
}
