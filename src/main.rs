//! # KdV方程式のPINNによる係数同定プログラム
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）、`infer`（推論）、
//! `config`（既定設定の書き出し）を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --root-path data
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```

use anyhow::Context;
use burn::config::Config;
use clap::Parser;
use kdv_pinn::cli::{Cli, Commands};
use kdv_pinn::config::ExperimentConfig;
use kdv_pinn::{inference, training};

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`、`infer`、`config`の処理に振り分けます。
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            root_path,
            epochs,
            artifact_dir,
        } => {
            let mut config = match config {
                Some(path) => ExperimentConfig::from_file(&path)?,
                None => ExperimentConfig::with_defaults("data"),
            };
            if let Some(root_path) = root_path {
                config.data.root_path = root_path;
            }
            if let Some(epochs) = epochs {
                config.training.num_epochs = epochs;
            }
            if let Some(artifact_dir) = artifact_dir {
                config.artifact_dir = artifact_dir;
            }
            let metric_value = training::run(&config).context("学習に失敗しました")?;
            // ハイパーパラメータ最適化の呼び出し元が読み取る最終行
            match metric_value {
                Some(value) => println!("{value}"),
                None => println!("None"),
            }
        }
        Commands::Infer { artifact_dir } => {
            let metrics = inference::run(&artifact_dir).context("推論に失敗しました")?;
            for (name, value) in &metrics {
                println!("{name}: {value:.6}");
            }
        }
        Commands::Config { output, root_path } => {
            ExperimentConfig::with_defaults(root_path)
                .save(&output)
                .with_context(|| format!("'{output}' に書き出せません"))?;
            println!("=> 既定の設定を '{}' に保存しました。", output);
        }
    }
    Ok(())
}
