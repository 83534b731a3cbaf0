use clap::{Parser, Subcommand};

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "Identify the KdV equation coefficients with a physics-informed neural network (Burn)", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（train, infer または config）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNを学習し、結果を成果物ディレクトリに保存します
    Train {
        /// 設定ファイル（JSON）。省略時は既定値を使います
        #[arg(short, long)]
        config: Option<String>,
        /// KdV.mat を置いたディレクトリ
        #[arg(long)]
        root_path: Option<String>,
        /// エポック数
        #[arg(long)]
        epochs: Option<usize>,
        /// 成果物ディレクトリ
        #[arg(long)]
        artifact_dir: Option<String>,
    },
    /// 保存されたモデルを読み込み、格子全体で評価します
    Infer {
        /// 成果物ディレクトリ
        #[arg(long, default_value = "artifacts")]
        artifact_dir: String,
    },
    /// 既定の設定をJSONファイルに書き出します
    Config {
        #[arg(short, long, default_value = "config.json")]
        output: String,
        /// KdV.mat を置いたディレクトリ
        #[arg(long, default_value = "data")]
        root_path: String,
    },
}
