//! # KdV方程式の係数同定のための物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、Korteweg-de Vries 方程式
//! `u_t + l1 * u * u_x + exp(l2) * u_xxx = 0` の未知係数を、
//! 2つの時刻スナップショットから同定するための主要なコンポーネントを提供します。
//!
//! 空間微分は前進モード自動微分（[`jet`]）で厳密に求め、ネットワークの重みと係数は
//! `burn` の逆伝播で学習します。

pub mod cli;
pub mod config;
pub mod data;
pub mod discrete;
pub mod error;
pub mod inference;
pub mod jet;
pub mod kdv;
pub mod mesh;
pub mod metrics;
pub mod model;
pub mod pinn;
pub mod runge_kutta;
pub mod training;

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "kdv_pinn.mpk";
/// 学習時の設定を保存するファイル名
pub const CONFIG_FILENAME: &str = "config.json";
/// 評価メトリクスを保存するファイル名
pub const METRICS_FILENAME: &str = "metrics.json";
/// 損失の履歴を保存するファイル名
pub const HISTORY_FILENAME: &str = "history.json";
/// 損失グラフを保存するファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
