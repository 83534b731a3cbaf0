use crate::config::ExperimentConfig;
use crate::data::DataMap;
use crate::discrete::{DiscreteProblem, RungeKuttaOperator, SnapshotBatch, snapshot_losses};
use crate::error::{PinnError, Result};
use crate::inference::evaluate;
use crate::jet::Coordinate;
use crate::kdv::{pde_fn, read_data_fn};
use crate::mesh::Mesh;
use crate::metrics::{self, MetricDict, get_metric_value};
use crate::model::ModelConfig;
use crate::pinn::{ExtraVariables, Outputs, Pinn};
use crate::{CONFIG_FILENAME, HISTORY_FILENAME, LOSS_GRAPH_FILENAME, METRICS_FILENAME, MODEL_FILENAME};
use burn::backend::{Autodiff, NdArray};
use burn::config::Config;
use burn::module::Module;
use burn::optim::{GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use plotters::prelude::*;
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

type MyBackend = Autodiff<NdArray<f32>>;

/// 記録した時点での損失と同定中の係数。
#[derive(Clone, Debug, Serialize)]
pub struct LossRecord {
    pub epoch: usize,
    pub loss: f64,
    pub loss_t0: f64,
    pub loss_t1: f64,
    pub l1: f64,
    pub l2: f64,
}

/// 学習の結果。
pub struct TrainOutcome<B: AutodiffBackend> {
    pub metrics: MetricDict,
    pub pinn: Pinn<B>,
    pub history: Vec<LossRecord>,
    pub stages: usize,
}

/// データを読み込み、PINNを学習します。
///
/// `read_data_fn` は解フィールドの読み込みに1度だけ、`pde_fn` は残差の評価ごとに呼ばれます。
pub fn train<B, R, P>(
    config: &ExperimentConfig,
    read_data_fn: R,
    pde_fn: P,
    device: &B::Device,
) -> Result<TrainOutcome<B>>
where
    B: AutodiffBackend,
    R: FnOnce(&Path) -> Result<DataMap>,
    P: Fn(Outputs<B>, &Coordinate<B>, &ExtraVariables<B>) -> Result<Outputs<B>>,
{
    config.validate()?;
    let mesh = Mesh::from_dataset(&config.data, read_data_fn)?;
    train_on_mesh(config, &mesh, pde_fn, device)
}

/// 読み込み済みの格子でPINNを学習します。
pub fn train_on_mesh<B, P>(
    config: &ExperimentConfig,
    mesh: &Mesh,
    pde_fn: P,
    device: &B::Device,
) -> Result<TrainOutcome<B>>
where
    B: AutodiffBackend,
    P: Fn(Outputs<B>, &Coordinate<B>, &ExtraVariables<B>) -> Result<Outputs<B>>,
{
    // --- データセットの準備 ---
    let problem = DiscreteProblem::from_mesh(mesh, &config.data, &config.net)?;
    let seed = config.data.seed;
    let train0 = problem.snapshot0.sample(config.data.n0, seed)?;
    let train1 = problem.snapshot1.sample(config.data.n1, seed.wrapping_add(1))?;
    let batch0 = SnapshotBatch::<B>::new(&train0, device);
    let batch1 = SnapshotBatch::<B>::new(&train1, device);
    let operator = RungeKuttaOperator::<B>::new(&problem, device);

    // --- モデルとオプティマイザの初期化 ---
    let model_config = ModelConfig::new(problem.stages()).with_hidden(config.net.hidden.clone());
    let mut pinn = Pinn::<B>::new(&model_config, &config.extra, device);
    let mut optim = config.training.optimizer.init();
    let learning_rate = config.training.learning_rate;
    let num_epochs = config.training.num_epochs;

    let mut history = Vec::new();
    let mut final_loss = f64::NAN;
    let training_start = Instant::now();

    log::info!(
        "学習を開始します (KdV方程式・離散時間同定) - 学習点数: {} / {}",
        train0.len(),
        train1.len()
    );

    // --- 学習ループ ---
    for epoch in 1..=num_epochs {
        let (loss_t0, loss_t1) =
            snapshot_losses(&pinn, &problem.domain, &operator, &batch0, &batch1, &pde_fn)?;
        let loss = loss_t0.clone() + loss_t1.clone();

        if epoch % config.training.log_every == 0 || epoch == num_epochs {
            let (l1, l2) = pinn.coefficients()?;
            let record = LossRecord {
                epoch,
                loss: loss.clone().into_scalar().elem::<f64>(),
                loss_t0: loss_t0.into_scalar().elem::<f64>(),
                loss_t1: loss_t1.into_scalar().elem::<f64>(),
                l1,
                l2,
            };
            log::info!(
                "[Epoch {}] Loss: {:.6e} (t0: {:.3e}, t1: {:.3e}), l1: {:.5}, l2: {:.6}",
                epoch,
                record.loss,
                record.loss_t0,
                record.loss_t1,
                l1,
                l2
            );
            final_loss = record.loss;
            history.push(record);
        }

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &pinn);
        pinn = optim.step(learning_rate, pinn, grads);
    }
    log::info!("学習が完了しました。=> 学習時間: {:.2?}", training_start.elapsed());

    let mut metrics = evaluate(&pinn, &problem, &pde_fn, &config.training, device)?;
    metrics.insert("train/loss".to_string(), final_loss);

    Ok(TrainOutcome {
        metrics,
        pinn,
        history,
        stages: problem.stages(),
    })
}

/// `train`サブコマンドを実行します。
///
/// 学習後、設定・モデル・メトリクス・損失履歴と損失グラフを成果物ディレクトリに保存し、
/// 最適化対象のメトリクス値を返します。
pub fn run(config: &ExperimentConfig) -> Result<Option<f64>> {
    let device = Default::default();
    config.log_summary();
    log::info!("バックエンド: NdArray (CPU)");

    let outcome = train::<MyBackend, _, _>(config, read_data_fn, pde_fn::<MyBackend>, &device)?;

    // --- 結果の保存と描画 ---
    let artifact_dir = Path::new(&config.artifact_dir);
    std::fs::create_dir_all(artifact_dir)?;

    config.save(artifact_dir.join(CONFIG_FILENAME))?;
    metrics::save(&outcome.metrics, &artifact_dir.join(METRICS_FILENAME))?;
    std::fs::write(
        artifact_dir.join(HISTORY_FILENAME),
        serde_json::to_string_pretty(&outcome.history)?,
    )?;

    let graph_path = artifact_dir.join(LOSS_GRAPH_FILENAME);
    match plot_loss_history(&outcome.history, &graph_path) {
        Ok(()) => log::info!("=> 損失グラフを '{}' に保存しました。", graph_path.display()),
        Err(e) => log::warn!("グラフの描画に失敗しました: {}", e),
    }

    let model_path = artifact_dir.join(MODEL_FILENAME);
    outcome
        .pinn
        .save_file(
            model_path.clone(),
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        )
        .map_err(PinnError::Record)?;
    log::info!(
        "=> モデルを '{}' に保存しました (段数 {})。",
        model_path.display(),
        outcome.stages
    );

    get_metric_value(&outcome.metrics, &config.optimized_metric)
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(
    history: &[LossRecord],
    path: &Path,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    if history.is_empty() {
        return Ok(());
    }
    let log_losses = |select: fn(&LossRecord) -> f64| -> Vec<(usize, f64)> {
        history
            .iter()
            .map(|r| (r.epoch, select(r).max(f64::MIN_POSITIVE).log10()))
            .collect()
    };
    let total = log_losses(|r| r.loss);
    let at_t0 = log_losses(|r| r.loss_t0);
    let at_t1 = log_losses(|r| r.loss_t1);

    let all = total.iter().chain(&at_t0).chain(&at_t1).map(|&(_, v)| v);
    let max_log_loss = all.clone().fold(f64::NEG_INFINITY, f64::max) + 0.5;
    let min_log_loss = all.fold(f64::INFINITY, f64::min) - 0.5;
    let last_epoch = history.last().map_or(1, |r| r.epoch);

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History (KdV)", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..last_epoch + 1, min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Epochs")
        .draw()?;
    for (series, label, color) in [
        (total, "Total Loss", RED),
        (at_t0, "Snapshot t0", BLUE),
        (at_t1, "Snapshot t1", GREEN),
    ] {
        chart
            .draw_series(LineSeries::new(series, &color))?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
