use crate::config::{ExperimentConfig, TrainingConfig};
use crate::discrete::{DiscreteProblem, RungeKuttaOperator, stage_residuals};
use crate::error::{PinnError, Result};
use crate::jet::Coordinate;
use crate::kdv::{pde_fn, read_data_fn};
use crate::mesh::Mesh;
use crate::metrics::{MetricDict, percent_error, relative_l2_error};
use crate::model::ModelConfig;
use crate::pinn::{ExtraVariables, Outputs, Pinn};
use crate::{CONFIG_FILENAME, MODEL_FILENAME, data};
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::Tensor;
use std::path::Path;
use std::time::Instant;

type MyBackend = NdArray<f32>;

/// 格子全体でモデルを評価します。
///
/// 2つ目のスナップショットの全点で各段の値を `t1` へ進め、段ごとの平均を厳密解と比べます。
/// 同定した係数と、設定に真の値があればその百分率誤差も含めます。
pub fn evaluate<B, P>(
    pinn: &Pinn<B>,
    problem: &DiscreteProblem,
    pde_fn: &P,
    training: &TrainingConfig,
    device: &B::Device,
) -> Result<MetricDict>
where
    B: Backend,
    P: Fn(Outputs<B>, &Coordinate<B>, &ExtraVariables<B>) -> Result<Outputs<B>>,
{
    let snapshot = &problem.snapshot1;
    let operator = RungeKuttaOperator::<B>::new(problem, device);
    let x = Tensor::<B, 1>::from_floats(snapshot.x.as_slice(), device).reshape([snapshot.len(), 1]);
    let (u, f) = stage_residuals(pinn, &problem.domain, &x, pde_fn)?;
    let u1: Tensor<B, 2> = operator.to_t1(u, f).mean_dim(1);
    let u1 = data::to_vec(&u1.into_data().convert::<f32>())?;

    let (l1, l2) = pinn.coefficients()?;
    let mut metrics = MetricDict::new();
    metrics.insert("val/error_u".to_string(), relative_l2_error(&u1, &snapshot.u));
    metrics.insert("val/l1".to_string(), l1);
    metrics.insert("val/l2".to_string(), l2);
    if let Some(truth) = training.true_l1 {
        metrics.insert("val/error_l1".to_string(), percent_error(l1, truth));
    }
    if let Some(truth) = training.true_l2 {
        metrics.insert("val/error_l2".to_string(), percent_error(l2, truth));
    }
    Ok(metrics)
}

/// `infer`サブコマンドを実行します。
///
/// 成果物ディレクトリから設定と学習済みモデルを読み込み、格子全体で評価します。
pub fn run(artifact_dir: &str) -> Result<MetricDict> {
    let device = Default::default();
    let artifact_dir = Path::new(artifact_dir);
    let model_path = artifact_dir.join(MODEL_FILENAME);
    let config_path = artifact_dir.join(CONFIG_FILENAME);

    if !model_path.exists() {
        return Err(PinnError::Config(format!(
            "モデルファイル '{}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。",
            model_path.display()
        )));
    }

    log::info!("推論を実行します - バックエンド: NdArray (CPU)");
    let inference_start = Instant::now();

    let config = ExperimentConfig::load(&config_path).map_err(|e| {
        PinnError::Config(format!("'{}' を読み込めません: {:?}", config_path.display(), e))
    })?;
    let data = &config.data;
    let mesh = Mesh::from_dataset(data, read_data_fn)?;
    let problem = DiscreteProblem::from_mesh(&mesh, data, &config.net)?;

    log::info!("保存済みモデルを '{}' からロード中...", model_path.display());
    let model_config = ModelConfig::new(problem.stages()).with_hidden(config.net.hidden.clone());
    let pinn = Pinn::<MyBackend>::new(&model_config, &config.extra, &device).load_file(
        model_path,
        &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
        &device,
    )?;

    let metrics = evaluate(
        &pinn,
        &problem,
        &pde_fn::<MyBackend>,
        &config.training,
        &device,
    )?;
    log::info!(
        "推論が完了しました。評価点数: {}, 段数: {}",
        problem.snapshot1.len(),
        problem.stages()
    );
    log::info!("=> 推論時間: {:.2?}", inference_start.elapsed());
    Ok(metrics)
}
