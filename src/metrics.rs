use crate::error::{PinnError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// メトリクス名から値への対応。
pub type MetricDict = BTreeMap<String, f64>;

/// ハイパーパラメータ最適化のために、指定されたメトリクスの値を取り出します。
///
/// 名前が空なら `None`、存在しない名前があればエラー、複数あれば合計を返します。
pub fn get_metric_value(metric_dict: &MetricDict, metric_names: &[String]) -> Result<Option<f64>> {
    if metric_names.is_empty() {
        log::info!("メトリクス名が指定されていないため、値の取得を省略します");
        return Ok(None);
    }
    let mut total = 0.0;
    for name in metric_names {
        let value = metric_dict
            .get(name)
            .ok_or_else(|| PinnError::MetricNotFound(name.clone()))?;
        log::info!("メトリクス {name}: {value}");
        total += value;
    }
    Ok(Some(total))
}

/// 相対L2誤差 `||pred - exact|| / ||exact||`。
pub fn relative_l2_error(pred: &[f32], exact: &[f32]) -> f64 {
    let (num, den) = pred
        .iter()
        .zip(exact)
        .fold((0.0f64, 0.0f64), |(num, den), (&p, &e)| {
            let d = (p - e) as f64;
            (num + d * d, den + (e as f64) * (e as f64))
        });
    if den == 0.0 {
        num.sqrt()
    } else {
        (num / den).sqrt()
    }
}

/// 真の値に対する百分率誤差。
pub fn percent_error(value: f64, truth: f64) -> f64 {
    100.0 * (value - truth).abs() / truth.abs()
}

/// メトリクスをJSONファイルに書き出します。
pub fn save(metric_dict: &MetricDict, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(metric_dict)?;
    std::fs::write(path, json)?;
    Ok(())
}
