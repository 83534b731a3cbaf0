use std::path::PathBuf;

/// クレート全体で使用するエラー型。
///
/// 呼び出し側へそのまま伝播させ、この層では再試行や回復は行いません。
#[derive(Debug, thiserror::Error)]
pub enum PinnError {
    /// データファイルが存在しない
    #[error("データファイルが見つかりません: {}", path.display())]
    DataNotFound { path: PathBuf },

    /// 期待するフィールドが無い、数値でない、または形状が不正
    #[error("データ形式が不正です: {0}")]
    DataFormat(String),

    /// 微分を要求された入力が微分可能でない
    #[error("微分できない入力です: {0}")]
    NonDifferentiableInput(String),

    #[error("出力フィールド '{0}' がありません")]
    MissingOutput(String),

    #[error("未知の追加変数です: '{0}'")]
    UnknownVariable(String),

    #[error("メトリクス '{0}' が見つかりません")]
    MetricNotFound(String),

    #[error("設定が不正です: {0}")]
    Config(String),

    #[error("モデルの保存・読み込みに失敗しました: {0}")]
    Record(#[from] burn::record::RecorderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = PinnError> = std::result::Result<T, E>;
