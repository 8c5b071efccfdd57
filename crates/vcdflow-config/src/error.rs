use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "マニフェストが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: vcd.local.yaml, vcd.yaml\n\
        - ./.vcdflow/vcd.yaml\n\
        - ~/.config/vcdflow/vcd.yaml\n\
        または VCD_CONFIG_PATH 環境変数で直接指定できます"
    )]
    ManifestNotFound,

    #[error("プロバイダ設定が不足しています: {}", .0.join(", "))]
    MissingSettings(Vec<&'static str>),

    #[error("環境変数 {name} の値が不正です: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("プロバイダ設定が不正です: {0}")]
    Invalid(#[from] vcdflow_cloud::CloudError),

    #[error("YAML パースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
