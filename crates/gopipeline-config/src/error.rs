use gopipeline_core::SecretError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません。以下の場所を確認してください:\n\
        - カレントディレクトリ: pipeline.local.kdl, pipeline.kdl\n\
        - ./.gopipeline/ ディレクトリ\n\
        - ~/.config/gopipeline/pipeline.kdl\n\
        または GOPIPELINE_CONFIG 環境変数で直接指定できます"
    )]
    ConfigFileNotFound,

    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("シークレット参照が不正です ({field}): {source}")]
    InvalidSecret {
        field: String,
        #[source]
        source: SecretError,
    },

    #[error("ファイル読み込みエラー: {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
