use gopipeline_core::SecretError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Build context directory not found: {0}")]
    ContextNotFound(PathBuf),

    #[error("Container has no base image")]
    MissingBaseImage,

    #[error("Docker connection error: {0}")]
    DockerConnection(#[from] bollard::errors::Error),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid build configuration: {0}")]
    InvalidConfig(String),

    #[error("Registry auth failed for {registry}: {message}")]
    AuthFailed { registry: String, message: String },

    #[error("Registry secret could not be resolved: {0}")]
    Secret(#[from] SecretError),

    #[error("Push failed: {message}")]
    PushFailed { message: String },

    #[error("Invalid tag: {tag}")]
    InvalidTag { tag: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            BuildError::ContextNotFound(path) => {
                format!(
                    "ソースディレクトリが見つかりません: {}\n\
                     \n\
                     ビルド対象のパスを確認してください。",
                    path.display()
                )
            }
            BuildError::BuildFailed(msg) => {
                format!(
                    "ビルドに失敗しました: {}\n\
                     \n\
                     go build の出力とベースイメージ名を確認してください。",
                    msg
                )
            }
            BuildError::Secret(err) => {
                format!(
                    "レジストリのパスワードを解決できません: {}\n\
                     \n\
                     シークレット参照 (env:/file:/op://) を確認してください。",
                    err
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type BuildResult<T> = std::result::Result<T, BuildError>;
