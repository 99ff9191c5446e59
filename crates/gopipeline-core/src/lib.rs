//! GoPipeline core
//!
//! Goプログラムのソースディレクトリから実行用コンテナを組み立てるパイプラインと、
//! そのパイプラインが返すコンテナ記述子を提供します。
//!
//! 記述子は遅延評価です。実際のビルドとプッシュは `gopipeline-build` の
//! エンジンが行います。

pub mod container;
pub mod error;
pub mod pipeline;
pub mod secret;

pub use container::{Container, Directory, File, Operation, RegistryAuth};
pub use error::{PipelineError, Result};
pub use pipeline::{
    BuildOptions, DEFAULT_BUILD_IMAGE, DEFAULT_PORT, DEFAULT_RUN_IMAGE, GoPipeline, SOURCE_PATH,
    binary_path, entrypoint_path,
};
pub use secret::{Secret, SecretError};
