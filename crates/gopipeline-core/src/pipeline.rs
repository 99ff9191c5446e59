//! Goプログラム用のビルドパイプライン
//!
//! ビルドステージでソースをコンパイルし、ランステージにバイナリだけをコピーした
//! コンテナ記述子を返します。レジストリ認証が設定されていれば、ランステージに付与します。

use crate::container::{Container, Directory};
use crate::error::{PipelineError, Result};
use crate::secret::Secret;
use tracing::{debug, info};

pub const DEFAULT_BUILD_IMAGE: &str = "golang:1.22.1";
pub const DEFAULT_RUN_IMAGE: &str = "alpine:latest";
pub const DEFAULT_PORT: u16 = 3000;

/// ビルドステージでソースを配置するパス
pub const SOURCE_PATH: &str = "/src";

/// ビルドステージ内のバイナリのパス (`/src/<name>`)
pub fn binary_path(name: &str) -> String {
    format!("{}/{}", SOURCE_PATH, name)
}

/// ランステージのエントリポイント (`/<name>`)
pub fn entrypoint_path(name: &str) -> String {
    format!("/{}", name)
}

/// ビルドオプション
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub build_image: String,
    pub run_image: String,
    pub port: u16,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            build_image: DEFAULT_BUILD_IMAGE.to_string(),
            run_image: DEFAULT_RUN_IMAGE.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone)]
struct RegistryConfig {
    host: String,
    username: Secret,
    password: Secret,
}

/// パイプラインの設定
///
/// レジストリ認証は [`GoPipeline::with_registry`] で一度に設定され、解除はできません。
#[derive(Debug, Clone, Default)]
pub struct GoPipeline {
    registry: Option<RegistryConfig>,
}

impl GoPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// レジストリ認証を設定
    pub fn with_registry(mut self, host: impl Into<String>, username: Secret, password: Secret) -> Self {
        self.registry = Some(RegistryConfig {
            host: host.into(),
            username,
            password,
        });
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.registry.is_some()
    }

    pub fn registry_host(&self) -> Option<&str> {
        self.registry.as_ref().map(|r| r.host.as_str())
    }

    /// `source` のGoプログラムをビルドし、実行用コンテナを返す
    ///
    /// イメージの取得やコンパイルの失敗はエンジンが具体化する時点で発生します。
    /// ここで返るエラーはレジストリのユーザー名が解決できなかった場合のみです。
    pub async fn build(
        &self,
        name: &str,
        source: Directory,
        options: &BuildOptions,
    ) -> Result<Container> {
        let bin_file = binary_path(name);
        let entrypoint = entrypoint_path(name);

        info!(
            name = %name,
            build_image = %options.build_image,
            run_image = %options.run_image,
            port = options.port,
            "Assembling Go pipeline"
        );

        let build = Container::new()
            .from(&options.build_image)
            .with_directory(SOURCE_PATH, source)
            .with_workdir(SOURCE_PATH)
            .with_env_variable("CGO_ENABLED", "0")
            .with_exec(["go", "build", "-o", bin_file.as_str()]);

        let mut run = Container::new()
            .from(&options.run_image)
            .with_file(&entrypoint, build.file(&bin_file))
            .with_entrypoint([entrypoint.as_str()])
            .with_exposed_port(options.port);

        if let Some(registry) = &self.registry {
            let username = registry
                .username
                .plaintext()
                .await
                .map_err(PipelineError::RegistryUsername)?;
            debug!(host = %registry.host, "Attaching registry auth");
            run = run.with_registry_auth(&registry.host, username, registry.password.clone());
        }

        Ok(run)
    }
}
