//! pipeline.kdl の設定モデル

use gopipeline_core::{BuildOptions, GoPipeline, Secret};

/// pipeline.kdl の内容（未指定の項目は `None`）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    pub build_image: Option<String>,
    pub run_image: Option<String>,
    pub port: Option<u16>,
    pub registry: Option<RegistryConfig>,
}

/// レジストリ認証の設定（ユーザー名・パスワードはシークレット参照）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub host: String,
    pub username: Secret,
    pub password: Secret,
}

impl PipelineConfig {
    /// 未指定の項目をデフォルト値で埋めたビルドオプション
    pub fn build_options(&self) -> BuildOptions {
        let defaults = BuildOptions::default();
        BuildOptions {
            build_image: self.build_image.clone().unwrap_or(defaults.build_image),
            run_image: self.run_image.clone().unwrap_or(defaults.run_image),
            port: self.port.unwrap_or(defaults.port),
        }
    }

    /// 設定を反映したパイプライン
    pub fn pipeline(&self) -> GoPipeline {
        match &self.registry {
            Some(registry) => GoPipeline::new().with_registry(
                &registry.host,
                registry.username.clone(),
                registry.password.clone(),
            ),
            None => GoPipeline::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_options_defaults() {
        let options = PipelineConfig::default().build_options();
        assert_eq!(options, BuildOptions::default());
    }

    #[test]
    fn test_build_options_partial_override() {
        let config = PipelineConfig {
            run_image: Some("debian:bookworm-slim".to_string()),
            port: Some(9000),
            ..Default::default()
        };
        let options = config.build_options();
        assert_eq!(options.build_image, "golang:1.22.1");
        assert_eq!(options.run_image, "debian:bookworm-slim");
        assert_eq!(options.port, 9000);
    }

    #[test]
    fn test_pipeline_with_registry() {
        let config = PipelineConfig {
            registry: Some(RegistryConfig {
                host: "ghcr.io".to_string(),
                username: Secret::env("REGISTRY_USER"),
                password: Secret::env("REGISTRY_TOKEN"),
            }),
            ..Default::default()
        };
        let pipeline = config.pipeline();
        assert!(pipeline.is_authenticated());
        assert_eq!(pipeline.registry_host(), Some("ghcr.io"));

        assert!(!PipelineConfig::default().pipeline().is_authenticated());
    }
}
