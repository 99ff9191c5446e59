//! Docker Engine によるコンテナ記述子の具体化

use crate::builder::ImageBuilder;
use crate::context::ContextBuilder;
use crate::error::BuildResult;
use crate::plan::DockerfilePlan;
use crate::progress::BuildProgress;
use crate::pusher::{ImagePusher, split_image_tag, validate_tag};
use bollard::Docker;
use gopipeline_core::Container;

pub struct DockerEngine {
    docker: Docker,
    no_cache: bool,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            no_cache: false,
        }
    }

    /// ローカルのDockerに接続し、疎通を確認
    pub async fn connect() -> BuildResult<Self> {
        let docker = Docker::connect_with_local_defaults()?;
        docker.ping().await?;
        Ok(Self::new(docker))
    }

    pub fn with_no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// コンテナをビルドして `tag` を付ける
    pub async fn build(&self, container: &Container, tag: &str) -> BuildResult<String> {
        let plan = DockerfilePlan::render(container)?;
        tracing::debug!("Dockerfile for {}:\n{}", tag, plan.dockerfile());

        let context = ContextBuilder::create_context(&plan)?;
        let progress = BuildProgress::new(tag);
        ImageBuilder::new(self.docker.clone())
            .build_image(context, tag, self.no_cache, &progress)
            .await?;

        Ok(tag.to_string())
    }

    /// コンテナをビルドし、`address` にプッシュ
    ///
    /// 返り値はプッシュしたイメージの完全な名前。タグが不正な場合はビルド前に失敗します。
    pub async fn publish(&self, container: &Container, address: &str) -> BuildResult<String> {
        let (image, tag) = split_image_tag(address);
        validate_tag(&tag)?;
        let full_image = format!("{}:{}", image, tag);

        self.build(container, &full_image).await?;
        ImagePusher::new(self.docker.clone())
            .push(container, &image, &tag)
            .await
    }
}
