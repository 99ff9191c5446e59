use crate::error::{BuildError, BuildResult};
use crate::progress::BuildProgress;
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::StreamExt;
use http_body_util::{Either, Full};

pub struct ImageBuilder {
    docker: Docker,
}

impl ImageBuilder {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// イメージをビルド
    pub async fn build_image(
        &self,
        context_data: Vec<u8>,
        tag: &str,
        no_cache: bool,
        progress: &BuildProgress,
    ) -> BuildResult<()> {
        tracing::info!("Building image: {}", tag);

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag,
            nocache: no_cache,
            rm: true,      // 中間コンテナを削除
            forcerm: true, // ビルド失敗時も中間コンテナを削除
            pull: true,    // ベースイメージを常にpull
            ..Default::default()
        };

        let body = Full::new(Bytes::from(context_data));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            let result = match msg {
                Ok(output) => Self::handle_build_output(output, progress),
                Err(e) => Err(BuildError::DockerConnection(e)),
            };
            if let Err(e) = result {
                progress.finish_error(&e.to_string());
                return Err(e);
            }
        }

        progress.finish_success();
        tracing::info!("Successfully built: {}", tag);
        Ok(())
    }

    /// ビルド出力の処理
    fn handle_build_output(
        output: bollard::models::BuildInfo,
        progress: &BuildProgress,
    ) -> BuildResult<()> {
        if let Some(stream) = output.stream {
            let line = stream.trim();
            if !line.is_empty() {
                tracing::debug!("{}", line);
                if line.starts_with("Step ") {
                    progress.set_message(line);
                }
            }
        }

        if let Some(error_detail) = output.error_detail {
            let error_msg = error_detail
                .message
                .or(output.error)
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(BuildError::BuildFailed(error_msg));
        }

        if let Some(error) = output.error {
            return Err(BuildError::BuildFailed(error));
        }

        if let Some(status) = output.status {
            progress.set_message(&status);
        }

        Ok(())
    }

    /// イメージの存在確認
    pub async fn image_exists(&self, image_tag: &str) -> BuildResult<bool> {
        match self.docker.inspect_image(image_tag).await {
            Ok(_) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(BuildError::DockerConnection(e)),
        }
    }
}
