use crate::error::{BuildError, BuildResult};
use crate::plan::DockerfilePlan;
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::Builder;

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// 各ディレクトリをスロット名の下に、展開したDockerfileを "Dockerfile" として格納します。
    pub fn create_context(plan: &DockerfilePlan) -> BuildResult<Vec<u8>> {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            for dir in plan.directories() {
                if !dir.source.exists() {
                    return Err(BuildError::ContextNotFound(dir.source.clone()));
                }
                if !dir.source.is_dir() {
                    return Err(BuildError::InvalidConfig(format!(
                        "Build context is not a directory: {}",
                        dir.source.display()
                    )));
                }

                tracing::debug!("Adding {} as {}", dir.source.display(), dir.slot);
                tar.append_dir_all(&dir.slot, &dir.source)?;
            }

            let dockerfile = plan.dockerfile().as_bytes();
            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile").map_err(|e| {
                BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, dockerfile)?;

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "Build context is large ({}MB); consider trimming the source directory",
                size / 1024 / 1024
            );
        }
    }
}
