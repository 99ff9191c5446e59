//! コンテナ記述子からDockerfileへの展開
//!
//! `File` で参照される他のコンテナは名前付きステージ (`stage0`, `stage1`, ...) として
//! 使用箇所より前に出力します。ホストのディレクトリはビルドコンテキスト内の
//! スロット (`ctx0`, `ctx1`, ...) に割り当て、`COPY` で配置します。

use crate::error::{BuildError, BuildResult};
use gopipeline_core::{Container, Operation};
use std::fmt::Write;
use std::path::PathBuf;

/// ビルドコンテキストに含めるホストのディレクトリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDirectory {
    pub slot: String,
    pub source: PathBuf,
}

#[derive(Debug, Clone)]
pub struct DockerfilePlan {
    dockerfile: String,
    directories: Vec<ContextDirectory>,
}

impl DockerfilePlan {
    /// 記述子を展開
    pub fn render(container: &Container) -> BuildResult<Self> {
        let mut renderer = Renderer::default();
        renderer.render_stage(container, None)?;

        tracing::debug!(
            "Rendered Dockerfile: {} stages, {} context directories",
            renderer.stages + 1,
            renderer.directories.len()
        );

        Ok(Self {
            dockerfile: renderer.out,
            directories: renderer.directories,
        })
    }

    pub fn dockerfile(&self) -> &str {
        &self.dockerfile
    }

    pub fn directories(&self) -> &[ContextDirectory] {
        &self.directories
    }
}

#[derive(Default)]
struct Renderer {
    out: String,
    stages: usize,
    directories: Vec<ContextDirectory>,
}

impl Renderer {
    fn render_stage(&mut self, container: &Container, alias: Option<&str>) -> BuildResult<()> {
        // 依存ステージを先に出力
        let mut sources = Vec::new();
        for op in container.operations() {
            if let Operation::File { source, .. } = op {
                let name = format!("stage{}", self.stages);
                self.stages += 1;
                self.render_stage(source.container(), Some(&name))?;
                sources.push(name);
            }
        }
        let mut sources = sources.into_iter();

        let image = container.image_ref().ok_or(BuildError::MissingBaseImage)?;
        let from = match alias {
            Some(alias) => format!("FROM {} AS {}", image, alias),
            None => format!("FROM {}", image),
        };
        writeln!(self.out, "{}", from).map_err(fmt_error)?;

        for op in container.operations() {
            let line = match op {
                Operation::Directory { path, source } => {
                    let slot = self.slot_for(source.path().to_path_buf());
                    format!("COPY {}", copy_args(&[format!("{}/", slot), path.clone()]))
                }
                Operation::Workdir(path) => format!("WORKDIR {}", escape_word(path)),
                Operation::EnvVariable { name, value } => {
                    format!("ENV {}={}", name, env_value(value))
                }
                Operation::Exec(args) => format!("RUN {}", json_array(args)),
                Operation::File { path, source } => {
                    let stage = sources.next().ok_or_else(|| {
                        BuildError::InvalidConfig("file source stage missing".to_string())
                    })?;
                    format!(
                        "COPY --from={} {}",
                        stage,
                        copy_args(&[source.path().to_string(), path.clone()])
                    )
                }
            };
            writeln!(self.out, "{}", line).map_err(fmt_error)?;
        }

        if !container.entrypoint().is_empty() {
            writeln!(self.out, "ENTRYPOINT {}", json_array(container.entrypoint()))
                .map_err(fmt_error)?;
        }
        for port in container.exposed_ports() {
            writeln!(self.out, "EXPOSE {}/tcp", port).map_err(fmt_error)?;
        }
        if alias.is_some() {
            self.out.push('\n');
        }

        Ok(())
    }

    /// 同じディレクトリは同じスロットを再利用
    fn slot_for(&mut self, source: PathBuf) -> String {
        if let Some(existing) = self.directories.iter().find(|d| d.source == source) {
            return existing.slot.clone();
        }
        let slot = format!("ctx{}", self.directories.len());
        self.directories.push(ContextDirectory {
            slot: slot.clone(),
            source,
        });
        slot
    }
}

fn json_array(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// `COPY` / `WORKDIR` は `$VAR` を展開するため、値をそのまま渡すようエスケープ
fn escape_word(value: &str) -> String {
    value.replace('\\', "\\\\").replace('$', "\\$")
}

/// `COPY` の JSON 形式の引数（展開はJSONのデコード後に行われる）
fn copy_args(items: &[String]) -> String {
    let escaped: Vec<String> = items.iter().map(|item| escape_word(item)).collect();
    json_array(&escaped)
}

/// `ENV` のダブルクォート値。`\` と `"` は JSON のエスケープで足りるので `$` のみ追加
fn env_value(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| format!("\"{}\"", value))
        .replace('$', "\\$")
}

fn fmt_error(e: std::fmt::Error) -> BuildError {
    BuildError::InvalidConfig(format!("failed to render Dockerfile: {}", e))
}
