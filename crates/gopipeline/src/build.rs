use crate::docker;
use clap::Args;
use colored::Colorize;
use gopipeline_build::DockerfilePlan;
use gopipeline_config::PipelineConfig;
use gopipeline_core::{BuildOptions, Directory, GoPipeline, Secret};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// プログラム名（バイナリ名とエントリポイントに使用）
    pub name: String,

    /// Goソースのディレクトリ
    #[arg(default_value = ".")]
    pub source: PathBuf,

    /// ビルドステージのイメージ（デフォルト: golang:1.22.1）
    #[arg(long)]
    pub build_image: Option<String>,

    /// ランステージのイメージ（デフォルト: alpine:latest）
    #[arg(long)]
    pub run_image: Option<String>,

    /// 公開するポート（デフォルト: 3000）
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// ローカルイメージのタグ（デフォルト: <NAME>:latest）
    #[arg(short, long)]
    pub tag: Option<String>,

    /// ビルド後にプッシュするイメージ名（例: ghcr.io/org/app:v1）
    #[arg(long, value_name = "ADDRESS")]
    pub publish: Option<String>,

    /// キャッシュを使用しない
    #[arg(long)]
    pub no_cache: bool,

    /// Dockerに接続せず、生成されるDockerfileを表示
    #[arg(long)]
    pub dry_run: bool,

    /// レジストリのホスト名
    #[arg(
        long,
        env = "GOPIPE_REGISTRY_HOST",
        requires_all = ["registry_username", "registry_password"]
    )]
    pub registry_host: Option<String>,

    /// レジストリのユーザー名（env:NAME, file:PATH, op://...）
    #[arg(long, env = "GOPIPE_REGISTRY_USERNAME", value_name = "SECRET", requires = "registry_host")]
    pub registry_username: Option<Secret>,

    /// レジストリのパスワード（env:NAME, file:PATH, op://...）
    #[arg(long, env = "GOPIPE_REGISTRY_PASSWORD", value_name = "SECRET", requires = "registry_host")]
    pub registry_password: Option<Secret>,
}

/// CLI > pipeline.kdl > デフォルト の順で解決したビルドオプション
fn resolve_options(args: &BuildArgs, config: &PipelineConfig) -> BuildOptions {
    let base = config.build_options();
    BuildOptions {
        build_image: args.build_image.clone().unwrap_or(base.build_image),
        run_image: args.run_image.clone().unwrap_or(base.run_image),
        port: args.port.unwrap_or(base.port),
    }
}

fn resolve_pipeline(args: &BuildArgs, config: &PipelineConfig) -> GoPipeline {
    match (
        &args.registry_host,
        &args.registry_username,
        &args.registry_password,
    ) {
        (Some(host), Some(username), Some(password)) => {
            GoPipeline::new().with_registry(host, username.clone(), password.clone())
        }
        _ => config.pipeline(),
    }
}

/// ビルドコマンドを処理
pub async fn handle_build_command(args: &BuildArgs, config: &PipelineConfig) -> anyhow::Result<()> {
    let options = resolve_options(args, config);
    let pipeline = resolve_pipeline(args, config);
    tracing::debug!(
        "Resolved build options: build_image={}, run_image={}, port={}, registry={}",
        options.build_image,
        options.run_image,
        options.port,
        pipeline.registry_host().unwrap_or("(none)")
    );

    let run = pipeline
        .build(&args.name, Directory::new(&args.source), &options)
        .await?;

    if args.dry_run {
        let plan = DockerfilePlan::render(&run)?;
        print!("{}", plan.dockerfile());
        return Ok(());
    }

    println!("{}", "Goプログラムをビルド中...".green());
    println!("  → Name: {}", args.name.cyan());
    println!("  → Source: {}", args.source.display().to_string().cyan());
    println!("  → Build image: {}", options.build_image.cyan());
    println!("  → Run image: {}", options.run_image.cyan());
    println!("  → Port: {}", options.port.to_string().cyan());
    if let Some(host) = pipeline.registry_host() {
        println!("  → Registry: {}", host.cyan());
    }

    let engine = docker::init_engine_with_error_handling(args.no_cache).await?;

    let result = match &args.publish {
        Some(address) => engine.publish(&run, address).await,
        None => {
            let tag = args
                .tag
                .clone()
                .unwrap_or_else(|| format!("{}:latest", args.name));
            engine.build(&run, &tag).await
        }
    };

    match result {
        Ok(image) => {
            println!();
            println!("{} {}", "✓".green().bold(), image.cyan());
            Ok(())
        }
        Err(e) => {
            eprintln!("  {} {}", "✗".red().bold(), e.user_message());
            Err(anyhow::anyhow!("ビルドに失敗しました"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use gopipeline_config::RegistryConfig;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BuildArgs,
    }

    fn parse(argv: &[&str]) -> BuildArgs {
        TestCli::parse_from(std::iter::once("gopipe").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_resolve_options_cli_over_config() {
        let config = PipelineConfig {
            build_image: Some("golang:1.23".to_string()),
            run_image: Some("debian:bookworm-slim".to_string()),
            port: Some(9000),
            registry: None,
        };
        let args = parse(&["svc", "--run-image", "alpine:3.20"]);

        let options = resolve_options(&args, &config);
        assert_eq!(options.build_image, "golang:1.23");
        assert_eq!(options.run_image, "alpine:3.20");
        assert_eq!(options.port, 9000);
    }

    #[test]
    fn test_resolve_options_defaults() {
        let args = parse(&["svc"]);
        let options = resolve_options(&args, &PipelineConfig::default());
        assert_eq!(options, BuildOptions::default());
        assert_eq!(args.source, PathBuf::from("."));
    }

    #[test]
    fn test_resolve_pipeline_cli_over_config() {
        let config = PipelineConfig {
            registry: Some(RegistryConfig {
                host: "ghcr.io".to_string(),
                username: Secret::env("A"),
                password: Secret::env("B"),
            }),
            ..Default::default()
        };
        let args = parse(&[
            "svc",
            "--registry-host",
            "registry.example.com",
            "--registry-username",
            "env:USER_REF",
            "--registry-password",
            "file:/run/secrets/pw",
        ]);

        let pipeline = resolve_pipeline(&args, &config);
        assert_eq!(pipeline.registry_host(), Some("registry.example.com"));

        let from_config = resolve_pipeline(&parse(&["svc"]), &config);
        assert_eq!(from_config.registry_host(), Some("ghcr.io"));
    }
}
