mod build;
mod docker;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gopipe")]
#[command(about = "Goプログラムを実行用コンテナイメージにビルドする", long_about = None)]
struct Cli {
    /// 設定ファイル (pipeline.kdl) のパス
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Goプログラムをビルドしてコンテナイメージを作成
    Build(build::BuildArgs),
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli.command {
        Commands::Version => {
            println!("gopipeline {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Build(args) => {
            let config = match &cli.config {
                Some(path) => {
                    tracing::debug!("Loading config from {}", path.display());
                    gopipeline_config::load_config(path)?
                }
                None => gopipeline_config::load_or_default()?,
            };
            build::handle_build_command(&args, &config).await
        }
    }
}
