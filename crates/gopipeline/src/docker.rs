use colored::Colorize;
use gopipeline_build::DockerEngine;

/// Docker接続を初期化（エラーハンドリング付き）
pub async fn init_engine_with_error_handling(no_cache: bool) -> anyhow::Result<DockerEngine> {
    match DockerEngine::connect().await {
        Ok(engine) => Ok(engine.with_no_cache(no_cache)),
        Err(e) => {
            tracing::debug!("Docker connection failed: {:?}", e);
            eprintln!();
            eprintln!("{}", "✗ Docker接続エラー".red().bold());
            eprintln!();
            eprintln!("{}", "原因:".yellow());
            eprintln!("  {}", e);
            eprintln!();
            eprintln!("{}", "解決方法:".yellow());
            eprintln!("  • Dockerが起動しているか確認してください");
            eprintln!("  • DOCKER_HOST が正しいか確認してください");
            eprintln!("  • docker ps コマンドが正常に動作するか確認してください");
            Err(anyhow::anyhow!("Docker接続に失敗しました"))
        }
    }
}
