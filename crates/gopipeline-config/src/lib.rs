//! GoPipeline configuration
//!
//! `pipeline.kdl` の探索と読み込みを行います。

pub mod error;
pub mod model;
pub mod parser;

pub use error::*;
pub use model::{PipelineConfig, RegistryConfig};
pub use parser::{load_config, parse_config};

use std::path::PathBuf;

const CANDIDATES: [&str; 2] = ["pipeline.local.kdl", "pipeline.kdl"];

/// GoPipelineのグローバル設定ディレクトリ
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("gopipeline");
    Ok(config_dir)
}

/// pipeline.kdl を探す
///
/// 以下の優先順位で設定ファイルを検索:
/// 1. 環境変数 GOPIPELINE_CONFIG (直接パス指定)
/// 2. カレントディレクトリ: pipeline.local.kdl, pipeline.kdl
/// 3. ./.gopipeline/ ディレクトリ内: 同様の順序
/// 4. ~/.config/gopipeline/pipeline.kdl (グローバル設定)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var("GOPIPELINE_CONFIG") {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let local_dir = current_dir.join(".gopipeline");
    if local_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = local_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Ok(config_dir) = get_config_dir() {
        let global_config = config_dir.join("pipeline.kdl");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// 設定ファイルを探して読み込む（見つからなければデフォルト）
pub fn load_or_default() -> Result<PipelineConfig> {
    match find_config_file() {
        Ok(path) => load_config(&path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No pipeline.kdl found, using defaults");
            Ok(PipelineConfig::default())
        }
        Err(e) => Err(e),
    }
}
