//! pipeline.kdl のパース

use crate::error::{ConfigError, Result};
use crate::model::{PipelineConfig, RegistryConfig};
use gopipeline_core::Secret;
use kdl::{KdlDocument, KdlNode};
use std::path::Path;

/// ファイルから設定を読み込み
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Loading pipeline config: {}", path.display());
    parse_config(&content)
}

/// KDL文字列をパース
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let doc: KdlDocument = content.parse()?;
    let mut config = PipelineConfig::default();

    for node in doc.nodes() {
        match node.name().value() {
            "build-image" => config.build_image = Some(first_string(node)?),
            "run-image" => config.run_image = Some(first_string(node)?),
            "port" => config.port = Some(parse_port(node)?),
            "registry" => config.registry = Some(parse_registry(node)?),
            other => {
                tracing::debug!("Ignoring unknown node: {}", other);
            }
        }
    }

    Ok(config)
}

fn first_string(node: &KdlNode) -> Result<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            ConfigError::InvalidConfig(format!("{} requires a string value", node.name().value()))
        })
}

fn parse_port(node: &KdlNode) -> Result<u16> {
    let value = node
        .entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::InvalidConfig("port requires an integer value".to_string()))?;

    u16::try_from(value)
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(|| ConfigError::InvalidConfig(format!("port out of range: {}", value)))
}

/// registry "host" { username "..."; password "..." }
fn parse_registry(node: &KdlNode) -> Result<RegistryConfig> {
    let host = first_string(node)?;

    let mut username = None;
    let mut password = None;
    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "username" => username = Some(parse_secret(child)?),
                "password" => password = Some(parse_secret(child)?),
                _ => {}
            }
        }
    }

    match (username, password) {
        (Some(username), Some(password)) => Ok(RegistryConfig {
            host,
            username,
            password,
        }),
        _ => Err(ConfigError::InvalidConfig(format!(
            "registry \"{}\" requires both username and password",
            host
        ))),
    }
}

fn parse_secret(node: &KdlNode) -> Result<Secret> {
    let field = node.name().value().to_string();
    let reference = first_string(node)?;
    reference
        .parse()
        .map_err(|source| ConfigError::InvalidSecret { field, source })
}
