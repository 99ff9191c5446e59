//! レジストリ認証処理
//!
//! イメージ名からレジストリを判定し、Docker config.json の認証情報を
//! Bollard の DockerCredentials に変換します。
//! コンテナに付与された認証がない場合のフォールバックとして使います。

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use bollard::auth::DockerCredentials;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const DOCKER_HUB: &str = "docker.io";

/// イメージ名からレジストリを抽出
///
/// # Examples
/// - `ghcr.io/org/app:tag` -> `ghcr.io`
/// - `myuser/app:tag` -> `docker.io`
/// - `localhost:5000/app` -> `localhost:5000`
pub fn extract_registry(image: &str) -> String {
    if let Some((first, _)) = image.split_once('/')
        && (first.contains('.') || first.contains(':') || first == "localhost")
    {
        return first.to_string();
    }
    DOCKER_HUB.to_string()
}

/// 認証のアドレスとレジストリが同じものを指すか
///
/// `https://index.docker.io/v1/` のような表記揺れを吸収します。
pub fn registry_matches(address: &str, registry: &str) -> bool {
    normalize_registry(address) == normalize_registry(registry)
}

fn normalize_registry(address: &str) -> String {
    let host = address
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host).to_ascii_lowercase();
    match host.as_str() {
        "index.docker.io" | "registry-1.docker.io" | "registry.hub.docker.com" => {
            DOCKER_HUB.to_string()
        }
        _ => host,
    }
}

/// Docker config.json の構造
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DockerConfig {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
    /// credential helper 名 (例: "osxkeychain", "desktop")
    #[serde(default)]
    creds_store: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthEntry {
    /// Base64エンコードされた "username:password"
    auth: Option<String>,
}

/// credential helper からのレスポンス
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialResponse {
    username: String,
    secret: String,
}

/// Docker config.json による認証
#[derive(Debug)]
pub struct DockerConfigAuth {
    config_path: PathBuf,
}

impl Default for DockerConfigAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerConfigAuth {
    /// デフォルトで $DOCKER_CONFIG/config.json または ~/.docker/config.json を使用
    pub fn new() -> Self {
        let config_path = std::env::var("DOCKER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".docker"))
                    .unwrap_or_else(|| PathBuf::from(".docker"))
            })
            .join("config.json");

        Self { config_path }
    }

    pub fn with_config_path(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    /// レジストリの認証情報を取得
    ///
    /// config.json が無い、または該当エントリが無い場合は `Ok(None)`
    pub fn get_credentials(&self, registry: &str) -> BuildResult<Option<DockerCredentials>> {
        if !self.config_path.exists() {
            tracing::debug!("Docker config.json not found at {:?}", self.config_path);
            return Ok(None);
        }

        let config = self.load_docker_config()?;

        // 1. auths セクション
        if let Some((address, auth_b64)) = config
            .auths
            .iter()
            .filter(|(address, _)| registry_matches(address, registry))
            .find_map(|(address, entry)| entry.auth.as_ref().map(|auth| (address, auth)))
            && let Some(creds) = self.decode_auth(auth_b64, address)?
        {
            tracing::debug!("Found credentials in auths for {}", registry);
            return Ok(Some(creds));
        }

        // 2. credential helper
        if let Some(helper) = &config.creds_store {
            tracing::debug!("Trying credential helper: {}", helper);
            if let Ok(Some(creds)) = self.get_from_helper(helper, registry) {
                return Ok(Some(creds));
            }
        }

        tracing::debug!("No credentials found for {}", registry);
        Ok(None)
    }

    fn load_docker_config(&self) -> BuildResult<DockerConfig> {
        let content =
            std::fs::read_to_string(&self.config_path).map_err(|e| BuildError::AuthFailed {
                registry: self.config_path.display().to_string(),
                message: format!("Failed to read config.json: {}", e),
            })?;

        serde_json::from_str(&content).map_err(|e| BuildError::AuthFailed {
            registry: self.config_path.display().to_string(),
            message: format!("Failed to parse config.json: {}", e),
        })
    }

    fn decode_auth(&self, auth_b64: &str, registry: &str) -> BuildResult<Option<DockerCredentials>> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth_b64)
            .map_err(|e| BuildError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to decode auth: {}", e),
            })?;

        let auth_str = String::from_utf8(decoded).map_err(|e| BuildError::AuthFailed {
            registry: registry.to_string(),
            message: format!("Invalid UTF-8 in auth: {}", e),
        })?;

        Ok(auth_str
            .split_once(':')
            .map(|(username, password)| DockerCredentials {
                username: Some(username.to_string()),
                password: Some(password.to_string()),
                serveraddress: Some(registry.to_string()),
                ..Default::default()
            }))
    }

    fn get_from_helper(
        &self,
        helper: &str,
        registry: &str,
    ) -> BuildResult<Option<DockerCredentials>> {
        let helper_cmd = format!("docker-credential-{}", helper);

        let mut child = Command::new(&helper_cmd)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to run {}: {}", helper_cmd, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes()).ok();
        }

        let output = child
            .wait_with_output()
            .map_err(|e| BuildError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Credential helper failed: {}", e),
            })?;

        if !output.status.success() {
            tracing::debug!(
                "Credential helper returned error for {}: {}",
                registry,
                String::from_utf8_lossy(&output.stderr)
            );
            return Ok(None);
        }

        let response: CredentialResponse =
            serde_json::from_slice(&output.stdout).map_err(|e| BuildError::AuthFailed {
                registry: registry.to_string(),
                message: format!("Failed to parse credential helper response: {}", e),
            })?;

        Ok(Some(DockerCredentials {
            username: Some(response.username),
            password: Some(response.secret),
            serveraddress: Some(registry.to_string()),
            ..Default::default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_extract_registry() {
        assert_eq!(extract_registry("ghcr.io/org/app:v1.0"), "ghcr.io");
        assert_eq!(extract_registry("myuser/app:latest"), "docker.io");
        assert_eq!(extract_registry("nginx:alpine"), "docker.io");
        assert_eq!(extract_registry("localhost:5000/myapp"), "localhost:5000");
        assert_eq!(extract_registry("localhost/myapp"), "localhost");
        assert_eq!(
            extract_registry("123456789.dkr.ecr.ap-northeast-1.amazonaws.com/app"),
            "123456789.dkr.ecr.ap-northeast-1.amazonaws.com"
        );
    }

    #[test]
    fn test_registry_matches() {
        assert!(registry_matches("ghcr.io", "ghcr.io"));
        assert!(registry_matches("https://ghcr.io", "ghcr.io"));
        assert!(registry_matches("https://index.docker.io/v1/", "docker.io"));
        assert!(registry_matches("registry-1.docker.io", "docker.io"));
        assert!(!registry_matches("ghcr.io", "docker.io"));
        assert!(!registry_matches("localhost:5000", "localhost:5001"));
    }

    #[test]
    fn test_get_credentials_missing_config() {
        let dir = tempdir().unwrap();
        let auth = DockerConfigAuth::with_config_path(dir.path().join("config.json"));
        assert!(auth.get_credentials("ghcr.io").unwrap().is_none());
    }

    #[test]
    fn test_get_credentials_from_auths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        let encoded = base64::engine::general_purpose::STANDARD.encode("robot:token");
        fs::write(
            &path,
            format!(r#"{{"auths": {{"https://index.docker.io/v1/": {{"auth": "{}"}}}}}}"#, encoded),
        )
        .unwrap();

        let auth = DockerConfigAuth::with_config_path(path);
        let creds = auth.get_credentials("docker.io").unwrap().unwrap();
        assert_eq!(creds.username.as_deref(), Some("robot"));
        assert_eq!(creds.password.as_deref(), Some("token"));
        assert!(auth.get_credentials("ghcr.io").unwrap().is_none());
    }

    #[test]
    fn test_get_credentials_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();

        let auth = DockerConfigAuth::with_config_path(path);
        let result = auth.get_credentials("ghcr.io");
        assert!(matches!(result, Err(BuildError::AuthFailed { .. })));
    }

    #[test]
    fn test_default_uses_docker_config_env() {
        let dir = tempdir().unwrap();
        temp_env::with_var("DOCKER_CONFIG", Some(dir.path()), || {
            let auth = DockerConfigAuth::new();
            assert_eq!(auth.config_path, dir.path().join("config.json"));
        });
    }
}
