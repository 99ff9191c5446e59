//! シークレットハンドル
//!
//! レジストリ認証情報などの秘密情報を、平文ではなく参照として保持します。
//! 平文が必要になった時点で [`Secret::plaintext`] により解決します。
//!
//! ## 参照形式
//!
//! ```text
//! env:REGISTRY_USER           環境変数
//! file:/run/secrets/token     ファイルの内容（末尾の改行は除去）
//! op://Vault/Item/Field       1Password CLI (`op read`)
//! ```
//!
//! ## セキュリティ
//!
//! - `Debug` / `Display` は参照のみを表示し、平文は出力しません
//! - 解決された値はログにもエラーメッセージにも含まれません

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

const ENV_PREFIX: &str = "env:";
const FILE_PREFIX: &str = "file:";
const OP_PREFIX: &str = "op://";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("invalid secret reference: {0} (expected env:NAME, file:PATH or op://Vault/Item/Field)")]
    InvalidReference(String),

    #[error("environment variable {0} is not set")]
    EnvNotSet(String),

    #[error("failed to read secret file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("1Password: {0}")]
    OnePassword(String),
}

#[derive(Clone, PartialEq, Eq)]
enum SecretSource {
    Env(String),
    File(PathBuf),
    OnePassword(String),
}

/// 外部で解決される秘密情報への参照
#[derive(Clone, PartialEq, Eq)]
pub struct Secret {
    source: SecretSource,
}

impl Secret {
    /// 環境変数を参照するシークレット
    pub fn env(name: impl Into<String>) -> Self {
        Self {
            source: SecretSource::Env(name.into()),
        }
    }

    /// ファイルの内容を参照するシークレット
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: SecretSource::File(path.into()),
        }
    }

    /// 1Password の `op://` 参照
    pub fn one_password(reference: impl Into<String>) -> Result<Self, SecretError> {
        let reference = reference.into();
        if !reference.starts_with(OP_PREFIX) || reference.len() == OP_PREFIX.len() {
            return Err(SecretError::InvalidReference(reference));
        }
        Ok(Self {
            source: SecretSource::OnePassword(reference),
        })
    }

    /// 参照文字列（平文ではない）
    pub fn reference(&self) -> String {
        match &self.source {
            SecretSource::Env(name) => format!("{ENV_PREFIX}{name}"),
            SecretSource::File(path) => format!("{FILE_PREFIX}{}", path.display()),
            SecretSource::OnePassword(reference) => reference.clone(),
        }
    }

    /// 平文に解決
    pub async fn plaintext(&self) -> Result<String, SecretError> {
        debug!(secret = %self, "Resolving secret");

        match &self.source {
            SecretSource::Env(name) => {
                std::env::var(name).map_err(|_| SecretError::EnvNotSet(name.clone()))
            }
            SecretSource::File(path) => {
                let content =
                    tokio::fs::read_to_string(path)
                        .await
                        .map_err(|source| SecretError::Io {
                            path: path.clone(),
                            source,
                        })?;
                Ok(strip_line_ending(&content).to_string())
            }
            SecretSource::OnePassword(reference) => read_one_password(reference).await,
        }
    }
}

impl FromStr for Secret {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(name) = s.strip_prefix(ENV_PREFIX)
            && !name.is_empty()
        {
            return Ok(Self::env(name));
        }
        if let Some(path) = s.strip_prefix(FILE_PREFIX)
            && !path.is_empty()
        {
            return Ok(Self::file(path));
        }
        if s.starts_with(OP_PREFIX) {
            return Self::one_password(s);
        }
        Err(SecretError::InvalidReference(s.to_string()))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&self.reference()).finish()
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

async fn read_one_password(reference: &str) -> Result<String, SecretError> {
    let mut cmd = Command::new("op");
    cmd.arg("read").arg(reference);

    // OP_ACCOUNT環境変数が設定されている場合は使用
    if let Ok(account) = std::env::var("OP_ACCOUNT") {
        debug!(account = %account, "Using OP_ACCOUNT");
        cmd.arg("--account").arg(account);
    }

    let output = cmd
        .output()
        .await
        .map_err(|e| SecretError::OnePassword(format!("failed to run op: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        let hint = if stderr.contains("not signed in") || stderr.contains("session expired") {
            "\nhint: run `op signin` or set OP_SERVICE_ACCOUNT_TOKEN"
        } else if stderr.contains("multiple accounts") {
            "\nhint: set OP_ACCOUNT to choose an account"
        } else {
            ""
        };

        return Err(SecretError::OnePassword(format!(
            "{}{}",
            stderr.trim(),
            hint
        )));
    }

    Ok(strip_line_ending(&String::from_utf8_lossy(&output.stdout)).to_string())
}

/// 末尾の改行だけを取り除く。前後の空白は値の一部として残す
fn strip_line_ending(value: &str) -> &str {
    value.trim_end_matches(['\r', '\n'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_references() {
        assert_eq!("env:REG_USER".parse::<Secret>().unwrap(), Secret::env("REG_USER"));
        assert_eq!(
            "file:/run/secrets/token".parse::<Secret>().unwrap(),
            Secret::file("/run/secrets/token")
        );
        assert_eq!(
            "op://Vault/registry/password".parse::<Secret>().unwrap().reference(),
            "op://Vault/registry/password"
        );
    }

    #[test]
    fn test_parse_invalid_reference() {
        for reference in ["hunter2", "env:", "file:", "op://", ""] {
            let result = reference.parse::<Secret>();
            assert!(
                matches!(result, Err(SecretError::InvalidReference(_))),
                "{reference} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_does_not_leak_plaintext() {
        let secret = Secret::env("REG_PASSWORD");
        temp_env::with_var("REG_PASSWORD", Some("s3cr3t"), || {
            let debug = format!("{:?}", secret);
            assert_eq!(debug, "Secret(\"env:REG_PASSWORD\")");
            assert!(!debug.contains("s3cr3t"));
            assert_eq!(secret.to_string(), "env:REG_PASSWORD");
        });
    }

    #[test]
    fn test_plaintext_from_env() {
        temp_env::with_var("GOPIPE_TEST_USER", Some("robot"), || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let value = rt.block_on(Secret::env("GOPIPE_TEST_USER").plaintext());
            assert_eq!(value.unwrap(), "robot");
        });
    }

    #[test]
    fn test_plaintext_env_not_set() {
        temp_env::with_var_unset("GOPIPE_TEST_MISSING", || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let err = rt
                .block_on(Secret::env("GOPIPE_TEST_MISSING").plaintext())
                .unwrap_err();
            assert!(matches!(err, SecretError::EnvNotSet(ref name) if name == "GOPIPE_TEST_MISSING"));
        });
    }

    #[test]
    fn test_strip_line_ending_keeps_whitespace() {
        assert_eq!(strip_line_ending("  spaced  \n"), "  spaced  ");
        assert_eq!(strip_line_ending("token\r\n"), "token");
        assert_eq!(strip_line_ending("\ttab\t"), "\ttab\t");
    }

    #[tokio::test]
    async fn test_plaintext_from_file_keeps_surrounding_spaces() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("password");
        fs::write(&path, " pass word \r\n").unwrap();

        let value = Secret::file(&path).plaintext().await.unwrap();
        assert_eq!(value, " pass word ");
    }

    #[tokio::test]
    async fn test_plaintext_from_file_trims_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("username");
        fs::write(&path, "robot\n").unwrap();

        let value = Secret::file(&path).plaintext().await.unwrap();
        assert_eq!(value, "robot");
    }

    #[tokio::test]
    async fn test_plaintext_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope");

        let err = Secret::file(&path).plaintext().await.unwrap_err();
        assert!(matches!(err, SecretError::Io { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    #[ignore = "requires 1Password CLI and authentication"]
    async fn test_plaintext_from_one_password() {
        let secret = Secret::one_password("op://Private/registry/username").unwrap();
        assert!(secret.plaintext().await.is_ok());
    }
}
