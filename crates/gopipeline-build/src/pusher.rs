//! イメージプッシュ処理
//!
//! ビルドしたイメージをコンテナレジストリにプッシュします。
//! コンテナに付与されたレジストリ認証を優先し、無ければ Docker config.json を使います。

use crate::auth::{DockerConfigAuth, extract_registry, registry_matches};
use crate::error::{BuildError, BuildResult};
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::models::PushImageInfo;
use colored::Colorize;
use futures_util::{Stream, StreamExt};
use gopipeline_core::Container;
use std::io::Write;

/// イメージプッシュを実行するハンドラ
pub struct ImagePusher {
    docker: Docker,
    fallback: DockerConfigAuth,
}

impl ImagePusher {
    pub fn new(docker: Docker) -> Self {
        Self {
            docker,
            fallback: DockerConfigAuth::new(),
        }
    }

    pub fn with_fallback(docker: Docker, fallback: DockerConfigAuth) -> Self {
        Self { docker, fallback }
    }

    /// イメージをレジストリにプッシュ
    ///
    /// # Arguments
    /// * `container` - 認証情報を持つコンテナ記述子
    /// * `image` - イメージ名（レジストリ込み、タグなし）
    /// * `tag` - イメージタグ
    ///
    /// # Returns
    /// プッシュ成功時は完全なイメージ名を返す
    pub async fn push(&self, container: &Container, image: &str, tag: &str) -> BuildResult<String> {
        validate_tag(tag)?;
        let full_image = format!("{}:{}", image, tag);

        let credentials = self.credentials(container, image).await?;

        #[allow(deprecated)]
        let options = bollard::image::PushImageOptions::<String> {
            tag: tag.to_string(),
        };

        println!("  → {}", full_image.cyan());

        #[allow(deprecated)]
        let stream = self.docker.push_image(image, Some(options), credentials);

        drain_push_stream(stream).await?;

        tracing::info!("Pushed {}", full_image);
        Ok(full_image)
    }

    /// プッシュ先レジストリの認証情報
    ///
    /// パスワードのシークレットはここで初めて平文に解決されます。
    pub async fn credentials(
        &self,
        container: &Container,
        image: &str,
    ) -> BuildResult<Option<DockerCredentials>> {
        let registry = extract_registry(image);

        if let Some(auth) = container
            .registry_auths()
            .iter()
            .find(|auth| registry_matches(&auth.address, &registry))
        {
            tracing::debug!("Using attached registry auth for {}", registry);
            let password = auth.secret.plaintext().await?;
            return Ok(Some(DockerCredentials {
                username: Some(auth.username.clone()),
                password: Some(password),
                serveraddress: Some(auth.address.clone()),
                ..Default::default()
            }));
        }

        self.fallback.get_credentials(&registry)
    }
}

/// タグのバリデーション
///
/// - 128文字以下
/// - 英数字、ピリオド、ハイフン、アンダースコアのみ
/// - 先頭はピリオドまたはハイフンではない
pub(crate) fn validate_tag(tag: &str) -> BuildResult<()> {
    if tag.is_empty() {
        return Err(BuildError::InvalidTag {
            tag: "(empty)".to_string(),
        });
    }

    if tag.len() > 128 {
        return Err(BuildError::InvalidTag {
            tag: format!("Tag too long ({} characters, max 128)", tag.len()),
        });
    }

    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(BuildError::InvalidTag {
            tag: tag.to_string(),
        });
    }

    if let Some(c) = tag
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '.' && *c != '-' && *c != '_')
    {
        return Err(BuildError::InvalidTag {
            tag: format!("Invalid character '{}' in tag: {}", c, tag),
        });
    }

    Ok(())
}

/// プッシュのストリームを最後まで読み、途中のエラーを `PushFailed` として返す
///
/// レジストリ側のエラーはストリーム自体のエラーではなく `info.error` として届きます。
async fn drain_push_stream<S>(stream: S) -> BuildResult<()>
where
    S: Stream<Item = Result<PushImageInfo, bollard::errors::Error>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut last_status = String::new();
    let mut error_message: Option<String> = None;

    while let Some(result) = stream.next().await {
        match result {
            Ok(info) => {
                if let Some(err) = info.error {
                    error_message = Some(err);
                } else {
                    handle_progress(&info, &mut last_status);
                }
            }
            Err(e) => {
                return Err(BuildError::PushFailed {
                    message: e.to_string(),
                });
            }
        }
    }

    println!();

    match error_message {
        Some(message) => Err(BuildError::PushFailed { message }),
        None => Ok(()),
    }
}

fn handle_progress(info: &PushImageInfo, last_status: &mut String) {
    if let Some(status) = &info.status {
        let progress = info.progress.as_deref().unwrap_or("");

        match status.as_str() {
            "Pushing" => {
                print!("\r  ↑ {} {}     ", status, progress);
                std::io::stdout().flush().ok();
            }
            "Pushed" | "Layer already exists" => {
                println!("\r  {} {}                    ", "✓".green(), status);
            }
            "Preparing" | "Waiting" => {}
            _ => {
                if status != last_status {
                    println!("\r  ℹ {}                    ", status);
                    *last_status = status.clone();
                }
            }
        }
    }
}

/// イメージ名とタグを分離
///
/// # Examples
/// - `ghcr.io/org/app:v1.0` -> `("ghcr.io/org/app", "v1.0")`
/// - `ghcr.io/org/app` -> `("ghcr.io/org/app", "latest")`
/// - `localhost:5000/app:dev` -> `("localhost:5000/app", "dev")`
pub fn split_image_tag(image: &str) -> (String, String) {
    if let Some(pos) = image.rfind(':') {
        let potential_tag = &image[pos + 1..];
        let potential_image = &image[..pos];

        // localhost:5000/app の ":5000/app" はタグではない
        if !potential_tag.contains('/') {
            return (potential_image.to_string(), potential_tag.to_string());
        }
    }

    (image.to_string(), "latest".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gopipeline_core::Secret;
    use std::fs;
    use tempfile::tempdir;

    fn pusher_with_empty_fallback(dir: &std::path::Path) -> ImagePusher {
        // Docker への接続はプッシュ時まで発生しない
        let docker = Docker::connect_with_http("http://127.0.0.1:2375", 4, bollard::API_DEFAULT_VERSION)
            .unwrap();
        ImagePusher::with_fallback(
            docker,
            DockerConfigAuth::with_config_path(dir.join("config.json")),
        )
    }

    #[test]
    fn test_split_image_tag() {
        assert_eq!(
            split_image_tag("ghcr.io/org/app:v1.0"),
            ("ghcr.io/org/app".to_string(), "v1.0".to_string())
        );
        assert_eq!(
            split_image_tag("ghcr.io/org/app"),
            ("ghcr.io/org/app".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/app"),
            ("localhost:5000/app".to_string(), "latest".to_string())
        );
        assert_eq!(
            split_image_tag("localhost:5000/app:dev"),
            ("localhost:5000/app".to_string(), "dev".to_string())
        );
    }

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("v1.0.0").is_ok());
        assert!(validate_tag("main_2024-10").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("-dev").is_err());
        assert!(validate_tag("feature/x").is_err());
        assert!(validate_tag(&"a".repeat(129)).is_err());
    }

    #[tokio::test]
    async fn test_credentials_from_attached_auth() {
        let dir = tempdir().unwrap();
        let password_file = dir.path().join("token");
        fs::write(&password_file, "s3cr3t\n").unwrap();

        let container = Container::new().from("alpine").with_registry_auth(
            "ghcr.io",
            "robot",
            Secret::file(&password_file),
        );

        let pusher = pusher_with_empty_fallback(dir.path());
        let creds = pusher
            .credentials(&container, "ghcr.io/org/svc")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.username.as_deref(), Some("robot"));
        assert_eq!(creds.password.as_deref(), Some("s3cr3t"));
        assert_eq!(creds.serveraddress.as_deref(), Some("ghcr.io"));
    }

    #[tokio::test]
    async fn test_credentials_other_registry_uses_fallback() {
        let dir = tempdir().unwrap();
        let container = Container::new().from("alpine").with_registry_auth(
            "ghcr.io",
            "robot",
            Secret::env("UNUSED_TOKEN"),
        );

        let pusher = pusher_with_empty_fallback(dir.path());
        let creds = pusher.credentials(&container, "quay.io/org/svc").await.unwrap();
        assert!(creds.is_none());
    }

    #[tokio::test]
    async fn test_credentials_unresolvable_password() {
        let dir = tempdir().unwrap();
        let container = Container::new().from("alpine").with_registry_auth(
            "ghcr.io",
            "robot",
            Secret::file(dir.path().join("missing")),
        );

        let pusher = pusher_with_empty_fallback(dir.path());
        let result = pusher.credentials(&container, "ghcr.io/org/svc").await;
        assert!(matches!(result, Err(BuildError::Secret(_))));
    }

    fn push_info(status: Option<&str>, error: Option<&str>) -> PushImageInfo {
        PushImageInfo {
            status: status.map(str::to_string),
            error: error.map(str::to_string),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_drain_push_stream_success() {
        let stream = futures_util::stream::iter(vec![
            Ok(push_info(Some("Preparing"), None)),
            Ok(push_info(Some("Pushed"), None)),
            Ok(push_info(Some("v1: digest: sha256:abc size: 528"), None)),
        ]);
        assert!(drain_push_stream(stream).await.is_ok());
    }

    #[tokio::test]
    async fn test_drain_push_stream_registry_error() {
        let stream = futures_util::stream::iter(vec![
            Ok(push_info(Some("Preparing"), None)),
            Ok(push_info(None, Some("denied: requested access to the resource is denied"))),
            Ok(push_info(Some("Waiting"), None)),
        ]);
        let result = drain_push_stream(stream).await;
        match result {
            Err(BuildError::PushFailed { message }) => {
                assert!(message.contains("denied"));
            }
            other => panic!("expected PushFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_drain_push_stream_transport_error() {
        let stream = futures_util::stream::iter(vec![
            Ok(push_info(Some("Preparing"), None)),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 500,
                message: "connection reset".to_string(),
            }),
        ]);
        let result = drain_push_stream(stream).await;
        assert!(matches!(result, Err(BuildError::PushFailed { .. })));
    }
}
