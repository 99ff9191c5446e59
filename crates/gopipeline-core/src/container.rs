//! コンテナ記述子
//!
//! ベースイメージと、その上に積むファイルシステム操作・イメージ設定を順序付きで保持します。
//! 記述子を組み立てても何も実行されません。エンジンが記述子を具体化した時点で
//! イメージの取得・コマンド実行・ファイルコピーが行われます。

use crate::secret::Secret;
use std::path::{Path, PathBuf};

/// ホスト側のディレクトリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    path: PathBuf,
}

impl Directory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 別のコンテナのファイルシステムから取り出すファイル
#[derive(Debug, Clone)]
pub struct File {
    container: Box<Container>,
    path: String,
}

impl File {
    /// 取り出し元のコンテナ
    pub fn container(&self) -> &Container {
        &self.container
    }

    /// 取り出し元コンテナ内のパス
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// ファイルシステムに対する操作
#[derive(Debug, Clone)]
pub enum Operation {
    Directory { path: String, source: Directory },
    Workdir(String),
    EnvVariable { name: String, value: String },
    Exec(Vec<String>),
    File { path: String, source: File },
}

/// イメージに付与するレジストリ認証
///
/// パスワードはプッシュ時まで [`Secret`] のまま保持します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub address: String,
    pub username: String,
    pub secret: Secret,
}

#[derive(Debug, Clone, Default)]
pub struct Container {
    from: Option<String>,
    operations: Vec<Operation>,
    entrypoint: Vec<String>,
    exposed_ports: Vec<u16>,
    registry_auths: Vec<RegistryAuth>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// ベースイメージを指定
    pub fn from(mut self, image: impl Into<String>) -> Self {
        self.from = Some(image.into());
        self
    }

    /// ホストのディレクトリを `path` に配置
    pub fn with_directory(mut self, path: impl Into<String>, source: Directory) -> Self {
        self.operations.push(Operation::Directory {
            path: path.into(),
            source,
        });
        self
    }

    pub fn with_workdir(mut self, path: impl Into<String>) -> Self {
        self.operations.push(Operation::Workdir(path.into()));
        self
    }

    pub fn with_env_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.operations.push(Operation::EnvVariable {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn with_exec<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operations
            .push(Operation::Exec(args.into_iter().map(Into::into).collect()));
        self
    }

    /// このコンテナ内の `path` にあるファイルへの参照
    pub fn file(&self, path: impl Into<String>) -> File {
        File {
            container: Box::new(self.clone()),
            path: path.into(),
        }
    }

    /// 他のコンテナのファイルを `path` に配置
    pub fn with_file(mut self, path: impl Into<String>, source: File) -> Self {
        self.operations.push(Operation::File {
            path: path.into(),
            source,
        });
        self
    }

    pub fn with_entrypoint<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entrypoint = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exposed_port(mut self, port: u16) -> Self {
        if !self.exposed_ports.contains(&port) {
            self.exposed_ports.push(port);
        }
        self
    }

    /// レジストリ認証を付与（同じアドレスの既存の認証は置き換える）
    pub fn with_registry_auth(
        mut self,
        address: impl Into<String>,
        username: impl Into<String>,
        secret: Secret,
    ) -> Self {
        let address = address.into();
        self.registry_auths.retain(|auth| auth.address != address);
        self.registry_auths.push(RegistryAuth {
            address,
            username: username.into(),
            secret,
        });
        self
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// 最後に設定された作業ディレクトリ
    pub fn workdir(&self) -> Option<&str> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::Workdir(path) => Some(path.as_str()),
            _ => None,
        })
    }

    /// 最後に設定された環境変数の値
    pub fn env_variable(&self, name: &str) -> Option<&str> {
        self.operations.iter().rev().find_map(|op| match op {
            Operation::EnvVariable { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn entrypoint(&self) -> &[String] {
        &self.entrypoint
    }

    pub fn exposed_ports(&self) -> &[u16] {
        &self.exposed_ports
    }

    pub fn registry_auths(&self) -> &[RegistryAuth] {
        &self.registry_auths
    }

    pub fn registry_auth(&self, address: &str) -> Option<&RegistryAuth> {
        self.registry_auths.iter().find(|auth| auth.address == address)
    }
}
