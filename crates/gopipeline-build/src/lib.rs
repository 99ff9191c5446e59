//! GoPipeline Docker engine
//!
//! コンテナ記述子をDockerfileに展開し、Docker Engine API でビルドしてレジストリへプッシュします。

pub mod auth;
pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod plan;
pub mod progress;
pub mod pusher;

pub use auth::{DockerConfigAuth, extract_registry, registry_matches};
pub use builder::ImageBuilder;
pub use context::ContextBuilder;
pub use engine::DockerEngine;
pub use error::{BuildError, BuildResult};
pub use plan::{ContextDirectory, DockerfilePlan};
pub use progress::BuildProgress;
pub use pusher::{ImagePusher, split_image_tag};
