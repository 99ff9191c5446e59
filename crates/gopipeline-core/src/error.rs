use crate::secret::SecretError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not read registry username: {0}")]
    RegistryUsername(#[source] SecretError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
