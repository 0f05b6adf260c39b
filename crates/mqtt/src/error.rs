#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("mqtt event loop task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
