#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[cfg(feature = "prometheus")]
    #[error(transparent)]
    Prometheus(#[from] metrics_exporter_prometheus::BuildError),
    #[error("invalid metrics listen address '{address}'")]
    InvalidListen { address: String },
}

pub type Result<T> = std::result::Result<T, Error>;
