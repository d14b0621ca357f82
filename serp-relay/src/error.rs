use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
}
