use thiserror::Error;

/// Errors of the client network manager.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not bind a client socket after {0} attempts")]
    Bind(u32),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("sent {sent} of {len} bytes")]
    PartialSend { sent: usize, len: usize },
    #[error("not connected to the relay")]
    NotConnected,
    #[error("message of {bytes} bytes needs more than {max_parts} fragments")]
    MessageTooLarge { bytes: usize, max_parts: usize },
    #[error("no destinations given")]
    NoDestinations,
    #[error("destination list leaves no payload capacity")]
    TooManyDestinations,
}
