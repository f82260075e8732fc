use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YappError {
    #[error("checksum error")]
    ChecksumError,
    #[error("transfer cancelled by peer: {0}")]
    CancelledByPeer(String),
    #[error("no response within the retry budget")]
    TimedOut,
    #[error("malformed packet")]
    MalformedPacket,
}
