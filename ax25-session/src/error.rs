use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("T1 retry budget exhausted while connecting")]
    ConnectTimedOut,
    #[error("T1 retry budget exhausted while disconnecting")]
    DisconnectTimedOut,
    #[error("peer did not respond to keep-alive poll within the retry budget")]
    KeepAliveTimedOut,
    #[error("peer refused the connection (DM)")]
    ConnectionRefused,
    #[error("frame addressed to a different session")]
    AddressMismatch,
}
