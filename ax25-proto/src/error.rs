use thiserror::Error;

/// Reasons a byte sequence failed to decode as an AX.25 address, frame, or
/// BSS packet. The codec itself never panics or logs on malformed input
/// (spec: "the codec does not throw and does not log") — callers that want
/// a log line emit one themselves when a decode returns an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("address byte stream truncated")]
    Truncated,
    #[error("unprintable character in callsign")]
    UnprintableCallsign,
    #[error("non-terminal address set the end-of-chain bit")]
    PrematureEndOfChain,
    #[error("frame has fewer than two addresses")]
    TooFewAddresses,
    #[error("control field truncated")]
    ControlTruncated,
    #[error("PID byte missing on I or UI frame")]
    MissingPid,
    #[error("unrecognized U-frame modifier bits")]
    UnknownUFrameType,
    #[error("BSS packet missing leading 0x01 marker")]
    BadBssMarker,
    #[error("BSS TLV length overruns packet")]
    BssLengthOverrun,
    #[error("BSS location field has the wrong length")]
    BadBssLocation,
}

pub type CodecResult<T> = Result<T, CodecError>;
