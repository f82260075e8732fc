use crate::error::YappError;
use crate::io::FileSource;
use crate::packet::{block_checksum, DosDateTime, Packet, MAX_BLOCK};

const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SentInit,
    SentHeader,
    Streaming,
    SentEndFile,
    SentEndTransfer,
    Done,
}

/// Outcome of feeding a sender incoming bytes or a timer tick.
pub enum SenderOutcome {
    /// Bytes to hand to the owning AX.25 session's `send()`.
    Send(Vec<u8>),
    /// Nothing to transmit yet (e.g. a bare ack that needs no reply).
    Idle,
    FileComplete,
    Cancelled(YappError),
}

/// Drives the sender half of a single YAPP file transfer on top of an
/// already-open AX.25 (or YappC) conversation. The caller owns the
/// underlying session; this type only knows packet bytes in and out.
pub struct YappSender<S: FileSource> {
    source: S,
    filename: String,
    dos: Option<DosDateTime>,
    resume_enabled: bool,
    state: State,
    offset: u64,
    checksum: bool,
    retries: u32,
    max_retries: u32,
    last_sent: Vec<u8>,
}

impl<S: FileSource> YappSender<S> {
    pub fn new(source: S, filename: String, dos: Option<DosDateTime>, resume_enabled: bool) -> Self {
        Self {
            source,
            filename,
            dos,
            resume_enabled,
            state: State::SentInit,
            offset: 0,
            checksum: false,
            retries: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_sent: Vec::new(),
        }
    }

    /// Begins the transfer: returns the Init bytes to transmit.
    pub fn start(&mut self) -> Vec<u8> {
        self.state = State::SentInit;
        self.remember_and_return(Packet::Init.encode())
    }

    fn remember_and_return(&mut self, bytes: Vec<u8>) -> Vec<u8> {
        self.last_sent = bytes.clone();
        bytes
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) -> SenderOutcome {
        let Some((packet, _)) = Packet::decode(bytes, self.checksum) else {
            return SenderOutcome::Idle;
        };
        self.retries = 0;
        if let Packet::Cancel { reason } = packet {
            self.state = State::Done;
            return SenderOutcome::Cancelled(YappError::CancelledByPeer(reason));
        }
        match (self.state, packet) {
            (State::SentInit, Packet::ReceiverReady) => {
                self.state = State::SentHeader;
                let header = Packet::Header {
                    filename: self.filename.clone(),
                    size: self.source.len(),
                    dos: self.dos,
                };
                SenderOutcome::Send(self.remember_and_return(header.encode()))
            }
            (State::SentHeader, Packet::ReadyFile) => {
                self.checksum = false;
                self.offset = 0;
                self.state = State::Streaming;
                SenderOutcome::Send(self.next_data_block())
            }
            (State::SentHeader, Packet::ReadyChecksum) => {
                self.checksum = true;
                self.offset = 0;
                self.state = State::Streaming;
                SenderOutcome::Send(self.next_data_block())
            }
            (State::SentHeader, Packet::Resume { offset, checksum })
                if self.resume_enabled =>
            {
                self.offset = offset.min(self.source.len());
                self.checksum = checksum;
                self.state = State::Streaming;
                SenderOutcome::Send(self.next_data_block())
            }
            (State::Streaming, Packet::AckFile) => SenderOutcome::Idle,
            (State::Streaming, _ack) => {
                if self.offset >= self.source.len() {
                    self.state = State::SentEndFile;
                    SenderOutcome::Send(self.remember_and_return(Packet::EndFile.encode()))
                } else {
                    SenderOutcome::Send(self.next_data_block())
                }
            }
            (State::SentEndFile, Packet::AckFile) => {
                self.state = State::SentEndTransfer;
                SenderOutcome::Send(self.remember_and_return(Packet::EndTransfer.encode()))
            }
            (State::SentEndTransfer, Packet::AckTransfer) => {
                self.state = State::Done;
                SenderOutcome::FileComplete
            }
            _ => SenderOutcome::Idle,
        }
    }

    fn next_data_block(&mut self) -> Vec<u8> {
        let want = MAX_BLOCK.min((self.source.len() - self.offset) as usize);
        let chunk = self
            .source
            .read_at(self.offset, want)
            .unwrap_or_default();
        self.offset += chunk.len() as u64;
        let checksum = self.checksum.then(|| block_checksum(&chunk));
        self.remember_and_return(
            Packet::Data {
                payload: chunk,
                checksum,
            }
            .encode(),
        )
    }

    /// Call on a per-state timeout. Retransmits the last packet up to the
    /// retry budget, then cancels.
    pub fn on_timeout(&mut self) -> SenderOutcome {
        if self.state == State::Done {
            return SenderOutcome::Idle;
        }
        self.retries += 1;
        if self.retries > self.max_retries {
            self.state = State::Done;
            return SenderOutcome::Cancelled(YappError::TimedOut);
        }
        SenderOutcome::Send(self.last_sent.clone())
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }
}
