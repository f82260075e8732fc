use crate::error::YappError;
use crate::io::FileSink;
use crate::packet::{block_checksum, DosDateTime, Packet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitInit,
    AwaitHeader,
    Streaming,
    Done,
}

pub struct IncomingFile {
    pub filename: String,
    pub size: u64,
    pub dos: Option<DosDateTime>,
}

/// Outcome of feeding the receiver a packet.
pub enum ReceiverOutcome {
    Send(Vec<u8>),
    /// A new file header arrived; caller supplies the sink to receive into
    /// and reports back whether it wants to resume from a given offset.
    NeedsSink(IncomingFile),
    FileComplete,
    Cancelled(YappError),
    Idle,
}

/// Receiver half of a YAPP transfer. The caller feeds it inbound packet
/// bytes and, when asked via `NeedsSink`, supplies a `FileSink` through
/// `accept_sink`.
pub struct YappReceiver {
    state: State,
    checksum_mode: bool,
    resume_enabled: bool,
    sink: Option<Box<dyn FileSink>>,
    bytes_written: u64,
}

impl YappReceiver {
    pub fn new(resume_enabled: bool) -> Self {
        Self {
            state: State::AwaitInit,
            checksum_mode: false,
            resume_enabled,
            sink: None,
            bytes_written: 0,
        }
    }

    pub fn on_bytes(&mut self, bytes: &[u8]) -> ReceiverOutcome {
        let Some((packet, _)) = Packet::decode(bytes, self.checksum_mode) else {
            return ReceiverOutcome::Idle;
        };
        if let Packet::Cancel { reason } = packet {
            if let Some(sink) = self.sink.take() {
                sink.abort();
            }
            self.state = State::Done;
            return ReceiverOutcome::Cancelled(YappError::CancelledByPeer(reason));
        }
        match (self.state, packet) {
            (State::AwaitInit, Packet::Init) => {
                self.state = State::AwaitHeader;
                ReceiverOutcome::Send(Packet::ReceiverReady.encode())
            }
            (State::AwaitHeader, Packet::Header { filename, size, dos }) => {
                ReceiverOutcome::NeedsSink(IncomingFile { filename, size, dos })
            }
            (State::AwaitHeader, Packet::EndTransfer) => {
                self.state = State::Done;
                ReceiverOutcome::FileComplete
            }
            (State::Streaming, Packet::Data { payload, checksum }) => {
                if let Some(expected) = checksum {
                    if block_checksum(&payload) != expected {
                        if let Some(sink) = self.sink.take() {
                            sink.abort();
                        }
                        self.state = State::Done;
                        return ReceiverOutcome::Cancelled(YappError::ChecksumError);
                    }
                }
                if let Some(sink) = self.sink.as_mut() {
                    if sink.write_at(&payload).is_err() {
                        return ReceiverOutcome::Cancelled(YappError::MalformedPacket);
                    }
                }
                self.bytes_written += payload.len() as u64;
                ReceiverOutcome::Send(Packet::ReadyFile.encode())
            }
            (State::Streaming, Packet::EndFile) => {
                if let Some(sink) = self.sink.take() {
                    if sink.finalize().is_err() {
                        self.state = State::Done;
                        return ReceiverOutcome::Cancelled(YappError::MalformedPacket);
                    }
                }
                self.state = State::AwaitHeader;
                ReceiverOutcome::Send(Packet::AckFile.encode())
            }
            _ => ReceiverOutcome::Idle,
        }
    }

    /// Called after `NeedsSink` once the caller has constructed (or
    /// declined) a destination. Decides fresh-start vs. resume vs. reject,
    /// and returns the bytes to send back to the sender.
    pub fn accept_sink(&mut self, sink: Option<Box<dyn FileSink>>) -> Vec<u8> {
        match sink {
            None => {
                self.state = State::AwaitHeader;
                Packet::Cancel {
                    reason: "destination rejected".into(),
                }
                .encode()
            }
            Some(mut sink) => {
                let existing = sink.existing_len().filter(|_| self.resume_enabled);
                match existing {
                    Some(offset) if offset > 0 => {
                        if sink.open(true).is_err() {
                            self.state = State::AwaitHeader;
                            return Packet::Cancel {
                                reason: "cannot open for append".into(),
                            }
                            .encode();
                        }
                        self.bytes_written = offset;
                        self.checksum_mode = true;
                        self.sink = Some(sink);
                        self.state = State::Streaming;
                        Packet::Resume {
                            offset,
                            checksum: true,
                        }
                        .encode()
                    }
                    _ => {
                        if sink.open(false).is_err() {
                            self.state = State::AwaitHeader;
                            return Packet::Cancel {
                                reason: "cannot create file".into(),
                            }
                            .encode();
                        }
                        self.bytes_written = 0;
                        self.checksum_mode = true;
                        self.sink = Some(sink);
                        self.state = State::Streaming;
                        Packet::ReadyChecksum.encode()
                    }
                }
            }
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct MemSink {
        buf: Rc<RefCell<Vec<u8>>>,
        existing: Option<u64>,
        finalized: Rc<RefCell<bool>>,
    }
    impl FileSink for MemSink {
        fn existing_len(&self) -> Option<u64> {
            self.existing
        }
        fn open(&mut self, _append: bool) -> std::io::Result<()> {
            Ok(())
        }
        fn write_at(&mut self, bytes: &[u8]) -> std::io::Result<()> {
            self.buf.borrow_mut().extend_from_slice(bytes);
            Ok(())
        }
        fn finalize(self: Box<Self>) -> std::io::Result<()> {
            *self.finalized.borrow_mut() = true;
            Ok(())
        }
        fn abort(self: Box<Self>) {
            self.buf.borrow_mut().clear();
        }
    }

    #[test]
    fn full_transfer_delivers_identical_bytes() {
        let mut recv = YappReceiver::new(true);
        let _ = recv.on_bytes(&Packet::Init.encode());
        let out = recv.on_bytes(
            &Packet::Header {
                filename: "a.txt".into(),
                size: 6,
                dos: None,
            }
            .encode(),
        );
        assert!(matches!(out, ReceiverOutcome::NeedsSink(_)));

        let buf = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = Box::new(MemSink {
            buf: buf.clone(),
            existing: None,
            finalized: finalized.clone(),
        });
        recv.accept_sink(Some(sink));

        let payload = b"abcdef".to_vec();
        let checksum = block_checksum(&payload);
        let _ = recv.on_bytes(
            &Packet::Data {
                payload: payload.clone(),
                checksum: Some(checksum),
            }
            .encode(),
        );
        let out = recv.on_bytes(&Packet::EndFile.encode());
        assert!(matches!(out, ReceiverOutcome::Send(_)));
        assert!(*finalized.borrow());
        assert_eq!(*buf.borrow(), payload);

        let out = recv.on_bytes(&Packet::EndTransfer.encode());
        assert!(matches!(out, ReceiverOutcome::FileComplete));
    }

    #[test]
    fn checksum_mismatch_aborts_without_finalizing() {
        let mut recv = YappReceiver::new(false);
        let _ = recv.on_bytes(&Packet::Init.encode());
        let _ = recv.on_bytes(
            &Packet::Header {
                filename: "a.txt".into(),
                size: 6,
                dos: None,
            }
            .encode(),
        );
        let buf = Rc::new(RefCell::new(Vec::new()));
        let finalized = Rc::new(RefCell::new(false));
        let sink = Box::new(MemSink {
            buf: buf.clone(),
            existing: None,
            finalized: finalized.clone(),
        });
        recv.accept_sink(Some(sink));

        let out = recv.on_bytes(
            &Packet::Data {
                payload: b"abcdef".to_vec(),
                checksum: Some(0xFF),
            }
            .encode(),
        );
        assert!(matches!(out, ReceiverOutcome::Cancelled(YappError::ChecksumError)));
        assert!(!*finalized.borrow());
        assert!(recv.is_done());
    }

    #[test]
    fn resume_offers_existing_length_back_to_sender() {
        let mut recv = YappReceiver::new(true);
        let _ = recv.on_bytes(&Packet::Init.encode());
        let _ = recv.on_bytes(
            &Packet::Header {
                filename: "a.txt".into(),
                size: 100,
                dos: None,
            }
            .encode(),
        );
        let sink = Box::new(MemSink {
            buf: Rc::new(RefCell::new(Vec::new())),
            existing: Some(40),
            finalized: Rc::new(RefCell::new(false)),
        });
        let wire = recv.accept_sink(Some(sink));
        let (pkt, _) = Packet::decode(&wire, false).unwrap();
        match pkt {
            Packet::Resume { offset, checksum } => {
                assert_eq!(offset, 40);
                assert!(checksum);
            }
            _ => panic!("expected resume"),
        }
    }
}
