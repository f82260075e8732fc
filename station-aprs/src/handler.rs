use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use ax25_proto::{Address, Frame, FrameBody, UFrameType};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use station_store::{Storage, SystemTimeProvider, TimeProvider};

use crate::auth::{compute_token, verify_token, SecretKey};
use crate::classify::{classify, parse_message, PacketKind};
use crate::dedup::{ContentDedup, SeqCache};
use crate::log::{AprsLog, Direction, MessageLogEntry};
use crate::message::{build_ack, build_message};
use crate::retry::RetryQueue;

/// Ties the APRS building blocks together into the message flow for
/// messages addressed to us: classify, dedup, authenticate, ack, honor
/// `ECHO:` at the sender's trust level, retry-track what we send, and log
/// everything else.
pub const APRS_PID: u8 = 0xF0;
const ECHO_PREFIX: &str = "ECHO:";

/// A configured peer's shared secret and whether this station requires it
/// to authenticate before being marked trusted.
#[derive(Debug, Clone)]
pub struct PeerAuth {
    pub secret: SecretKey,
    pub required: bool,
}

impl PeerAuth {
    pub fn new(secret: SecretKey, required: bool) -> Self {
        Self { secret, required }
    }
}

fn format_address(addr: &Address) -> String {
    format!("{}-{}", addr.callsign(), addr.ssid())
}

fn aprs_payload(frame: &Frame) -> Option<&str> {
    match &frame.body {
        FrameBody::Unnumbered {
            pid: Some(pid),
            payload,
            ..
        } if *pid == APRS_PID => std::str::from_utf8(payload).ok(),
        _ => None,
    }
}

pub struct AprsHandler<T: TimeProvider + Clone = SystemTimeProvider> {
    our_callsign: String,
    peers: HashMap<String, PeerAuth>,
    seq_cache: SeqCache,
    content_dedup: ContentDedup<T>,
    retry: RetryQueue<T>,
    log: AprsLog<T>,
    time: T,
    out_seq: AtomicU64,
}

impl AprsHandler<SystemTimeProvider> {
    pub fn new(our_callsign: impl Into<String>, peers: HashMap<String, PeerAuth>) -> Self {
        Self::with_time_provider(our_callsign, peers, SystemTimeProvider)
    }
}

impl<T: TimeProvider + Clone> AprsHandler<T> {
    pub fn with_time_provider(our_callsign: impl Into<String>, peers: HashMap<String, PeerAuth>, time: T) -> Self {
        Self {
            our_callsign: our_callsign.into(),
            peers,
            seq_cache: SeqCache::new(),
            content_dedup: ContentDedup::with_time_provider(time.clone()),
            retry: RetryQueue::with_time_provider(time.clone()),
            log: AprsLog::with_time_provider(time.clone()),
            time,
            out_seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> String {
        let n = self.out_seq.fetch_add(1, Ordering::Relaxed);
        format!("{:03}", n % 1000)
    }

    fn build_ui_frame(&self, incoming: &Frame, payload: &[u8]) -> Vec<u8> {
        Frame {
            addresses: vec![*incoming.source(), *incoming.destination()],
            command: incoming.command,
            modulo128: incoming.modulo128,
            body: FrameBody::Unnumbered {
                kind: UFrameType::Ui,
                poll_final: false,
                pid: Some(APRS_PID),
                payload: payload.to_vec(),
            },
            legacy_odd_packet: false,
        }
        .encode()
    }

    /// Processes one decoded inbound UI frame, returning the encoded UI
    /// frames (if any) this station should transmit in response.
    pub fn handle_inbound(&self, frame: &Frame, storage: &Storage) -> Vec<Vec<u8>> {
        let Some(payload) = aprs_payload(frame) else {
            return Vec::new();
        };
        let kind = classify(payload);
        let source = format_address(frame.source());
        let destination = format_address(frame.destination());
        let data_type = format!("{kind:?}");

        let parsed = if kind == PacketKind::Message {
            parse_message(payload)
        } else {
            None
        };
        let addressed_to_us = parsed
            .as_ref()
            .is_some_and(|p| p.addressee.trim() == self.our_callsign);

        if !addressed_to_us {
            // Disk-log dedup only gates the throttled history, never the
            // ack/echo pipeline below (that's the seq-cache's job).
            if self.content_dedup.observe(&source, &destination, &data_type, payload) {
                if let Err(err) = self.log.record(
                    MessageLogEntry {
                        timestamp_ms: self.time.now_ms(),
                        source,
                        destination,
                        data_type,
                        text: payload.to_string(),
                        direction: Direction::Received,
                    },
                    storage,
                ) {
                    tracing::warn!(%err, "failed to persist aprs message log entry");
                }
            }
            return Vec::new();
        }

        let parsed = parsed.expect("addressed_to_us implies a parsed message");
        let seq = parsed.seq.clone().unwrap_or_default();

        if parsed.is_ack {
            if let Some(expected_text) = self.retry.pending_text(&source, &seq) {
                self.retry.ack(&source, &seq, &expected_text);
            }
            return Vec::new();
        }

        // Suppresses reprocessing of a re-digipeated resend; the ack below
        // still goes out every time so the sender's own retry stops.
        let first_time = self.seq_cache.observe(&source, &seq);

        let peer = self.peers.get(&source);
        let trusted = match &parsed.token {
            Some(token) => {
                let Some(peer) = peer else {
                    return Vec::new();
                };
                if !verify_token(
                    &peer.secret,
                    self.time.now_ms(),
                    &source,
                    &self.our_callsign,
                    &parsed.text,
                    Some(seq.as_str()),
                    token,
                ) {
                    return Vec::new();
                }
                true
            }
            None => !peer.is_some_and(|p| p.required),
        };

        let mut outgoing = Vec::new();

        let ack_token = parsed.token.as_ref().and_then(|_| {
            peer.map(|p| {
                compute_token(
                    &p.secret,
                    self.time.now_ms(),
                    &self.our_callsign,
                    &source,
                    &format!("ack{seq}"),
                    None,
                )
            })
        });
        let ack_text = build_ack(&source, &seq, ack_token.as_deref());
        outgoing.push(self.build_ui_frame(frame, ack_text.as_bytes()));

        if first_time {
            if let Some(echo_text) = parsed.text.strip_prefix(ECHO_PREFIX) {
                if trusted {
                    let out_seq = self.next_seq();
                    let token = peer.map(|p| {
                        compute_token(
                            &p.secret,
                            self.time.now_ms(),
                            &self.our_callsign,
                            &source,
                            echo_text,
                            Some(out_seq.as_str()),
                        )
                    });
                    let reply_text = build_message(&source, echo_text, &out_seq, token.as_deref());
                    let reply_frame = self.build_ui_frame(frame, reply_text.as_bytes());
                    self.retry.track(&source, &out_seq, echo_text, STANDARD.encode(&reply_frame));
                    outgoing.push(reply_frame);

                    if let Err(err) = self.log.record(
                        MessageLogEntry {
                            timestamp_ms: self.time.now_ms(),
                            source: self.our_callsign.clone(),
                            destination: source.clone(),
                            data_type: "Message".to_string(),
                            text: echo_text.to_string(),
                            direction: Direction::Sent,
                        },
                        storage,
                    ) {
                        tracing::warn!(%err, "failed to persist aprs message log entry");
                    }
                }
            }
        }

        outgoing
    }

    /// Retransmits any due entries in the retry queue, returning the
    /// already-encoded frames to send again.
    pub fn poll_retries(&self) -> Vec<Vec<u8>> {
        self.retry
            .poll()
            .into_iter()
            .filter_map(|encoded| STANDARD.decode(encoded).ok())
            .collect()
    }

    pub fn retry_len(&self) -> usize {
        self.retry.len()
    }

    pub fn recent_log(&self, count: usize) -> Vec<MessageLogEntry> {
        self.log.recent(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ax25_proto::Address;
    use station_store::ManualTimeProvider;

    fn frame_from(src: &str, src_ssid: u8, dst: &str, dst_ssid: u8, payload: &str) -> Frame {
        Frame {
            addresses: vec![
                Address::new(dst, dst_ssid).unwrap(),
                Address::new(src, src_ssid).unwrap(),
            ],
            command: true,
            modulo128: false,
            body: FrameBody::Unnumbered {
                kind: UFrameType::Ui,
                poll_final: false,
                pid: Some(APRS_PID),
                payload: payload.as_bytes().to_vec(),
            },
            legacy_odd_packet: false,
        }
    }

    fn handler_with_peer(secret: &str, required: bool) -> (AprsHandler<ManualTimeProvider>, SecretKey) {
        let key = SecretKey::derive(secret);
        let mut peers = HashMap::new();
        peers.insert("W1AW-0".to_string(), PeerAuth::new(key.clone(), required));
        (
            AprsHandler::with_time_provider("KK7VZT-1", peers, ManualTimeProvider::new(0)),
            key,
        )
    }

    fn payload_of(wire: &[u8]) -> String {
        let frame = Frame::decode(wire).unwrap();
        match frame.body {
            FrameBody::Unnumbered { payload, .. } => String::from_utf8(payload).unwrap(),
            _ => panic!("expected unnumbered body"),
        }
    }

    #[test]
    fn authenticated_echo_gets_mirrored_ack_and_tracked_reply() {
        let (handler, key) = handler_with_peer("hunter2", false);
        let storage = Storage::open_in_memory().unwrap();
        let token = compute_token(&key, 0, "W1AW-0", "KK7VZT-1", "ECHO:hi", Some("042"));
        let message = build_message("KK7VZT-1", "ECHO:hi", "042", Some(&token));
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, &message);

        let out = handler.handle_inbound(&frame, &storage);
        assert_eq!(out.len(), 2, "expected an ack and an echo reply");

        let expected_ack_token = compute_token(&key, 0, "KK7VZT-1", "W1AW-0", "ack042", None);
        assert_eq!(payload_of(&out[0]), build_ack("W1AW-0", "042", Some(&expected_ack_token)));
        assert_eq!(handler.retry_len(), 1);
    }

    #[test]
    fn auth_failure_drops_silently() {
        let (handler, _key) = handler_with_peer("hunter2", false);
        let storage = Storage::open_in_memory().unwrap();
        let message = build_message("KK7VZT-1", "ECHO:hi", "042", Some("WRONGT"));
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, &message);
        assert!(handler.handle_inbound(&frame, &storage).is_empty());
        assert_eq!(handler.retry_len(), 0);
    }

    #[test]
    fn missing_auth_when_required_acks_but_skips_echo() {
        let (handler, _key) = handler_with_peer("hunter2", true);
        let storage = Storage::open_in_memory().unwrap();
        let message = build_message("KK7VZT-1", "ECHO:hi", "042", None);
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, &message);

        let out = handler.handle_inbound(&frame, &storage);
        assert_eq!(out.len(), 1, "untrusted sender should still get an ack but no echo");
        assert_eq!(handler.retry_len(), 0);
    }

    #[test]
    fn duplicate_sequence_acks_again_without_reechoing() {
        let (handler, _key) = handler_with_peer("hunter2", false);
        let storage = Storage::open_in_memory().unwrap();
        let message = build_message("KK7VZT-1", "ECHO:hi", "042", None);
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, &message);

        assert_eq!(handler.handle_inbound(&frame, &storage).len(), 2);
        assert_eq!(handler.retry_len(), 1);
        let out = handler.handle_inbound(&frame, &storage);
        assert_eq!(out.len(), 1, "resend should still be acked");
        assert_eq!(handler.retry_len(), 1, "no second echo tracked");
    }

    #[test]
    fn ack_for_our_echo_clears_retry_queue() {
        let (handler, _key) = handler_with_peer("hunter2", false);
        let storage = Storage::open_in_memory().unwrap();
        let message = build_message("KK7VZT-1", "ECHO:hi", "042", None);
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, &message);
        handler.handle_inbound(&frame, &storage);
        assert_eq!(handler.retry_len(), 1);

        // The echo reply we tracked carries the handler's first generated
        // sequence number, "000", not the inbound message's own "042".
        let ack = build_ack("KK7VZT-1", "000", None);
        let ack_frame = frame_from("W1AW", 0, "KK7VZT", 1, &ack);
        handler.handle_inbound(&ack_frame, &storage);
        assert_eq!(handler.retry_len(), 0);
    }

    #[test]
    fn non_addressed_traffic_is_logged_not_acked() {
        let (handler, _key) = handler_with_peer("hunter2", false);
        let storage = Storage::open_in_memory().unwrap();
        let frame = frame_from("W1AW", 0, "KK7VZT", 1, "!4903.50N/07201.75W-");
        assert!(handler.handle_inbound(&frame, &storage).is_empty());
        assert_eq!(handler.recent_log(10).len(), 1);
    }
}
