use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ax25_proto::{Address, Frame, FrameBody, SFrameType, UFrameType};
use tracing::{debug, trace, warn};

use crate::error::SessionError;
use crate::stats::{ConnectDuration, SessionStats};
use crate::time::TimeProvider;

pub const DEFAULT_T1: Duration = Duration::from_secs(3);
pub const DEFAULT_T2: Duration = Duration::from_millis(500);
pub const DEFAULT_T3: Duration = Duration::from_secs(300);
pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_MAX_PAYLOAD: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(State),
    DataReceived(Vec<u8>),
    UiDataReceived { pid: u8, payload: Vec<u8> },
    Error(SessionError),
}

/// One pending I-frame that has been transmitted but not yet acknowledged.
#[derive(Debug, Clone)]
struct PendingFrame {
    ns: u16,
    pid: u8,
    payload: Vec<u8>,
}

/// Which supervisory recovery is outstanding for the current receive gap,
/// so at most one REJ/SREJ is emitted per gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingReject {
    None,
    Rej,
    Srej(u16),
}

/// A connection-oriented AX.25 session with one remote peer on one channel.
///
/// Owns V(S)/V(R)/V(A), the send/receive windows, and T1/T2/T3. The channel
/// lock (`channel_id`) is fixed for the session's lifetime and never
/// changed after the session is opened.
pub struct Session {
    local: Address,
    remote: Address,
    channel_id: u32,
    state: State,
    modulus: u16,
    window_size: u16,
    max_payload: usize,

    vs: u16,
    vr: u16,
    va: u16,

    outgoing_bytes: VecDeque<u8>,
    window: VecDeque<PendingFrame>,
    incoming_buffer: BTreeMap<u16, Vec<u8>>,
    pending_reject: PendingReject,
    peer_busy: bool,

    t1_deadline: Option<Instant>,
    t2_deadline: Option<Instant>,
    t3_deadline: Option<Instant>,
    retry_count: u32,
    max_retries: u32,

    stats: SessionStats,
    connect_duration: ConnectDuration,

    events: VecDeque<SessionEvent>,
    outbound: VecDeque<Frame>,

    time_provider: Arc<dyn TimeProvider>,
}

impl Session {
    pub fn new(
        local: Address,
        remote: Address,
        channel_id: u32,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            local,
            remote,
            channel_id,
            state: State::Disconnected,
            modulus: 8,
            window_size: 7,
            max_payload: DEFAULT_MAX_PAYLOAD,
            vs: 0,
            vr: 0,
            va: 0,
            outgoing_bytes: VecDeque::new(),
            window: VecDeque::new(),
            incoming_buffer: BTreeMap::new(),
            pending_reject: PendingReject::None,
            peer_busy: false,
            t1_deadline: None,
            t2_deadline: None,
            t3_deadline: None,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            stats: SessionStats::default(),
            connect_duration: ConnectDuration::new(),
            events: VecDeque::new(),
            outbound: VecDeque::new(),
            time_provider,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn channel_id(&self) -> u32 {
        self.channel_id
    }

    pub fn remote(&self) -> &Address {
        &self.remote
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn connected_seconds(&self) -> u64 {
        self.connect_duration.seconds(self.time_provider.now())
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        self.events.drain(..).collect()
    }

    pub fn drain_outbound(&mut self) -> Vec<Frame> {
        self.outbound.drain(..).collect()
    }

    fn now(&self) -> Instant {
        self.time_provider.now()
    }

    fn emit(&mut self, event: SessionEvent) {
        self.events.push_back(event);
    }

    fn transition(&mut self, state: State) {
        self.state = state;
        self.emit(SessionEvent::StateChanged(state));
    }

    fn swapped_addresses(&self) -> Vec<Address> {
        vec![self.remote, self.local]
    }

    fn send_u(&mut self, kind: UFrameType, poll_final: bool, command: bool) {
        let frame = Frame {
            addresses: self.swapped_addresses(),
            command,
            modulo128: self.modulus == 128,
            body: FrameBody::Unnumbered {
                kind,
                poll_final,
                pid: None,
                payload: vec![],
            },
            legacy_odd_packet: false,
        };
        self.stats.packets_sent += 1;
        self.outbound.push_back(frame);
    }

    fn send_s(&mut self, kind: SFrameType, poll_final: bool) {
        let frame = Frame {
            addresses: self.swapped_addresses(),
            command: true,
            modulo128: self.modulus == 128,
            body: FrameBody::Supervisory {
                kind,
                nr: self.vr,
                poll_final,
            },
            legacy_odd_packet: false,
        };
        self.stats.packets_sent += 1;
        self.outbound.push_back(frame);
    }

    fn modulus_mask(&self) -> u16 {
        self.modulus - 1
    }

    // ---- local-initiated open / disconnect -------------------------------

    /// Opens the session as the local station, entering the CONNECTING
    /// state.
    pub fn open(&mut self, extended: bool) {
        self.modulus = if extended { 128 } else { 8 };
        self.window_size = self.modulus_mask();
        self.state = State::Connecting;
        self.retry_count = 0;
        let kind = if extended {
            UFrameType::Sabme
        } else {
            UFrameType::Sabm
        };
        self.send_u(kind, true, true);
        self.arm_t1();
        self.emit(SessionEvent::StateChanged(State::Connecting));
    }

    pub fn disconnect(&mut self) {
        if self.state == State::Disconnected {
            return;
        }
        self.state = State::Disconnecting;
        self.retry_count = 0;
        self.send_u(UFrameType::Disc, true, true);
        self.arm_t1();
        self.emit(SessionEvent::StateChanged(State::Disconnecting));
    }

    // ---- outbound user data ------------------------------------------------

    /// Queues `bytes` for transmission, respecting the send window.
    /// `immediate` bypasses any held-back coalescing and pumps the window
    /// synchronously instead of waiting for the next `poll_timers` tick;
    /// functionally both paths enqueue into the same FIFO, so ordering is
    /// identical either way. `immediate=true` only bypasses per-session
    /// coalescing, not inter-session ordering.
    pub fn send(&mut self, bytes: &[u8], immediate: bool) {
        self.outgoing_bytes.extend(bytes.iter().copied());
        if immediate || self.state == State::Connected {
            self.pump_outgoing();
        }
    }

    fn pump_outgoing(&mut self) {
        if self.state != State::Connected || self.peer_busy {
            return;
        }
        while !self.outgoing_bytes.is_empty()
            && (self.window.len() as u16) < self.window_size
        {
            let chunk_len = self.outgoing_bytes.len().min(self.max_payload);
            let chunk: Vec<u8> = self.outgoing_bytes.drain(..chunk_len).collect();
            let ns = self.vs;
            self.vs = (self.vs + 1) & self.modulus_mask();
            let pid = 0xF0;
            self.window.push_back(PendingFrame {
                ns,
                pid,
                payload: chunk.clone(),
            });
            let frame = Frame {
                addresses: self.swapped_addresses(),
                command: true,
                modulo128: self.modulus == 128,
                body: FrameBody::Information {
                    ns,
                    nr: self.vr,
                    poll: false,
                    pid,
                    payload: chunk.clone(),
                },
                legacy_odd_packet: false,
            };
            self.stats.bytes_sent += chunk.len() as u64;
            self.stats.packets_sent += 1;
            self.outbound.push_back(frame);
            self.cancel_t2();
            self.arm_t1();
        }
    }

    // ---- inbound frame processing ------------------------------------------

    pub fn receive(&mut self, frame: &Frame) {
        if frame.source().callsign() != self.remote.callsign()
            || frame.source().ssid() != self.remote.ssid()
        {
            return;
        }
        self.stats.packets_received += 1;
        self.arm_t3();
        match &frame.body {
            FrameBody::Unnumbered {
                kind, poll_final, ..
            } => self.handle_u(*kind, *poll_final, frame),
            FrameBody::Supervisory {
                kind,
                nr,
                poll_final,
            } => self.handle_s(*kind, *nr, *poll_final),
            FrameBody::Information {
                ns,
                nr,
                poll,
                pid,
                payload,
            } => self.handle_i(*ns, *nr, *poll, *pid, payload),
        }
    }

    fn handle_u(&mut self, kind: UFrameType, poll_final: bool, frame: &Frame) {
        match kind {
            UFrameType::Sabm | UFrameType::Sabme => {
                self.modulus = if kind == UFrameType::Sabme { 128 } else { 8 };
                self.window_size = self.modulus_mask();
                self.vs = 0;
                self.vr = 0;
                self.va = 0;
                self.window.clear();
                self.incoming_buffer.clear();
                self.pending_reject = PendingReject::None;
                self.peer_busy = false;
                self.send_u(UFrameType::Ua, poll_final, false);
                self.connect_duration.mark_connected(self.now());
                self.transition(State::Connected);
                self.arm_t3();
                self.cancel_t1();
            }
            UFrameType::Disc => {
                self.send_u(UFrameType::Ua, poll_final, false);
                self.teardown();
            }
            UFrameType::Ua => {
                if self.state == State::Connecting {
                    self.connect_duration.mark_connected(self.now());
                    self.transition(State::Connected);
                    self.cancel_t1();
                    self.arm_t3();
                } else if self.state == State::Disconnecting {
                    self.teardown();
                }
            }
            UFrameType::Dm => {
                if self.state == State::Connecting {
                    self.cancel_t1();
                    self.emit(SessionEvent::Error(SessionError::ConnectionRefused));
                    self.transition(State::Disconnected);
                } else if self.state == State::Disconnecting || self.state == State::Connected {
                    self.teardown();
                }
            }
            UFrameType::Ui => {
                if let FrameBody::Unnumbered {
                    pid: Some(pid),
                    payload,
                    ..
                } = &frame.body
                {
                    self.stats.bytes_received += payload.len() as u64;
                    self.emit(SessionEvent::UiDataReceived {
                        pid: *pid,
                        payload: payload.clone(),
                    });
                }
            }
            UFrameType::Frmr | UFrameType::Xid | UFrameType::Test => {
                trace!(?kind, "ignoring diagnostic U-frame");
            }
        }
    }

    fn teardown(&mut self) {
        self.cancel_t1();
        self.cancel_t2();
        self.cancel_t3();
        self.outgoing_bytes.clear();
        self.window.clear();
        self.incoming_buffer.clear();
        self.transition(State::Disconnected);
    }

    fn handle_s(&mut self, kind: SFrameType, nr: u16, poll_final: bool) {
        if self.state != State::Connected {
            return;
        }
        match kind {
            SFrameType::Rr => {
                self.peer_busy = false;
                self.ack_through(nr);
                if poll_final {
                    self.send_s(SFrameType::Rr, true);
                }
            }
            SFrameType::Rnr => {
                self.peer_busy = true;
                self.ack_through(nr);
                if poll_final {
                    self.send_s(SFrameType::Rr, true);
                }
            }
            SFrameType::Rej => {
                self.peer_busy = false;
                self.ack_through(nr);
                self.resend_from(nr);
            }
            SFrameType::Srej => {
                self.peer_busy = false;
                self.ack_through(nr);
                self.resend_one(nr);
            }
        }
        self.arm_t3();
        self.pump_outgoing();
    }

    fn ack_through(&mut self, nr: u16) {
        while let Some(front) = self.window.front() {
            if front.ns != nr {
                self.window.pop_front();
            } else {
                break;
            }
        }
        self.va = nr;
        if self.window.is_empty() {
            self.cancel_t1();
            self.retry_count = 0;
        } else {
            self.arm_t1();
        }
    }

    fn resend_from(&mut self, from_ns: u16) {
        self.vs = from_ns;
        for pending in self.window.iter() {
            if Self::seq_at_or_after(pending.ns, from_ns, self.modulus) {
                let frame = Frame {
                    addresses: self.swapped_addresses(),
                    command: true,
                    modulo128: self.modulus == 128,
                    body: FrameBody::Information {
                        ns: pending.ns,
                        nr: self.vr,
                        poll: false,
                        pid: pending.pid,
                        payload: pending.payload.clone(),
                    },
                    legacy_odd_packet: false,
                };
                self.stats.packets_sent += 1;
                self.outbound.push_back(frame);
            }
        }
        if !self.window.is_empty() {
            self.vs = self.window.back().unwrap().ns;
            self.vs = (self.vs + 1) & self.modulus_mask();
        }
        self.arm_t1();
    }

    fn resend_one(&mut self, ns: u16) {
        if let Some(pending) = self.window.iter().find(|p| p.ns == ns) {
            let frame = Frame {
                addresses: self.swapped_addresses(),
                command: true,
                modulo128: self.modulus == 128,
                body: FrameBody::Information {
                    ns: pending.ns,
                    nr: self.vr,
                    poll: false,
                    pid: pending.pid,
                    payload: pending.payload.clone(),
                },
                legacy_odd_packet: false,
            };
            self.stats.packets_sent += 1;
            self.outbound.push_back(frame);
        }
        self.arm_t1();
    }

    fn seq_at_or_after(ns: u16, from: u16, modulus: u16) -> bool {
        let diff = ns.wrapping_sub(from) & (modulus - 1);
        diff < modulus
    }

    fn handle_i(&mut self, ns: u16, nr: u16, poll: bool, pid: u8, payload: &[u8]) {
        if self.state != State::Connected {
            return;
        }
        self.ack_through(nr);

        if ns == self.vr {
            self.stats.bytes_received += payload.len() as u64;
            self.emit(SessionEvent::DataReceived(payload.to_vec()));
            self.vr = (self.vr + 1) & self.modulus_mask();
            self.pending_reject = PendingReject::None;

            // Deliver any buffered frames that are now contiguous
            // (SREJ recovery, modulo-128 only).
            while let Some(buffered) = self.incoming_buffer.remove(&self.vr) {
                self.stats.bytes_received += buffered.len() as u64;
                self.emit(SessionEvent::DataReceived(buffered));
                self.vr = (self.vr + 1) & self.modulus_mask();
            }

            if poll {
                self.send_s(SFrameType::Rr, true);
                self.cancel_t2();
            } else {
                self.arm_t2();
            }
        } else if self.modulus == 128 {
            // Out-of-order under SREJ recovery: buffer, request the first
            // missing slot at most once per gap.
            self.incoming_buffer.insert(ns, payload.to_vec());
            if self.pending_reject == PendingReject::None {
                self.pending_reject = PendingReject::Srej(self.vr);
                self.send_s(SFrameType::Srej, poll);
            }
        } else {
            // Go-back-N recovery under modulo-8: discard, REJ once per gap.
            if self.pending_reject == PendingReject::None {
                self.pending_reject = PendingReject::Rej;
                self.send_s(SFrameType::Rej, poll);
            }
        }
        self.pump_outgoing();
    }

    // ---- timers -------------------------------------------------------------

    fn arm_t1(&mut self) {
        self.t1_deadline = Some(self.now() + DEFAULT_T1);
    }

    fn cancel_t1(&mut self) {
        self.t1_deadline = None;
        self.retry_count = 0;
    }

    fn arm_t2(&mut self) {
        self.t2_deadline = Some(self.now() + DEFAULT_T2);
    }

    fn cancel_t2(&mut self) {
        self.t2_deadline = None;
    }

    fn arm_t3(&mut self) {
        self.t3_deadline = Some(self.now() + DEFAULT_T3);
    }

    fn cancel_t3(&mut self) {
        self.t3_deadline = None;
    }

    /// Drives timer-based transitions. Call periodically (e.g. once per
    /// event-loop tick) with the current time.
    pub fn poll_timers(&mut self) {
        let now = self.now();
        if let Some(deadline) = self.t2_deadline {
            if now >= deadline {
                self.cancel_t2();
                self.send_s(SFrameType::Rr, false);
            }
        }
        if let Some(deadline) = self.t1_deadline {
            if now >= deadline {
                self.on_t1_expiry();
            }
        }
        if let Some(deadline) = self.t3_deadline {
            if now >= deadline && self.state == State::Connected {
                self.cancel_t3();
                self.send_s(SFrameType::Rr, true);
                self.arm_t1();
            }
        }
    }

    fn on_t1_expiry(&mut self) {
        self.retry_count += 1;
        if self.retry_count > self.max_retries {
            let err = match self.state {
                State::Connecting => SessionError::ConnectTimedOut,
                State::Disconnecting => SessionError::DisconnectTimedOut,
                _ => SessionError::KeepAliveTimedOut,
            };
            warn!(?err, remote = %self.remote, "T1 retry budget exhausted");
            self.emit(SessionEvent::Error(err));
            self.teardown();
            return;
        }
        debug!(retry = self.retry_count, remote = %self.remote, "T1 expired, retrying");
        match self.state {
            State::Connecting => {
                let kind = if self.modulus == 128 {
                    UFrameType::Sabme
                } else {
                    UFrameType::Sabm
                };
                self.send_u(kind, true, true);
            }
            State::Disconnecting => {
                self.send_u(UFrameType::Disc, true, true);
            }
            State::Connected => {
                if self.window.is_empty() {
                    self.send_s(SFrameType::Rr, true);
                } else {
                    self.resend_from(self.window.front().unwrap().ns);
                }
            }
            State::Disconnected => {}
        }
        self.arm_t1();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeProvider;

    fn addrs() -> (Address, Address) {
        (
            Address::new("W1AW", 0).unwrap(),
            Address::new("KK7VZT", 1).unwrap(),
        )
    }

    fn clock() -> Arc<ManualTimeProvider> {
        Arc::new(ManualTimeProvider::new(Instant::now()))
    }

    #[test]
    fn inbound_sabm_completes_to_connected_and_acks_an_i_frame() {
        let (local, remote) = addrs();
        let clk = clock();
        let mut session = Session::new(local, remote, 1, clk.clone());

        let sabm = Frame {
            addresses: vec![local, remote],
            command: true,
            modulo128: false,
            body: FrameBody::Unnumbered {
                kind: UFrameType::Sabm,
                poll_final: true,
                pid: None,
                payload: vec![],
            },
            legacy_odd_packet: false,
        };
        session.receive(&sabm);
        assert_eq!(session.state(), State::Connected);
        let outbound = session.drain_outbound();
        assert!(matches!(
            outbound[0].body,
            FrameBody::Unnumbered {
                kind: UFrameType::Ua,
                ..
            }
        ));

        let i0 = Frame {
            addresses: vec![local, remote],
            command: true,
            modulo128: false,
            body: FrameBody::Information {
                ns: 0,
                nr: 0,
                poll: true,
                pid: 0xF0,
                payload: b"hi".to_vec(),
            },
            legacy_odd_packet: false,
        };
        session.receive(&i0);
        assert_eq!(session.vr, 1);
        let events = session.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, SessionEvent::DataReceived(p) if p == b"hi")));
        let outbound = session.drain_outbound();
        assert!(matches!(
            outbound[0].body,
            FrameBody::Supervisory {
                kind: SFrameType::Rr,
                nr: 1,
                ..
            }
        ));
    }

    #[test]
    fn modulo128_advances_through_wraparound_without_retransmit() {
        let (local, remote) = addrs();
        let clk = clock();
        let mut session = Session::new(local, remote, 1, clk);
        session.modulus = 128;
        session.window_size = 127;
        session.state = State::Connected;

        for i in 0..127u16 {
            let frame = Frame {
                addresses: vec![local, remote],
                command: true,
                modulo128: true,
                body: FrameBody::Information {
                    ns: i,
                    nr: 0,
                    poll: false,
                    pid: 0xF0,
                    payload: vec![i as u8],
                },
                legacy_odd_packet: false,
            };
            session.receive(&frame);
        }
        assert_eq!(session.vr, 127);
        let events = session.drain_events();
        let received: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::DataReceived(p) => Some(p[0]),
                _ => None,
            })
            .collect();
        assert_eq!(received, (0u8..127).collect::<Vec<_>>());
    }

    #[test]
    fn out_of_order_frame_under_modulo8_yields_exactly_one_rej() {
        let (local, remote) = addrs();
        let clk = clock();
        let mut session = Session::new(local, remote, 1, clk);
        session.state = State::Connected;

        let frame2 = Frame {
            addresses: vec![local, remote],
            command: true,
            modulo128: false,
            body: FrameBody::Information {
                ns: 2,
                nr: 0,
                poll: false,
                pid: 0xF0,
                payload: vec![2],
            },
            legacy_odd_packet: false,
        };
        session.receive(&frame2);
        let outbound = session.drain_outbound();
        let rejs: Vec<_> = outbound
            .iter()
            .filter(|f| matches!(f.body, FrameBody::Supervisory { kind: SFrameType::Rej, .. }))
            .collect();
        assert_eq!(rejs.len(), 1);

        // a second out-of-order frame before recovery must not emit another REJ
        let frame3 = Frame {
            addresses: vec![local, remote],
            command: true,
            modulo128: false,
            body: FrameBody::Information {
                ns: 3,
                nr: 0,
                poll: false,
                pid: 0xF0,
                payload: vec![3],
            },
            legacy_odd_packet: false,
        };
        session.receive(&frame3);
        let outbound = session.drain_outbound();
        assert!(outbound
            .iter()
            .all(|f| !matches!(f.body, FrameBody::Supervisory { kind: SFrameType::Rej, .. })));

        // recovery: frame 0 then frame 1 arrive, then frame 2 should deliver
        // in order once the gap is filled.
        for (ns, byte) in [(0u16, 0u8), (1, 1)] {
            let frame = Frame {
                addresses: vec![local, remote],
                command: true,
                modulo128: false,
                body: FrameBody::Information {
                    ns,
                    nr: 0,
                    poll: false,
                    pid: 0xF0,
                    payload: vec![byte],
                },
                legacy_odd_packet: false,
            };
            session.receive(&frame);
        }
        let events = session.drain_events();
        let received: Vec<_> = events
            .into_iter()
            .filter_map(|e| match e {
                SessionEvent::DataReceived(p) => Some(p[0]),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec![0, 1]);
        assert_eq!(session.vr, 2);
    }

    #[test]
    fn t3_expiry_without_response_errors_out_after_retry_budget() {
        let (local, remote) = addrs();
        let clk = Arc::new(ManualTimeProvider::new(Instant::now()));
        let mut session = Session::new(local, remote, 1, clk.clone());
        session.state = State::Connected;
        session.max_retries = 2;
        session.arm_t3();

        clk.advance(DEFAULT_T3 + Duration::from_millis(1));
        session.poll_timers();
        let outbound = session.drain_outbound();
        assert!(outbound
            .iter()
            .any(|f| matches!(f.body, FrameBody::Supervisory { kind: SFrameType::Rr, poll_final: true, .. })));

        for _ in 0..3 {
            clk.advance(DEFAULT_T1 + Duration::from_millis(1));
            session.poll_timers();
        }
        let events = session.drain_events();
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Error(_))));
        assert_eq!(session.state(), State::Disconnected);
    }
}
