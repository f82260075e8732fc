use crate::config::Config;
use crate::registry::{ServerKind, SessionRegistry};
use crate::router::{is_aprs_frame, route, RouteTarget};
use ax25_proto::{Frame, FrameBody, UFrameType};

/// The single point a radio transport is called back on to emit bytes; a
/// real implementation wires this to the transport's `sendTncFrame`.
pub trait OutboundSink {
    fn send_tnc_frame(&self, channel_id: &str, data: &[u8]);
}

/// What the caller owning the actual BBS/Echo/WinLink/APRS servers must do
/// in response to one inbound TNC fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Hand `frame` to the named server; the session is (or remains)
    /// registered to that remote callsign.
    Routed { target: RouteTarget, frame: Frame },
    /// An APRS UI frame; skip routing entirely and give it to the APRS
    /// handler.
    Aprs(Frame),
    /// A second server kind tried to claim a callsign already owned by
    /// another kind; send `dm_frame` back to the peer and do not create a
    /// session.
    Rejected { target: RouteTarget, dm_frame: Vec<u8> },
    /// Addressed to us but no enabled station id matches the destination
    /// SSID, or not addressed to us at all.
    Unroutable,
    /// The fragment did not decode as an AX.25 frame.
    Undecodable,
}

fn build_dm(frame: &Frame) -> Vec<u8> {
    let reply = Frame {
        addresses: vec![*frame.source(), *frame.destination()],
        command: false,
        modulo128: frame.modulo128,
        body: FrameBody::Unnumbered {
            kind: UFrameType::Dm,
            poll_final: true,
            pid: None,
            payload: Vec::new(),
        },
        legacy_odd_packet: false,
    };
    reply.encode()
}

fn server_kind(target: RouteTarget) -> ServerKind {
    match target {
        RouteTarget::Bbs => ServerKind::Bbs,
        RouteTarget::Echo => ServerKind::Echo,
        RouteTarget::WinLink => ServerKind::WinLink,
    }
}

/// Wires the packet router and session registry onto one radio channel and
/// callsign. `dispatch_inbound_fragment` is the single entry point a
/// transport calls with each raw TNC fragment it receives.
pub struct Station {
    config: Config,
    registry: SessionRegistry,
}

impl Station {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registry: SessionRegistry::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn dispatch_inbound_fragment(&self, fragment: &[u8]) -> DispatchOutcome {
        let Some(frame) = Frame::decode(fragment) else {
            return DispatchOutcome::Undecodable;
        };
        if is_aprs_frame(&frame) {
            return DispatchOutcome::Aprs(frame);
        }
        match route(&frame, &self.config.callsign, &self.config) {
            Some(target) => {
                let kind = server_kind(target);
                let remote = frame.source().to_string();
                if self.registry.can_create_session(&remote, kind) {
                    self.registry.register(&remote, kind);
                    DispatchOutcome::Routed { target, frame }
                } else {
                    DispatchOutcome::Rejected {
                        target,
                        dm_frame: build_dm(&frame),
                    }
                }
            }
            None => DispatchOutcome::Unroutable,
        }
    }
}
