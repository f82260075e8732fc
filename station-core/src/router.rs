use crate::config::Config;
use ax25_proto::{Frame, FrameBody};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    Bbs,
    Echo,
    WinLink,
}

const APRS_PID: u8 = 0xF0;

/// True for a UI frame carrying APRS payload (PID 0xF0), which bypasses
/// per-SSID routing entirely and goes straight to the APRS handler.
pub fn is_aprs_frame(frame: &Frame) -> bool {
    matches!(&frame.body, FrameBody::Unnumbered { pid: Some(pid), .. } if *pid == APRS_PID)
}

/// Routes a non-APRS frame addressed to our callsign onto the enabled
/// server whose SSID matches the destination address. Returns `None` if
/// the frame is not addressed to us or matches no enabled station id; the
/// routing decision is final, there is no fallthrough.
pub fn route(frame: &Frame, our_callsign: &str, config: &Config) -> Option<RouteTarget> {
    let dest = frame.destination();
    if !dest.callsign().eq_ignore_ascii_case(our_callsign) {
        return None;
    }
    let ssid = dest.ssid();
    if config.bbs_station_id == Some(ssid) {
        return Some(RouteTarget::Bbs);
    }
    if config.echo_station_id == Some(ssid) {
        return Some(RouteTarget::Echo);
    }
    if config.winlink_station_id == Some(ssid) {
        return Some(RouteTarget::WinLink);
    }
    None
}
