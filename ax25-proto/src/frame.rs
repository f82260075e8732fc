use crate::address::Address;
use crate::error::{CodecError, CodecResult};

/// The three U-frame control values that carry an information payload
/// alongside the control byte: UI does (PID + data); the rest are bare
/// supervisory exchanges.
const UI: u8 = 0x03;
const DISC: u8 = 0x43;
const DM: u8 = 0x0F;
const SABM: u8 = 0x2F;
const UA: u8 = 0x63;
const FRMR: u8 = 0x87;
const XID: u8 = 0xAF;
const TEST: u8 = 0xE3;
const SABME: u8 = 0x6F;

const PF_BIT: u8 = 0x10;
const U_TYPE_MASK: u8 = 0xEF; // clears the P/F bit, keeps the modifier bits

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UFrameType {
    Sabm,
    Sabme,
    Disc,
    Dm,
    Ua,
    Frmr,
    Ui,
    Xid,
    Test,
}

impl UFrameType {
    fn from_control(control: u8) -> CodecResult<Self> {
        match control & U_TYPE_MASK {
            SABM => Ok(Self::Sabm),
            SABME => Ok(Self::Sabme),
            DISC => Ok(Self::Disc),
            DM => Ok(Self::Dm),
            UA => Ok(Self::Ua),
            FRMR => Ok(Self::Frmr),
            UI => Ok(Self::Ui),
            XID => Ok(Self::Xid),
            TEST => Ok(Self::Test),
            _ => Err(CodecError::UnknownUFrameType),
        }
    }

    fn to_control(self) -> u8 {
        match self {
            Self::Sabm => SABM,
            Self::Sabme => SABME,
            Self::Disc => DISC,
            Self::Dm => DM,
            Self::Ua => UA,
            Self::Frmr => FRMR,
            Self::Ui => UI,
            Self::Xid => XID,
            Self::Test => TEST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SFrameType {
    Rr,
    Rnr,
    Rej,
    Srej,
}

impl SFrameType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::Rr,
            0b01 => Self::Rnr,
            0b10 => Self::Rej,
            _ => Self::Srej,
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Self::Rr => 0b00,
            Self::Rnr => 0b01,
            Self::Rej => 0b10,
            Self::Srej => 0b11,
        }
    }
}

/// The parsed body of an AX.25 frame: everything past the address chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBody {
    Information {
        ns: u16,
        nr: u16,
        poll: bool,
        pid: u8,
        payload: Vec<u8>,
    },
    Supervisory {
        kind: SFrameType,
        nr: u16,
        poll_final: bool,
    },
    Unnumbered {
        kind: UFrameType,
        poll_final: bool,
        /// Present (possibly empty) only for UI; `None` for the rest.
        pid: Option<u8>,
        payload: Vec<u8>,
    },
}

/// A fully decoded AX.25 frame: address chain plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub addresses: Vec<Address>,
    /// Derived from CRBit1 of the first address (destination).
    pub command: bool,
    /// Derived from CRBit2 of the second address (source); selects the
    /// control-field width (1 byte modulo-8, 2 bytes modulo-128).
    pub modulo128: bool,
    pub body: FrameBody,
    /// Set only for frames decoded from the legacy "odd packet" shape
    /// (leading 0x01, three length-prefixed sections). Emitters must never
    /// produce this shape; it exists purely so a decoder that sees one
    /// doesn't have to invent a second Frame variant. See DESIGN.md.
    pub legacy_odd_packet: bool,
}

impl Frame {
    pub fn destination(&self) -> &Address {
        &self.addresses[0]
    }

    pub fn source(&self) -> &Address {
        &self.addresses[1]
    }

    /// Decodes a raw TNC fragment into a frame. Never panics; malformed
    /// input yields `None` instead of throwing.
    pub fn decode(fragment: &[u8]) -> Option<Frame> {
        if fragment.first() == Some(&0x01) {
            if let Some(frame) = decode_odd_packet(fragment) {
                return Some(frame);
            }
        }
        decode_standard(fragment).ok()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 + self.payload_len());
        for (i, addr) in self.addresses.iter().enumerate() {
            let last = i + 1 == self.addresses.len();
            let mut a = *addr;
            if i == 0 {
                a.cr_bit1 = self.command;
            }
            if i == 1 {
                a.cr_bit2 = self.modulo128;
            }
            out.extend_from_slice(&a.encode(last));
        }
        match &self.body {
            FrameBody::Information {
                ns,
                nr,
                poll,
                pid,
                payload,
            } => {
                encode_control_i(&mut out, *ns, *nr, *poll, self.modulo128);
                out.push(*pid);
                out.extend_from_slice(payload);
            }
            FrameBody::Supervisory {
                kind,
                nr,
                poll_final,
            } => {
                encode_control_s(&mut out, *kind, *nr, *poll_final, self.modulo128);
            }
            FrameBody::Unnumbered {
                kind,
                poll_final,
                pid,
                payload,
            } => {
                let mut control = kind.to_control();
                if *poll_final {
                    control |= PF_BIT;
                }
                out.push(control);
                if let Some(pid) = pid {
                    out.push(*pid);
                    out.extend_from_slice(payload);
                }
            }
        }
        out
    }

    fn payload_len(&self) -> usize {
        match &self.body {
            FrameBody::Information { payload, .. } => payload.len(),
            FrameBody::Unnumbered { payload, .. } => payload.len(),
            FrameBody::Supervisory { .. } => 0,
        }
    }
}

fn encode_control_i(out: &mut Vec<u8>, ns: u16, nr: u16, poll: bool, modulo128: bool) {
    if modulo128 {
        let low = ((ns as u8 & 0x7F) << 1) & 0xFE;
        let high = ((poll as u8) & 0x01) | ((nr as u8 & 0x7F) << 1);
        out.push(low);
        out.push(high);
    } else {
        let byte = ((nr as u8 & 0x07) << 5) | ((poll as u8) << 4) | ((ns as u8 & 0x07) << 1);
        out.push(byte);
    }
}

fn encode_control_s(out: &mut Vec<u8>, kind: SFrameType, nr: u16, pf: bool, modulo128: bool) {
    if modulo128 {
        let low = 0b01 | (kind.to_bits() << 2);
        let high = ((pf as u8) & 0x01) | ((nr as u8 & 0x7F) << 1);
        out.push(low);
        out.push(high);
    } else {
        let byte = ((nr as u8 & 0x07) << 5) | ((pf as u8) << 4) | (kind.to_bits() << 2) | 0b01;
        out.push(byte);
    }
}

fn decode_standard(fragment: &[u8]) -> CodecResult<Frame> {
    let mut addresses = Vec::new();
    let mut offset = 0usize;
    loop {
        let (addr, last) = Address::decode(fragment, offset)?;
        addresses.push(addr);
        offset += 7;
        if last {
            break;
        }
        if offset >= fragment.len() {
            return Err(CodecError::Truncated);
        }
    }
    if addresses.len() < 2 {
        return Err(CodecError::TooFewAddresses);
    }
    let command = addresses[0].cr_bit1;
    let modulo128 = addresses[1].cr_bit2;

    let first = *fragment.get(offset).ok_or(CodecError::ControlTruncated)?;
    let body = if first & 0b11 == 0b11 {
        let kind = UFrameType::from_control(first)?;
        let poll_final = first & PF_BIT != 0;
        offset += 1;
        if kind == UFrameType::Ui {
            let pid = *fragment.get(offset).ok_or(CodecError::MissingPid)?;
            offset += 1;
            FrameBody::Unnumbered {
                kind,
                poll_final,
                pid: Some(pid),
                payload: fragment[offset..].to_vec(),
            }
        } else {
            FrameBody::Unnumbered {
                kind,
                poll_final,
                pid: None,
                payload: fragment[offset..].to_vec(),
            }
        }
    } else if first & 0x01 == 1 {
        if modulo128 {
            let second = *fragment.get(offset + 1).ok_or(CodecError::ControlTruncated)?;
            let kind = SFrameType::from_bits(first >> 2);
            let nr = (second >> 1) as u16 & 0x7F;
            let pf = second & 0x01 != 0;
            offset += 2;
            let _ = offset;
            FrameBody::Supervisory {
                kind,
                nr,
                poll_final: pf,
            }
        } else {
            let kind = SFrameType::from_bits(first >> 2);
            let nr = (first >> 5) as u16 & 0x07;
            let pf = first & PF_BIT != 0;
            FrameBody::Supervisory {
                kind,
                nr,
                poll_final: pf,
            }
        }
    } else if modulo128 {
        let second = *fragment.get(offset + 1).ok_or(CodecError::ControlTruncated)?;
        let ns = (first >> 1) as u16 & 0x7F;
        let poll = second & 0x01 != 0;
        let nr = (second >> 1) as u16 & 0x7F;
        let pid = *fragment.get(offset + 2).ok_or(CodecError::MissingPid)?;
        FrameBody::Information {
            ns,
            nr,
            poll,
            pid,
            payload: fragment[offset + 3..].to_vec(),
        }
    } else {
        let ns = (first >> 1) as u16 & 0x07;
        let poll = first & PF_BIT != 0;
        let nr = (first >> 5) as u16 & 0x07;
        let pid = *fragment.get(offset + 1).ok_or(CodecError::MissingPid)?;
        FrameBody::Information {
            ns,
            nr,
            poll,
            pid,
            payload: fragment[offset + 2..].to_vec(),
        }
    };

    Ok(Frame {
        addresses,
        command,
        modulo128,
        body,
        legacy_odd_packet: false,
    })
}

/// Recognizes the legacy "odd packet" shape: a leading 0x01 marker followed
/// by three length-prefixed byte sections. Interop-only.
/// Layout (decision recorded in DESIGN.md): section 0 is a single bare
/// 7-byte address (no end-of-chain validation — it is always treated as the
/// lone, terminal address), section 1 is ignored legacy framing metadata,
/// and section 2 is the payload with its trailing byte dropped.
fn decode_odd_packet(fragment: &[u8]) -> Option<Frame> {
    let mut offset = 1usize;
    let mut sections: [&[u8]; 3] = [&[], &[], &[]];
    for slot in sections.iter_mut() {
        let len = *fragment.get(offset)? as usize;
        offset += 1;
        let section = fragment.get(offset..offset + len)?;
        offset += len;
        *slot = section;
    }
    if sections[0].len() != 7 {
        return None;
    }
    let mut addr_bytes = [0u8; 7];
    addr_bytes.copy_from_slice(sections[0]);
    // Force the end-of-chain bit: this shape only ever carries one address.
    addr_bytes[6] |= 0x01;
    let (addr, _) = Address::decode(&addr_bytes, 0).ok()?;

    let payload = sections[2];
    let payload = if payload.is_empty() {
        &[]
    } else {
        &payload[..payload.len() - 1]
    };

    Some(Frame {
        addresses: vec![addr],
        command: addr.cr_bit1,
        modulo128: false,
        body: FrameBody::Unnumbered {
            kind: UFrameType::Ui,
            poll_final: false,
            pid: Some(0xF0),
            payload: payload.to_vec(),
        },
        legacy_odd_packet: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_addrs() -> Vec<Address> {
        vec![
            Address::new("KK7VZT", 0).unwrap(),
            Address::new("W1AW", 1).unwrap(),
        ]
    }

    #[test]
    fn round_trips_a_ui_frame_modulo8() {
        let frame = Frame {
            addresses: two_addrs(),
            command: true,
            modulo128: false,
            body: FrameBody::Unnumbered {
                kind: UFrameType::Ui,
                poll_final: false,
                pid: Some(0xF0),
                payload: b"hello".to_vec(),
            },
            legacy_odd_packet: false,
        };
        let wire = frame.encode();
        let decoded = Frame::decode(&wire).expect("decodes");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trips_an_i_frame_modulo128() {
        let frame = Frame {
            addresses: two_addrs(),
            command: false,
            modulo128: true,
            body: FrameBody::Information {
                ns: 100,
                nr: 50,
                poll: true,
                pid: 0xF0,
                payload: b"payload bytes".to_vec(),
            },
            legacy_odd_packet: false,
        };
        let wire = frame.encode();
        let decoded = Frame::decode(&wire).expect("decodes");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn round_trips_sabm() {
        let frame = Frame {
            addresses: two_addrs(),
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
        let wire = frame.encode();
        let decoded = Frame::decode(&wire).expect("decodes");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn rejects_truncated_control_byte() {
        let addr0 = Address::new("KK7VZT", 0).unwrap().encode(false);
        let addr1 = Address::new("W1AW", 1).unwrap().encode(true);
        let mut wire = Vec::new();
        wire.extend_from_slice(&addr0);
        wire.extend_from_slice(&addr1);
        assert!(Frame::decode(&wire).is_none());
    }

    #[test]
    fn emitters_never_produce_the_odd_packet_shape() {
        let frame = Frame {
            addresses: two_addrs(),
            command: true,
            modulo128: false,
            body: FrameBody::Unnumbered {
                kind: UFrameType::Ui,
                poll_final: false,
                pid: Some(0xF0),
                payload: b"x".to_vec(),
            },
            legacy_odd_packet: false,
        };
        assert_ne!(frame.encode()[0], 0x01);
    }

    #[test]
    fn decodes_a_legacy_odd_packet() {
        let mut wire = vec![0x01u8];
        let addr = Address::new("N0CALL", 0).unwrap().encode(false);
        wire.push(7);
        wire.extend_from_slice(&addr);
        wire.push(0);
        wire.push(3);
        wire.extend_from_slice(&[b'h', b'i', 0]);
        let decoded = Frame::decode(&wire).expect("decodes odd packet");
        assert!(decoded.legacy_odd_packet);
        match decoded.body {
            FrameBody::Unnumbered { payload, .. } => assert_eq!(payload, b"hi"),
            _ => panic!("expected unnumbered body"),
        }
    }
}
