//! YAPP/YappC wire packets.
//!
//! The control bytes (SOH/STX/ETX/EOT/ENQ/ACK/DLE/NAK/CAN) and the mnemonic
//! exchange (SI/RR/RF/HD/RT/RE/DT/EF/AF/ET/AT/CN/CA) follow the classic YAPP
//! handshake. This module's concrete subtype byte layout is an
//! implementation decision recorded in DESIGN.md: each control byte
//! introduces a packet category, and a one-byte numeric subtype (rather
//! than the mnemonic's second letter) disambiguates within ACK/NAK so
//! there's no ambiguity between e.g. the "ready" acks sent at header time
//! and the "ack file"/"ack transfer" sent later.

pub const SOH: u8 = 0x01;
pub const STX: u8 = 0x02;
pub const ETX: u8 = 0x03;
pub const EOT: u8 = 0x04;
pub const ENQ: u8 = 0x05;
pub const ACK: u8 = 0x06;
pub const DLE: u8 = 0x10;
pub const NAK: u8 = 0x15;
pub const CAN: u8 = 0x18;

pub const ACK_RECEIVER_READY: u8 = 0x00; // RR
pub const ACK_READY_FILE: u8 = 0x01; // RF
pub const ACK_READY_CHECKSUM: u8 = 0x02; // RT
pub const ACK_FILE_DONE: u8 = 0x03; // AF
pub const ACK_TRANSFER_DONE: u8 = 0x04; // AT
pub const NAK_RESUME: u8 = 0x00; // RE
pub const RESUME_CHECKSUM_FLAG: u8 = b'C';

/// Maximum DT payload; a length byte of 0 means 256.
pub const MAX_BLOCK: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let date = (((year.saturating_sub(1980)) & 0x7F) << 9)
            | (((month as u16) & 0x0F) << 5)
            | ((day as u16) & 0x1F);
        let time = (((hour as u16) & 0x1F) << 11)
            | (((minute as u16) & 0x3F) << 5)
            | (((second as u16) / 2) & 0x1F);
        Self { date, time }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Init,
    ReceiverReady,
    ReadyFile,
    ReadyChecksum,
    Header {
        filename: String,
        size: u64,
        dos: Option<DosDateTime>,
    },
    Resume {
        offset: u64,
        checksum: bool,
    },
    Data {
        payload: Vec<u8>,
        checksum: Option<u8>,
    },
    EndFile,
    AckFile,
    EndTransfer,
    AckTransfer,
    Cancel {
        reason: String,
    },
}

impl Packet {
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::Init => vec![ENQ],
            Packet::ReceiverReady => vec![ACK, ACK_RECEIVER_READY],
            Packet::ReadyFile => vec![ACK, ACK_READY_FILE],
            Packet::ReadyChecksum => vec![ACK, ACK_READY_CHECKSUM],
            Packet::Header {
                filename,
                size,
                dos,
            } => {
                let mut out = vec![SOH];
                out.extend_from_slice(filename.as_bytes());
                out.push(0);
                out.extend_from_slice(size.to_string().as_bytes());
                out.push(0);
                if let Some(dos) = dos {
                    out.extend_from_slice(&dos.date.to_be_bytes());
                    out.extend_from_slice(&dos.time.to_be_bytes());
                    out.push(0);
                }
                out
            }
            Packet::Resume { offset, checksum } => {
                let mut out = vec![NAK, NAK_RESUME];
                out.extend_from_slice(offset.to_string().as_bytes());
                if *checksum {
                    out.push(RESUME_CHECKSUM_FLAG);
                }
                out
            }
            Packet::Data { payload, checksum } => {
                let mut out = vec![STX];
                let len_byte = if payload.len() == MAX_BLOCK {
                    0
                } else {
                    payload.len() as u8
                };
                out.push(len_byte);
                out.extend_from_slice(payload);
                if let Some(sum) = checksum {
                    out.push(*sum);
                }
                out
            }
            Packet::EndFile => vec![ETX],
            Packet::AckFile => vec![ACK, ACK_FILE_DONE],
            Packet::EndTransfer => vec![EOT],
            Packet::AckTransfer => vec![ACK, ACK_TRANSFER_DONE],
            Packet::Cancel { reason } => {
                let mut out = vec![CAN];
                out.extend_from_slice(reason.as_bytes());
                out
            }
        }
    }

    /// Decodes exactly one packet from the front of `bytes`, returning the
    /// packet and the number of bytes consumed, or `None` if `bytes` does
    /// not yet hold a complete packet (caller should wait for more data).
    /// `checksum_expected` controls whether a `Data` packet's trailing
    /// checksum byte is parsed (only true once YappC mode is negotiated).
    pub fn decode(bytes: &[u8], checksum_expected: bool) -> Option<(Packet, usize)> {
        let control = *bytes.first()?;
        match control {
            ENQ => Some((Packet::Init, 1)),
            EOT => Some((Packet::EndTransfer, 1)),
            ETX => Some((Packet::EndFile, 1)),
            ACK => {
                let subtype = *bytes.get(1)?;
                let packet = match subtype {
                    ACK_RECEIVER_READY => Packet::ReceiverReady,
                    ACK_READY_FILE => Packet::ReadyFile,
                    ACK_READY_CHECKSUM => Packet::ReadyChecksum,
                    ACK_FILE_DONE => Packet::AckFile,
                    ACK_TRANSFER_DONE => Packet::AckTransfer,
                    _ => return None,
                };
                Some((packet, 2))
            }
            SOH => decode_header(&bytes[1..]).map(|(pkt, n)| (pkt, n + 1)),
            NAK => decode_resume(&bytes[1..]).map(|(pkt, n)| (pkt, n + 1)),
            STX => decode_data(&bytes[1..], checksum_expected).map(|(pkt, n)| (pkt, n + 1)),
            CAN => {
                let reason = String::from_utf8_lossy(&bytes[1..]).into_owned();
                Some((Packet::Cancel { reason }, bytes.len()))
            }
            _ => None,
        }
    }
}

fn decode_header(rest: &[u8]) -> Option<(Packet, usize)> {
    let nul1 = rest.iter().position(|&b| b == 0)?;
    let filename = String::from_utf8_lossy(&rest[..nul1]).into_owned();
    let after_name = &rest[nul1 + 1..];
    let nul2 = after_name.iter().position(|&b| b == 0)?;
    let size_str = std::str::from_utf8(&after_name[..nul2]).ok()?;
    let size: u64 = size_str.parse().ok()?;
    let mut consumed = nul1 + 1 + nul2 + 1;
    let after_size = &after_name[nul2 + 1..];
    let dos = if after_size.len() >= 5 && after_size[4] == 0 {
        let date = u16::from_be_bytes([after_size[0], after_size[1]]);
        let time = u16::from_be_bytes([after_size[2], after_size[3]]);
        consumed += 5;
        Some(DosDateTime { date, time })
    } else {
        None
    };
    Some((
        Packet::Header {
            filename,
            size,
            dos,
        },
        consumed,
    ))
}

fn decode_resume(rest: &[u8]) -> Option<(Packet, usize)> {
    if rest.is_empty() {
        return None;
    }
    let _subtype = rest[0];
    let digits_end = rest[1..]
        .iter()
        .position(|&b| !b.is_ascii_digit())
        .map(|p| p + 1)
        .unwrap_or(rest.len());
    let offset: u64 = std::str::from_utf8(&rest[1..digits_end]).ok()?.parse().ok()?;
    let checksum = rest.get(digits_end) == Some(&RESUME_CHECKSUM_FLAG);
    let consumed = digits_end + if checksum { 1 } else { 0 };
    Some((Packet::Resume { offset, checksum }, consumed))
}

fn decode_data(rest: &[u8], checksum_expected: bool) -> Option<(Packet, usize)> {
    let len_byte = *rest.first()?;
    let len = if len_byte == 0 { MAX_BLOCK } else { len_byte as usize };
    let payload = rest.get(1..1 + len)?.to_vec();
    let mut consumed = 1 + len;
    let checksum = if checksum_expected {
        let sum = *rest.get(1 + len)?;
        consumed += 1;
        Some(sum)
    } else {
        None
    };
    Some((Packet::Data { payload, checksum }, consumed))
}

/// Additive checksum mod 256 used by YappC data blocks.
pub fn block_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_with_dos_datetime() {
        let pkt = Packet::Header {
            filename: "manual.txt".into(),
            size: 12345,
            dos: Some(DosDateTime::new(2024, 3, 14, 9, 26, 54)),
        };
        let wire = pkt.encode();
        let (decoded, consumed) = Packet::decode(&wire, false).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn data_block_checksum_round_trips() {
        let payload = vec![1, 2, 3, 4];
        let checksum = block_checksum(&payload);
        let pkt = Packet::Data {
            payload: payload.clone(),
            checksum: Some(checksum),
        };
        let wire = pkt.encode();
        let (decoded, _) = Packet::decode(&wire, true).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn resume_with_checksum_flag_round_trips() {
        let pkt = Packet::Resume {
            offset: 4096,
            checksum: true,
        };
        let wire = pkt.encode();
        let (decoded, consumed) = Packet::decode(&wire, false).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn zero_length_byte_means_256() {
        let payload = vec![7u8; 256];
        let pkt = Packet::Data {
            payload: payload.clone(),
            checksum: None,
        };
        let wire = pkt.encode();
        assert_eq!(wire[1], 0);
        let (decoded, consumed) = Packet::decode(&wire, false).unwrap();
        assert_eq!(consumed, wire.len());
        match decoded {
            Packet::Data { payload: p, .. } => assert_eq!(p, payload),
            _ => panic!("expected data packet"),
        }
    }
}
