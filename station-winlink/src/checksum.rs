/// Two's-complement checksum over a run of `FC <proposal>\r` bytes: the low
/// byte of the two's complement of the additive sum, rendered as upper-case
/// hex. Casing on receive is compared case-insensitively; casing on send is
/// always upper-case.
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum: u8 = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum.wrapping_neg()
}

pub fn checksum_hex(bytes: &[u8]) -> String {
    format!("{:02X}", checksum(bytes))
}

pub fn checksum_matches(bytes: &[u8], received_hex: &str) -> bool {
    received_hex.eq_ignore_ascii_case(&checksum_hex(bytes))
}
