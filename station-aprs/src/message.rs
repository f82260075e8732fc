/// Left-justifies and space-pads an addressee to the 9-column field APRS
/// message frames require.
fn pad_addressee(addressee: &str) -> String {
    format!("{addressee:<9}")
}

/// Builds an outgoing message frame: `:ADDRESSEE :TEXT}TOKEN{SEQ`, or
/// `:ADDRESSEE :TEXT{SEQ` when `token` is `None`.
pub fn build_message(addressee: &str, text: &str, seq: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!(":{}:{text}}}{token}{{{seq}", pad_addressee(addressee)),
        None => format!(":{}:{text}{{{seq}", pad_addressee(addressee)),
    }
}

/// Builds an ack frame: `:ADDRESSEE :ackSEQ}TOKEN`, or `:ADDRESSEE :ackSEQ`
/// when `token` is `None`.
pub fn build_ack(addressee: &str, seq: &str, token: Option<&str>) -> String {
    match token {
        Some(token) => format!(":{}:ack{seq}}}{token}", pad_addressee(addressee)),
        None => format!(":{}:ack{seq}", pad_addressee(addressee)),
    }
}
