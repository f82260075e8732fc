/// APRS data-type classification, one entry per leading payload byte (the
/// APRS data type identifier), with position reports split by whether the
/// station is timestamped and whether it advertises messaging capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Message,
    Position,
    PositionMsg,
    PositionTime,
    PositionTimeMsg,
    Weather,
    Status,
    Telemetry,
    Object,
    Item,
    Other,
}

pub fn classify(payload: &str) -> PacketKind {
    match payload.as_bytes().first() {
        Some(b':') => PacketKind::Message,
        Some(b'!') => PacketKind::Position,
        Some(b'=') => PacketKind::PositionMsg,
        Some(b'/') => PacketKind::PositionTime,
        Some(b'@') => PacketKind::PositionTimeMsg,
        Some(b'_') => PacketKind::Weather,
        Some(b'>') => PacketKind::Status,
        Some(b'T') => PacketKind::Telemetry,
        Some(b';') => PacketKind::Object,
        Some(b')') => PacketKind::Item,
        _ => PacketKind::Other,
    }
}

/// A parsed APRS message frame: `:ADDRESSEE :TEXT{SEQ`, optionally carrying
/// an authentication token (`}TOKEN` before the sequence) or being an ack
/// (`:ackSEQ`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessage {
    pub addressee: String,
    pub text: String,
    pub seq: Option<String>,
    pub token: Option<String>,
    pub is_ack: bool,
}

/// Parses a `Message`-classified payload. Returns `None` if the payload
/// does not have the 10-byte `:ADDRESSEE :` header APRS messages require.
pub fn parse_message(payload: &str) -> Option<ParsedMessage> {
    if payload.as_bytes().first() != Some(&b':') || payload.len() < 11 {
        return None;
    }
    let addressee = payload[1..10].trim_end().to_string();
    if payload.as_bytes().get(10) != Some(&b':') {
        return None;
    }
    let rest = &payload[11..];

    let (body, seq) = match rest.find('{') {
        Some(idx) => (&rest[..idx], Some(rest[idx + 1..].to_string())),
        None => (rest, None),
    };

    let (text_or_ack, token) = match body.find('}') {
        Some(idx) => {
            let before = &body[..idx];
            let after = &body[idx + 1..];
            (before, Some(after.to_string()))
        }
        None => (body, None),
    };

    if let Some(ack_seq) = text_or_ack.strip_prefix("ack") {
        return Some(ParsedMessage {
            addressee,
            text: String::new(),
            seq: Some(ack_seq.to_string()),
            token,
            is_ack: true,
        });
    }

    Some(ParsedMessage {
        addressee,
        text: text_or_ack.to_string(),
        seq,
        token,
        is_ack: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_all_known_data_types() {
        assert_eq!(classify(":CALL     :hi"), PacketKind::Message);
        assert_eq!(classify("!4903.50N/07201.75W-"), PacketKind::Position);
        assert_eq!(classify("=4903.50N/07201.75W-"), PacketKind::PositionMsg);
        assert_eq!(classify("/092345z4903.50N/07201.75W>"), PacketKind::PositionTime);
        assert_eq!(classify("@092345z4903.50N/07201.75W>"), PacketKind::PositionTimeMsg);
        assert_eq!(classify("_weather"), PacketKind::Weather);
        assert_eq!(classify(">status"), PacketKind::Status);
        assert_eq!(classify("Ttelemetry"), PacketKind::Telemetry);
        assert_eq!(classify(";object"), PacketKind::Object);
        assert_eq!(classify(")item"), PacketKind::Item);
        assert_eq!(classify("#other"), PacketKind::Other);
    }

    #[test]
    fn parses_plain_message_with_sequence() {
        let parsed = parse_message(":W1AW     :hello{007").unwrap();
        assert_eq!(parsed.addressee, "W1AW");
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.seq, Some("007".to_string()));
        assert!(!parsed.is_ack);
        assert!(parsed.token.is_none());
    }

    #[test]
    fn parses_authenticated_message() {
        let parsed = parse_message(":W1AW     :hello}ABCDEF{007").unwrap();
        assert_eq!(parsed.text, "hello");
        assert_eq!(parsed.token, Some("ABCDEF".to_string()));
        assert_eq!(parsed.seq, Some("007".to_string()));
    }

    #[test]
    fn parses_ack() {
        let parsed = parse_message(":W1AW     :ack007").unwrap();
        assert!(parsed.is_ack);
        assert_eq!(parsed.seq, Some("007".to_string()));
    }
}
