/// One `FC` line: `FC EM <mid> <uncompressed bytes> <compressed bytes> 0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub mid: String,
    pub uncompressed_len: u64,
    pub compressed_len: u64,
}

impl Proposal {
    pub fn new(mid: impl Into<String>, uncompressed_len: u64, compressed_len: u64) -> Self {
        Self {
            mid: mid.into(),
            uncompressed_len,
            compressed_len,
        }
    }

    /// Renders the `FC <proposal>\r` line this proposal contributes to the
    /// checksum run.
    pub fn to_fc_line(&self) -> String {
        format!("FC EM {} {} {} 0\r", self.mid, self.uncompressed_len, self.compressed_len)
    }

    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let rest = line.strip_prefix("FC EM ")?;
        let mut parts = rest.split_whitespace();
        let mid = parts.next()?.to_string();
        let uncompressed_len = parts.next()?.parse().ok()?;
        let compressed_len = parts.next()?.parse().ok()?;
        Some(Self {
            mid,
            uncompressed_len,
            compressed_len,
        })
    }
}

/// A single-letter proposal response: accept, reject (already held), defer
/// to a later session, or abort the whole exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalResponse {
    Accept,
    Reject,
    Defer,
    Abort,
}

impl ProposalResponse {
    pub fn letter(self) -> char {
        match self {
            ProposalResponse::Accept => 'Y',
            ProposalResponse::Reject => 'N',
            ProposalResponse::Defer => 'L',
            ProposalResponse::Abort => 'A',
        }
    }

    /// Normalizes the synonym letters some WinLink peers send in place of
    /// the canonical Y/N/L/A: `+` for accept, `R`/`-` for reject, `=`/`H`
    /// for defer, `!` for abort.
    pub fn parse(letter: char) -> Option<Self> {
        match letter {
            'Y' | '+' => Some(ProposalResponse::Accept),
            'N' | 'R' | '-' => Some(ProposalResponse::Reject),
            'L' | '=' | 'H' => Some(ProposalResponse::Defer),
            'A' | '!' => Some(ProposalResponse::Abort),
            _ => None,
        }
    }
}

/// Parses an `FS <letters>` response line into one response per proposal
/// sent, in order. Digits following a letter (e.g. resume-offset hints some
/// peers append) extend that letter's response rather than starting a new
/// one, so they are folded in rather than rejected.
pub fn parse_fs_line(line: &str) -> Option<Vec<ProposalResponse>> {
    let rest = line.trim().strip_prefix("FS ")?;
    let mut responses = Vec::new();
    for ch in rest.chars() {
        if ch.is_ascii_digit() {
            if responses.is_empty() {
                return None;
            }
            continue;
        }
        responses.push(ProposalResponse::parse(ch)?);
    }
    Some(responses)
}

pub fn build_fs_line(responses: &[ProposalResponse]) -> String {
    let letters: String = responses.iter().map(|r| r.letter()).collect();
    format!("FS {letters}\r")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_proposal_line() {
        let proposal = Proposal::new("ABC123", 100, 80);
        let line = proposal.to_fc_line();
        assert_eq!(line, "FC EM ABC123 100 80 0\r");
        assert_eq!(Proposal::parse(&line), Some(proposal));
    }

    #[test]
    fn normalizes_response_synonyms() {
        assert_eq!(ProposalResponse::parse('+'), Some(ProposalResponse::Accept));
        assert_eq!(ProposalResponse::parse('R'), Some(ProposalResponse::Reject));
        assert_eq!(ProposalResponse::parse('-'), Some(ProposalResponse::Reject));
        assert_eq!(ProposalResponse::parse('='), Some(ProposalResponse::Defer));
        assert_eq!(ProposalResponse::parse('H'), Some(ProposalResponse::Defer));
        assert_eq!(ProposalResponse::parse('!'), Some(ProposalResponse::Abort));
    }

    #[test]
    fn parses_fs_line_with_multiple_letters() {
        let responses = parse_fs_line("FS YNY\r").unwrap();
        assert_eq!(
            responses,
            vec![ProposalResponse::Accept, ProposalResponse::Reject, ProposalResponse::Accept]
        );
        assert_eq!(build_fs_line(&responses), "FS YNY\r");
    }

    #[test]
    fn folds_intervening_digits_into_preceding_response() {
        let responses = parse_fs_line("FS Y2N\r").unwrap();
        assert_eq!(responses, vec![ProposalResponse::Accept, ProposalResponse::Reject]);
    }
}
