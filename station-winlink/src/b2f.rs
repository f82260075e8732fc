use crate::checksum;
use crate::proposal::{build_fs_line, Proposal, ProposalResponse};
use crate::secure_login::SecureLoginResponder;
use rand::Rng;

const GREETING_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitAuth,
    AwaitProposals,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum B2fOutcome {
    /// Send this text back to the peer; the session continues.
    Reply(String),
    /// The `;PR:` response did not match; tear the session down.
    AuthFailed,
    /// The `F>` checksum did not match the accumulated `FC` lines.
    ChecksumMismatch,
    /// The peer sent `FQ`; the exchange is over.
    Closed,
    /// Line consumed, nothing to send back yet.
    Continue,
}

/// Local B2F endpoint: authenticates the peer (if a password is
/// configured), then collects `FC` proposals until an `F>` checksum line,
/// verifying it against the accumulated proposal bytes before replying
/// with accept/reject letters.
pub struct B2fServer<R: SecureLoginResponder> {
    password: Option<String>,
    challenge: Option<String>,
    responder: R,
    state: State,
    pending_proposals: Vec<Proposal>,
    fc_bytes: Vec<u8>,
}

impl<R: SecureLoginResponder> B2fServer<R> {
    pub fn new(password: Option<String>, responder: R) -> Self {
        let challenge = password
            .as_ref()
            .map(|_| format!("{:08}", rand::thread_rng().gen_range(0..100_000_000u32)));
        let state = if password.is_some() {
            State::AwaitAuth
        } else {
            State::AwaitProposals
        };
        Self {
            password,
            challenge,
            responder,
            state,
            pending_proposals: Vec::new(),
            fc_bytes: Vec::new(),
        }
    }

    /// The capability/challenge banner sent immediately on connect.
    pub fn greeting(&self) -> String {
        let mut out = format!("[HTCmd-{GREETING_VERSION}-B2FWIHJM$]\r");
        if let Some(challenge) = &self.challenge {
            out.push_str(&format!(";PQ: {challenge}\r"));
        }
        out.push('>');
        out
    }

    /// Feeds one line of input. `mid_known` reports whether a proposed
    /// message id is already held locally, the only input this module
    /// needs from the mail store to decide accept vs reject.
    pub fn on_line(&mut self, line: &str, mid_known: &dyn Fn(&str) -> bool) -> B2fOutcome {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        match self.state {
            State::AwaitAuth => {
                if let Some(response) = trimmed.strip_prefix(";PR: ") {
                    let expected = self
                        .responder
                        .respond(self.challenge.as_deref().unwrap_or(""), self.password.as_deref().unwrap_or(""));
                    if response == expected {
                        self.state = State::AwaitProposals;
                        B2fOutcome::Continue
                    } else {
                        self.state = State::Done;
                        B2fOutcome::AuthFailed
                    }
                } else {
                    B2fOutcome::Continue
                }
            }
            State::AwaitProposals => {
                if trimmed.starts_with("FQ") {
                    self.state = State::Done;
                    return B2fOutcome::Closed;
                }
                if let Some(proposal) = Proposal::parse(trimmed) {
                    self.fc_bytes.extend_from_slice(proposal.to_fc_line().as_bytes());
                    self.pending_proposals.push(proposal);
                    return B2fOutcome::Continue;
                }
                if let Some(hh) = trimmed.strip_prefix("F> ") {
                    if !checksum::checksum_matches(&self.fc_bytes, hh) {
                        self.state = State::Done;
                        return B2fOutcome::ChecksumMismatch;
                    }
                    let responses: Vec<ProposalResponse> = self
                        .pending_proposals
                        .iter()
                        .map(|p| {
                            if mid_known(&p.mid) {
                                ProposalResponse::Reject
                            } else {
                                ProposalResponse::Accept
                            }
                        })
                        .collect();
                    let reply = build_fs_line(&responses);
                    self.fc_bytes.clear();
                    self.pending_proposals.clear();
                    return B2fOutcome::Reply(reply);
                }
                B2fOutcome::Continue
            }
            State::Done => B2fOutcome::Closed,
        }
    }
}
