//! Staleness guards for asynchronous lookups.
//!
//! Every lookup an input field starts gets a fresh [`RequestToken`]. A
//! completion is only applied when its token is still the latest one issued
//! for that field; editing the field invalidates whatever is outstanding.

use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenGate {
    issued: u64,
    latest: Option<RequestToken>,
}

impl TokenGate {
    pub fn issue(&mut self) -> RequestToken {
        self.issued += 1;
        let token = RequestToken(self.issued);
        self.latest = Some(token);
        trace!(token = token.0, "issued request token");
        token
    }

    pub fn invalidate(&mut self) {
        if let Some(token) = self.latest.take() {
            trace!(token = token.0, "invalidated request token");
        }
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        self.latest == Some(token)
    }

    /// Consumes `token` if it is still current. Returns false for stale
    /// completions, which the caller must drop.
    pub fn settle(&mut self, token: RequestToken) -> bool {
        if self.is_current(token) {
            self.latest = None;
            true
        } else {
            false
        }
    }

    pub fn in_flight(&self) -> bool {
        self.latest.is_some()
    }
}
