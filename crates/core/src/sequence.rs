//! Request sequencing for overlapping asynchronous calls.
//!
//! Every outbound request is tagged with a [`Ticket`]: the session generation it was issued in
//! (bumped whenever a new patient is committed) and a per-channel sequence number. A response may
//! only be applied while its ticket is still the latest one issued on its channel and the
//! generation has not moved on.

/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
    sequence: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

/// Issues tickets for one channel and decides which response is current.
#[derive(Debug, Default, Clone)]
pub struct RequestSequencer {
    issued: u64,
    pending: Option<Ticket>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new ticket. Any earlier ticket on this channel is superseded.
    pub fn issue(&mut self, generation: u64) -> Ticket {
        self.issued += 1;
        let ticket = Ticket {
            generation,
            sequence: self.issued,
        };
        self.pending = Some(ticket);
        ticket
    }

    /// Whether `ticket` is the outstanding request for `generation`.
    pub fn is_current(&self, ticket: Ticket, generation: u64) -> bool {
        ticket.generation == generation && self.pending == Some(ticket)
    }

    /// Consume the response for `ticket`.
    ///
    /// Returns `true` when the response should be applied. Either way a stale ticket leaves the
    /// outstanding request untouched.
    pub fn settle(&mut self, ticket: Ticket, generation: u64) -> bool {
        if self.is_current(ticket, generation) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Whether a request issued on this channel has not been settled yet.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Forget the outstanding request so its response will be discarded.
    pub fn invalidate(&mut self) {
        self.pending = None;
    }
}
