//! Latest-request-wins guard for overlapping loads.
//!
//! Each load of a resource takes a [`Ticket`]. A response is stored only if
//! its ticket is the newest one issued for the slot, so a slow response to
//! an older request can never overwrite the result of a newer one.

/// Identifies one load of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// A value slot guarded by request generations.
#[derive(Debug, Clone)]
pub struct Latest<T> {
    issued: u64,
    value: Option<T>,
}

impl<T> Default for Latest<T> {
    fn default() -> Self {
        Self {
            issued: 0,
            value: None,
        }
    }
}

impl<T> Latest<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new load; any earlier ticket becomes stale.
    pub fn begin(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }

    /// Store `value` if `ticket` is still current. Returns whether it was kept.
    pub fn resolve(&mut self, ticket: Ticket, value: T) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.value = Some(value);
        true
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Edit the stored value in place. Does not start a new generation.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }
}
