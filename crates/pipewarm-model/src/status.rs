use std::sync::atomic::{AtomicU8, Ordering};

/// The replay state machine. Transitions are monotone except `Invalid`,
/// which is terminal and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    NotParsed = 0,
    Parsing = 1,
    Parsed = 2,
    Creating = 3,
    Created = 4,
    Invalid = 5,
}

impl Status {
    fn from_u8(raw: u8) -> Status {
        match raw {
            0 => Status::NotParsed,
            1 => Status::Parsing,
            2 => Status::Parsed,
            3 => Status::Creating,
            4 => Status::Created,
            5 => Status::Invalid,
            other => unreachable!("invalid status byte {other}"),
        }
    }
}

/// An atomic word carrying the `Status` tag. `descriptor`, `handle`, and
/// `dependencies` on `Entry` are published under a release store here and
/// must only be read after a paired acquire load observes the expected
/// status (spec.md §5).
#[derive(Debug, Default)]
pub struct EntryStatus(AtomicU8);

impl EntryStatus {
    pub fn new(initial: Status) -> Self {
        Self(AtomicU8::new(initial as u8))
    }

    pub fn load(&self, order: Ordering) -> Status {
        Status::from_u8(self.0.load(order))
    }

    /// Attempts `NotParsed -> Parsing`. Used by the parse phase's
    /// single-step advance; sequentially consistent per spec.md §4.4's
    /// "Numeric semantics".
    pub fn try_begin_parsing(&self) -> Result<(), Status> {
        self.0
            .compare_exchange(
                Status::NotParsed as u8,
                Status::Parsing as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(Status::from_u8)
    }

    /// Attempts `Parsed -> Creating`. Same ordering discipline as
    /// `try_begin_parsing`.
    pub fn try_begin_creating(&self) -> Result<(), Status> {
        self.0
            .compare_exchange(
                Status::Parsed as u8,
                Status::Creating as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map(|_| ())
            .map_err(Status::from_u8)
    }

    /// Publishes `Parsed` (release) after the descriptor/dependencies have
    /// been written.
    pub fn publish_parsed(&self) {
        self.0.store(Status::Parsed as u8, Ordering::Release);
    }

    /// Publishes `Created` (release) after the handle has been written.
    pub fn publish_created(&self) {
        self.0.store(Status::Created as u8, Ordering::Release);
    }

    /// Marks this entry `Invalid` (terminal). Sequentially consistent so
    /// concurrent readers in either phase observe it promptly.
    pub fn mark_invalid(&self) {
        self.0.store(Status::Invalid as u8, Ordering::SeqCst);
    }

    /// Attempts `expected -> Invalid`. Returns `true` if this call won the
    /// race. A shared entry can be reached by more than one root's
    /// invalidation cascade at once; the winner is the one responsible for
    /// one-time bookkeeping that assumed `expected`'s published state (for
    /// example, releasing this entry's own dependencies' fan-in). A loser
    /// means some other thread already moved this entry past `expected`,
    /// so that bookkeeping already happened (or will, under its own CAS).
    pub fn try_mark_invalid_from(&self, expected: Status) -> bool {
        self.0
            .compare_exchange(
                expected as u8,
                Status::Invalid as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    pub fn acquire(&self) -> Status {
        self.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_parsing_is_single_winner() {
        let status = EntryStatus::new(Status::NotParsed);
        assert!(status.try_begin_parsing().is_ok());
        assert_eq!(status.try_begin_parsing(), Err(Status::Parsing));
    }

    #[test]
    fn publish_then_begin_creating() {
        let status = EntryStatus::new(Status::NotParsed);
        status.try_begin_parsing().unwrap();
        status.publish_parsed();
        assert_eq!(status.acquire(), Status::Parsed);
        assert!(status.try_begin_creating().is_ok());
        status.publish_created();
        assert_eq!(status.acquire(), Status::Created);
    }

    #[test]
    fn invalid_is_terminal_from_any_state() {
        let status = EntryStatus::new(Status::Parsed);
        status.mark_invalid();
        assert_eq!(status.acquire(), Status::Invalid);
        assert!(status.try_begin_creating().is_err());
    }

    #[test]
    fn try_mark_invalid_from_has_single_winner() {
        let status = EntryStatus::new(Status::Parsed);
        assert!(status.try_mark_invalid_from(Status::Parsed));
        assert!(!status.try_mark_invalid_from(Status::Parsed));
        assert_eq!(status.acquire(), Status::Invalid);
    }

    #[test]
    fn try_mark_invalid_from_fails_on_stale_expectation() {
        let status = EntryStatus::new(Status::Creating);
        assert!(!status.try_mark_invalid_from(Status::Parsed));
        assert_eq!(status.acquire(), Status::Creating);
    }
}
