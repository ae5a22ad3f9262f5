//! Readiness flags and per-resource signal state.
//!
//! Every resource reports a [`SignalsState`]: the flags that hold right now
//! (`satisfied`) and the flags that could still hold at some point in the
//! future (`satisfiable`). A flag that leaves `satisfiable` never comes back
//! for the lifetime of the resource; a closed peer stays closed, a drained
//! pipe whose producer is gone stays empty.

use bitflags::bitflags;

bitflags! {
    /// Conditions a handle can be watched for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u32 {
        /// A message or at least one byte is available to read.
        const READABLE = 1 << 0;
        /// A write would currently be accepted.
        const WRITABLE = 1 << 1;
        /// The other end has been closed.
        const PEER_CLOSED = 1 << 2;
        /// Data was committed since the consumer's last read.
        const NEW_DATA_READABLE = 1 << 3;
    }
}

/// Snapshot of a resource's signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalsState {
    /// Flags that currently hold.
    pub satisfied: Signals,
    /// Flags that currently hold or may hold later.
    pub satisfiable: Signals,
}

impl SignalsState {
    /// State of a resource that can never signal anything.
    pub const NEVER: SignalsState = SignalsState {
        satisfied: Signals::empty(),
        satisfiable: Signals::empty(),
    };

    pub fn new(satisfied: Signals, satisfiable: Signals) -> Self {
        debug_assert!(satisfiable.contains(satisfied));
        Self {
            satisfied,
            satisfiable,
        }
    }

    /// Returns `true` if any flag in `signals` holds right now.
    pub fn satisfies(&self, signals: Signals) -> bool {
        self.satisfied.intersects(signals)
    }

    /// Returns `true` if any flag in `signals` may still hold in the future.
    pub fn can_satisfy(&self, signals: Signals) -> bool {
        self.satisfiable.intersects(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn satisfies_is_an_intersection() {
        let state = SignalsState::new(
            Signals::WRITABLE,
            Signals::WRITABLE | Signals::READABLE | Signals::PEER_CLOSED,
        );

        assert!(state.satisfies(Signals::WRITABLE | Signals::READABLE));
        assert!(!state.satisfies(Signals::READABLE));
        assert!(state.can_satisfy(Signals::READABLE));
        assert!(!state.can_satisfy(Signals::NEW_DATA_READABLE));
    }

    #[test]
    fn never_state_satisfies_nothing() {
        assert!(!SignalsState::NEVER.can_satisfy(Signals::all()));
    }
}
