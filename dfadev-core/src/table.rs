//! Automaton data model: a total transition function and an accepting set.
//!
//! Both structures are indexed by the full byte range, so every lookup is
//! in bounds by construction and unconfigured transitions lead to state 0.

use std::fmt;

/// An input symbol.
pub type Symbol = u8;

/// An automaton state. State 0 is the initial and reset state.
pub type State = u8;

/// The initial state.
pub const INITIAL_STATE: State = 0;

/// Number of distinct symbols.
pub const ALPHABET_SIZE: usize = 256;

/// Number of distinct states.
pub const STATE_COUNT: usize = 256;

/// Size of the flattened transition table in bytes.
pub const TRANSITION_TABLE_LEN: usize = STATE_COUNT * ALPHABET_SIZE;

/// Dense State x Symbol -> State table.
#[derive(Clone, PartialEq, Eq)]
pub struct TransitionTable {
    next: Box<[[State; ALPHABET_SIZE]; STATE_COUNT]>,
}

impl TransitionTable {
    /// Creates a table where every transition leads to state 0.
    pub fn new() -> Self {
        Self {
            next: Box::new([[INITIAL_STATE; ALPHABET_SIZE]; STATE_COUNT]),
        }
    }

    /// Returns the successor of `state` on `symbol`.
    #[inline]
    pub fn get(&self, state: State, symbol: Symbol) -> State {
        self.next[state as usize][symbol as usize]
    }

    /// Sets the successor of `state` on `symbol`.
    #[inline]
    pub fn set(&mut self, state: State, symbol: Symbol, next: State) {
        self.next[state as usize][symbol as usize] = next;
    }

    /// Folds `symbols` over the table starting from `state`.
    #[inline]
    pub fn run(&self, state: State, symbols: &[Symbol]) -> State {
        symbols
            .iter()
            .fold(state, |current, &symbol| self.get(current, symbol))
    }

    /// Number of entries that lead somewhere other than state 0.
    pub fn configured_count(&self) -> usize {
        self.next
            .iter()
            .flatten()
            .filter(|&&next| next != INITIAL_STATE)
            .count()
    }

    /// Flattens the table row by row (`state * 256 + symbol`).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TRANSITION_TABLE_LEN);
        for row in self.next.iter() {
            bytes.extend_from_slice(row);
        }
        bytes
    }

    /// Rebuilds a table from its flattened form.
    ///
    /// Returns `None` unless `bytes` is exactly [`TRANSITION_TABLE_LEN`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != TRANSITION_TABLE_LEN {
            return None;
        }
        let mut table = Self::new();
        for (row, chunk) in table.next.iter_mut().zip(bytes.chunks_exact(ALPHABET_SIZE)) {
            row.copy_from_slice(chunk);
        }
        Some(table)
    }
}

impl Default for TransitionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransitionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("configured", &self.configured_count())
            .finish()
    }
}

/// Accepting flag per state.
#[derive(Clone, PartialEq, Eq)]
pub struct AcceptingSet {
    accepting: [bool; STATE_COUNT],
}

impl AcceptingSet {
    /// Creates a set with no accepting states.
    pub fn new() -> Self {
        Self {
            accepting: [false; STATE_COUNT],
        }
    }

    #[inline]
    pub fn is_accepting(&self, state: State) -> bool {
        self.accepting[state as usize]
    }

    #[inline]
    pub fn set_accepting(&mut self, state: State, accepting: bool) {
        self.accepting[state as usize] = accepting;
    }

    /// Returns the accepting states in ascending order.
    pub fn states(&self) -> Vec<State> {
        (0..=State::MAX).filter(|&s| self.is_accepting(s)).collect()
    }

    /// One byte per state: 1 if accepting, 0 otherwise.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.accepting.iter().map(|&a| u8::from(a)).collect()
    }

    /// Rebuilds the set from one byte per state; any non-zero byte accepts.
    ///
    /// Returns `None` unless `bytes` is exactly [`STATE_COUNT`] long.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != STATE_COUNT {
            return None;
        }
        let mut set = Self::new();
        for (flag, &byte) in set.accepting.iter_mut().zip(bytes) {
            *flag = byte != 0;
        }
        Some(set)
    }
}

impl Default for AcceptingSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AcceptingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.states()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_total_and_zeroed() {
        let table = TransitionTable::new();
        for state in 0..=State::MAX {
            for symbol in 0..=Symbol::MAX {
                assert_eq!(table.get(state, symbol), INITIAL_STATE);
            }
        }
        assert_eq!(table.configured_count(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut table = TransitionTable::new();
        table.set(0, b'a', 1);
        table.set(255, 255, 42);

        assert_eq!(table.get(0, b'a'), 1);
        assert_eq!(table.get(255, 255), 42);
        assert_eq!(table.get(0, b'b'), 0);
        assert_eq!(table.configured_count(), 2);
    }

    #[test]
    fn test_run_folds_left_to_right() {
        let mut table = TransitionTable::new();
        table.set(0, b'a', 1);
        table.set(1, b'b', 2);

        assert_eq!(table.run(0, b"ab"), 2);
        assert_eq!(table.run(0, b"ba"), 1);
        assert_eq!(table.run(2, b""), 2);
    }

    #[test]
    fn test_table_bytes_layout() {
        let mut table = TransitionTable::new();
        table.set(1, 2, 3);

        let bytes = table.to_bytes();
        assert_eq!(bytes.len(), TRANSITION_TABLE_LEN);
        assert_eq!(bytes[ALPHABET_SIZE + 2], 3);

        let restored = TransitionTable::from_bytes(&bytes).unwrap();
        assert_eq!(restored, table);

        assert!(TransitionTable::from_bytes(&bytes[1..]).is_none());
    }

    #[test]
    fn test_accepting_set() {
        let mut set = AcceptingSet::new();
        assert!(!set.is_accepting(5));

        set.set_accepting(5, true);
        set.set_accepting(200, true);
        assert!(set.is_accepting(5));
        assert_eq!(set.states(), vec![5, 200]);

        set.set_accepting(5, false);
        assert!(!set.is_accepting(5));
        assert_eq!(set.states(), vec![200]);
    }

    #[test]
    fn test_accepting_bytes_treat_nonzero_as_accepting() {
        let mut bytes = vec![0u8; STATE_COUNT];
        bytes[3] = 1;
        bytes[7] = 0xff;

        let set = AcceptingSet::from_bytes(&bytes).unwrap();
        assert_eq!(set.states(), vec![3, 7]);

        let encoded = set.to_bytes();
        assert_eq!(encoded[7], 1);
        assert!(AcceptingSet::from_bytes(&[0u8; 10]).is_none());
    }
}
