//! The automaton engine: feed, poll and control over one automaton.
//!
//! The engine is owned by exactly one dispatcher and serves one request at
//! a time, so it carries no locks.

use crate::control::{check_payload_len, ControlCode, ControlRequest, MAX_CONTROL_PAYLOAD};
use crate::error::CoreError;
use crate::grant::CallerBuffer;
use crate::table::{AcceptingSet, State, Symbol, TransitionTable, INITIAL_STATE};

/// Default transfer chunk size (4 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024;

/// Byte returned by polls while the current state is accepting.
pub const ACCEPT_SENTINEL: u8 = b'Y';

/// Byte returned by polls while the current state is not accepting.
pub const REJECT_SENTINEL: u8 = b'N';

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Bytes moved per caller copy. Never affects results.
    pub chunk_size: usize,
    pub accept_sentinel: u8,
    pub reject_sentinel: u8,
    /// Whether adding a transition also resets the current state.
    pub reset_on_add_transition: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            accept_sentinel: ACCEPT_SENTINEL,
            reject_sentinel: REJECT_SENTINEL,
            reset_on_add_transition: true,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the chunk size. Zero is raised to one.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn with_sentinels(mut self, accept: u8, reject: u8) -> Self {
        self.accept_sentinel = accept;
        self.reject_sentinel = reject;
        self
    }

    pub fn with_reset_on_add_transition(mut self, reset: bool) -> Self {
        self.reset_on_add_transition = reset;
        self
    }
}

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub symbols_fed: u64,
    pub polls: u64,
    pub control_requests: u64,
}

/// A deterministic finite automaton driven by byte streams.
#[derive(Debug, Clone)]
pub struct DfaEngine {
    pub(crate) table: TransitionTable,
    pub(crate) accepting: AcceptingSet,
    pub(crate) current: State,
    config: EngineConfig,
    buffer: Vec<u8>,
    stats: EngineStats,
}

impl DfaEngine {
    /// Creates an engine with zeroed structures.
    pub fn new(config: EngineConfig) -> Self {
        let config = EngineConfig {
            chunk_size: config.chunk_size.max(1),
            ..config
        };
        Self {
            table: TransitionTable::new(),
            accepting: AcceptingSet::new(),
            current: INITIAL_STATE,
            buffer: vec![0; config.chunk_size],
            config,
            stats: EngineStats::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn current_state(&self) -> State {
        self.current
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    pub fn accepting(&self) -> &AcceptingSet {
        &self.accepting
    }

    /// Returns true if the current state is accepting.
    pub fn is_accepting(&self) -> bool {
        self.accepting.is_accepting(self.current)
    }

    /// The sentinel a poll would return right now.
    pub fn verdict(&self) -> u8 {
        if self.is_accepting() {
            self.config.accept_sentinel
        } else {
            self.config.reject_sentinel
        }
    }

    // =========================================================================
    // Stream
    // =========================================================================

    /// Feeds `size` symbols from `caller`, starting at the current state.
    ///
    /// Symbols are copied in chunks. If a copy fails, transitions applied
    /// from earlier chunks are kept.
    pub fn feed(&mut self, caller: &mut dyn CallerBuffer, size: usize) -> Result<usize, CoreError> {
        let mut done = 0;
        while done < size {
            let chunk = self.config.chunk_size.min(size - done);
            let copied = caller.copy_in(done, &mut self.buffer[..chunk]);
            if let Err(e) = copied {
                tracing::debug!(
                    "feed aborted after {} of {} symbols, state {}: {}",
                    done,
                    size,
                    self.current,
                    e
                );
                return Err(e);
            }

            self.current = self.table.run(self.current, &self.buffer[..chunk]);
            self.stats.symbols_fed += chunk as u64;
            done += chunk;
        }

        Ok(size)
    }

    /// Feeds symbols already in engine memory.
    pub fn feed_symbols(&mut self, symbols: &[Symbol]) -> State {
        self.current = self.table.run(self.current, symbols);
        self.stats.symbols_fed += symbols.len() as u64;
        self.current
    }

    /// Writes `size` copies of the current verdict to `caller`.
    ///
    /// Never changes the current state.
    pub fn poll(&mut self, caller: &mut dyn CallerBuffer, size: usize) -> Result<usize, CoreError> {
        self.stats.polls += 1;
        if size == 0 {
            return Ok(0);
        }

        let sentinel = self.verdict();
        let fill = self.config.chunk_size.min(size);
        self.buffer[..fill].fill(sentinel);

        let mut done = 0;
        while done < size {
            let chunk = fill.min(size - done);
            caller.copy_out(done, &self.buffer[..chunk])?;
            done += chunk;
        }

        Ok(size)
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Handles a raw control request whose payload lives in `caller`.
    ///
    /// Unknown codes and payload-length mismatches are rejected before any
    /// byte is copied, and nothing is mutated unless the whole payload
    /// arrived.
    pub fn control(&mut self, code: u32, caller: &mut dyn CallerBuffer) -> Result<(), CoreError> {
        self.stats.control_requests += 1;

        let control = ControlCode::from_raw(code).ok_or(CoreError::UnsupportedOperation { code })?;
        check_payload_len(control, caller.len())?;

        let mut payload = [0u8; MAX_CONTROL_PAYLOAD];
        let payload = &mut payload[..control.payload_len()];
        caller.copy_in(0, payload)?;

        let request = ControlRequest::decode(code, payload)?;
        self.apply(request);
        Ok(())
    }

    /// Applies a decoded control request.
    pub fn apply(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Reset => self.reset(),
            ControlRequest::AddTransition {
                state,
                symbol,
                next,
            } => self.add_transition(state, symbol, next),
            ControlRequest::MarkAccepting(state) => self.mark_accepting(state),
            ControlRequest::MarkRejecting(state) => self.mark_rejecting(state),
        }
    }

    pub fn reset(&mut self) {
        self.current = INITIAL_STATE;
    }

    /// Sets `state --symbol--> next`.
    ///
    /// With `reset_on_add_transition` (the default) this also resets the
    /// current state, discarding any partially fed input.
    pub fn add_transition(&mut self, state: State, symbol: Symbol, next: State) {
        self.table.set(state, symbol, next);
        if self.config.reset_on_add_transition {
            self.current = INITIAL_STATE;
        }
    }

    pub fn mark_accepting(&mut self, state: State) {
        self.accepting.set_accepting(state, true);
    }

    pub fn mark_rejecting(&mut self, state: State) {
        self.accepting.set_accepting(state, false);
    }
}

impl Default for DfaEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
