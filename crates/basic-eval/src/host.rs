//! The narrow slice of host services (spec §6.1) a handful of builtins
//! need directly: the real-time clock, keyboard polling and file status.
//! Everything else the evaluator needs (heap, symbols, program text) is
//! already in its own crates — this trait exists so `basic-eval` doesn't
//! have to depend on the full host-service surface `basic-exec` wires up.

use basic_core::BasicError;

pub trait EvalHost {
    /// Centisecond real-time clock, backing `TIME`/`TIME$`.
    fn centiseconds(&self) -> i64;

    /// `INKEY(n)`: `n >= 0` waits up to `n` centiseconds for a keypress and
    /// returns its code or `-1` on timeout; `n < 0` polls a key/device's
    /// instantaneous state.
    fn inkey(&mut self, n: i32) -> Result<i32, BasicError>;

    /// `EOF#channel`.
    fn eof(&mut self, channel: i64) -> Result<bool, BasicError>;

    /// `BGET#channel`.
    fn bget(&mut self, channel: i64) -> Result<u8, BasicError>;

    /// `*command` / `OSCLI`.
    fn oscli(&mut self, command: &str) -> Result<(), BasicError>;
}

/// A host double that can't do real I/O, for evaluator tests that never
/// touch `INKEY`/`EOF`/`BGET`/`OSCLI`. `basic-host`'s mock is the one
/// meant for interpreter-level tests; this one only exists so this crate's
/// own unit tests don't need that crate as a dev-dependency.
#[derive(Default)]
pub struct NullHost {
    pub clock: i64,
}

impl EvalHost for NullHost {
    fn centiseconds(&self) -> i64 {
        self.clock
    }

    fn inkey(&mut self, _n: i32) -> Result<i32, BasicError> {
        Ok(-1)
    }

    fn eof(&mut self, _channel: i64) -> Result<bool, BasicError> {
        Ok(true)
    }

    fn bget(&mut self, _channel: i64) -> Result<u8, BasicError> {
        Err(BasicError::new(basic_core::ErrorCode::NO_SUCH_VARIABLE))
    }

    fn oscli(&mut self, _command: &str) -> Result<(), BasicError> {
        Ok(())
    }
}
