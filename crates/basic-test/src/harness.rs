//! Build an [`Interpreter`] from BASIC source text and drive it through a
//! shared [`MockHost`] (spec §8): load lines, run to completion, inspect
//! console output — the same shape as `lona-vm`'s end-to-end harness that
//! assembles a compiled program and runs it against a mock platform.

use basic_exec::{Interpreter, RunOutcome};
use basic_lexer::tokenize;

use crate::shared_host::SharedMockHost;

/// RAM size generous enough for every scenario this harness drives; a
/// single `DIM`-heavy test can always pass a bigger one to `Scenario::with_ram`.
pub const DEFAULT_RAM: usize = 64 * 1024;

pub struct Scenario {
    pub interp: Interpreter,
    host: SharedMockHost,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ram(DEFAULT_RAM)
    }

    #[must_use]
    pub fn with_ram(ram_size: usize) -> Self {
        let host = SharedMockHost::new();
        let interp = Interpreter::new(ram_size, Box::new(host.clone()));
        Self { interp, host }
    }

    /// Load a program given as `(line number, source text)` pairs,
    /// tokenizing each line as it's inserted.
    ///
    /// # Panics
    /// If a line fails to tokenize or doesn't fit the program store —
    /// scenario fixtures are expected to be well-formed.
    pub fn load(&mut self, lines: &[(u16, &str)]) -> &mut Self {
        for &(no, src) in lines {
            let tokens = tokenize(src).unwrap_or_else(|e| panic!("line {no} failed to tokenize: {e}"));
            self.interp
                .program
                .set_line(&mut self.interp.mem, no, &tokens)
                .unwrap_or_else(|e| panic!("line {no} didn't fit the program store: {e}"));
        }
        self
    }

    /// Convenience for a single-line immediate-mode fixture: line 10 only.
    #[must_use]
    pub fn one_line(src: &str) -> Self {
        let mut s = Self::new();
        s.load(&[(10, src)]);
        s
    }

    #[must_use]
    pub fn run(&mut self) -> RunOutcome {
        basic_exec::run(&mut self.interp)
    }

    pub fn feed_input(&self, text: &str) {
        self.host.feed_input(text.bytes());
    }

    pub fn put_file(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.host.put_file(name, data);
    }

    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.host.output()
    }

    #[must_use]
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output()).into_owned()
    }

    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.host.commands()
    }
}
