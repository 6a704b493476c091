//! [`Runtime`]: the single seam the expression evaluator needs into
//! everything else the interpreter owns.
//!
//! Rather than the evaluator holding separate `&mut` borrows of memory,
//! heap, symbol table, accumulator and host (which would alias against
//! whatever else — namely `basic-exec`'s statement executor — also needs
//! to touch them while a call like `FN`/`PROC` is in flight), the owner of
//! all that state implements this one trait on itself and hands the
//! evaluator a single `&mut dyn Runtime`. Evaluating a sub-expression and
//! calling back into the executor to run a function body are then both
//! just trait-method calls through the same borrow, never two at once.

use crate::{Accumulator, EvalHost, Rng};
use basic_core::{BasicError, Value};
use basic_heap::Heap;
use basic_memory::{Addr, MemorySpace};
use basic_symbols::SymbolTable;

/// Current `ON ERROR` trap state, read by the `ERR`/`ERL`/`REPORT$`
/// builtins.
#[derive(Clone, Debug, Default)]
pub struct ErrorState {
    pub err: i32,
    pub erl: u32,
    pub report: String,
}

pub trait Runtime {
    fn mem(&self) -> &dyn MemorySpace;
    fn mem_mut(&mut self) -> &mut dyn MemorySpace;
    fn heap(&mut self) -> &mut Heap;
    fn symbols(&mut self) -> &mut SymbolTable;
    fn accumulator(&mut self) -> &mut Accumulator;
    fn rng(&mut self) -> &mut Rng;
    fn host(&mut self) -> &mut dyn EvalHost;

    /// Top of the control stack: the upper bound the heap and any
    /// stack-resident `DIM` may grow into.
    fn stack_top(&self) -> Addr;

    /// Resolve and invoke a user `FN`, per spec §4.G's call-frame
    /// machinery (formal binding, LOCAL frames, the call itself). This
    /// crate never pushes control-stack frames directly; it only asks for
    /// the result.
    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, BasicError>;

    fn error_state(&self) -> &ErrorState;
}
