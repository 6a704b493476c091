//! The statement executor (spec §4.G-H): the flat dispatch loop that drives
//! a tokenized program, the typed control stack backing `GOSUB`/loops/
//! `PROC`/`FN`, and the event queue `ON ... TRAP` style traps feed into.

pub mod error;
pub mod event;
pub mod frame;
pub mod interpreter;
pub mod statement;

pub use error::ExecError;
pub use event::{Event, EventQueue, Flags, TrapKind};
pub use frame::{ControlStack, Frame, LoopKind, Pos};
pub use interpreter::{ErrorTrap, Interpreter};
pub use statement::{call_fn, run, resume_from, run_immediate, Flow, RunOutcome, IMMEDIATE_LINE};
