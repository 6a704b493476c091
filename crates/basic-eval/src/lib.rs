//! Expression evaluation (spec §4.F): operator precedence, string/array
//! builtins, and the [`Runtime`] seam the statement executor implements to
//! give expressions access to everything else the interpreter owns.

pub mod accumulator;
pub mod array;
pub mod builtins;
pub mod context;
pub mod cursor;
pub mod expr;
pub mod host;
pub mod numtext;
pub mod rng;
pub mod strings;

pub use accumulator::Accumulator;
pub use context::{ErrorState, Runtime};
pub use cursor::Cursor;
pub use expr::evaluate;
pub use host::{EvalHost, NullHost};
pub use rng::Rng;
