//! Value model and error taxonomy shared by every other interpreter crate.
//!
//! [`Value`] is the tagged union described in spec §3/§4.A: a 64-bit signed
//! integer, an IEEE double, or a reference to a string living in the heap
//! (`basic-heap`) or the per-context string accumulator. Arithmetic lives in
//! [`arith`] and promotes integer operations to float on overflow rather than
//! panicking or wrapping.

pub mod arith;
mod error;
mod value;

pub use error::{BasicError, ErrorCode};
pub use value::{StrRef, Value};
