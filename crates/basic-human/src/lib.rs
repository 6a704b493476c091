//! Human-facing error text (spec §7): `REPORT$`'s message, and the banner
//! an uncaught error prints before the interpreter returns to its prompt.

pub mod report;

pub use report::Report;
