//! The tokenized program store: line storage, search and the `DATA`
//! pointer (spec §4.E).

pub mod store;

pub use store::{FindResult, GetTop, ProgramStore};
