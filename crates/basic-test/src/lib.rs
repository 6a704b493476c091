//! Shared scenario harness (spec §8): load a tokenized program into an
//! [`Interpreter`] wired to a shared [`MockHost`](basic_host::MockHost) and
//! run it to completion, independent of any particular crate's own tests.

pub mod harness;
pub mod shared_host;

pub use harness::Scenario;
pub use shared_host::SharedMockHost;
