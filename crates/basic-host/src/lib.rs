//! The host-service boundary (spec §6.1): file I/O, console I/O, timers and
//! the `*` command line, kept as a trait so the executor can run against
//! either a real terminal/filesystem or the in-process [`MockHost`].

pub mod mock;
pub mod traits;

pub use mock::MockHost;
pub use traits::{Host, HostError, OpenMode};
