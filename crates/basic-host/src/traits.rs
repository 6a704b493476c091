//! The host-service surface the core calls out to (spec §6.1). Graphics,
//! sound, mouse and inline-assembler services are out of scope — the
//! executor never dispatches a statement that would need them — so this
//! trait only covers file I/O, console I/O, timers and the `*` command line.

use std::fmt;

/// How a channel was opened, mirroring `OPENIN`/`OPENOUT`/`OPENUP`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OpenMode {
    /// `OPENIN`: read an existing file from the start.
    Input,
    /// `OPENOUT`: create (or truncate) a file for writing.
    Output,
    /// `OPENUP`: open an existing file, or create one, for read/write.
    Update,
}

/// An error raised by a host service. Distinct from [`basic_core::BasicError`]
/// so this crate doesn't need to know which numeric code the executor wants
/// to surface for a given failure; `basic-exec` maps these at the call site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostError {
    NoSuchChannel,
    ChannelsExhausted,
    NotFound(String),
    Io(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchChannel => write!(f, "no such channel"),
            Self::ChannelsExhausted => write!(f, "too many open files"),
            Self::NotFound(name) => write!(f, "file not found: {name}"),
            Self::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Everything the statement executor and the builtin dispatcher need from
/// the surrounding host (spec §6.1). A channel is an opaque, host-assigned
/// handle; `0` is never a valid handle (it's BASIC's "console" shorthand in
/// a handful of statements, handled by the executor before it reaches here).
pub trait Host {
    /// Save the whole tokenized program under `name` (`SAVE`).
    fn ossave(&mut self, name: &str, data: &[u8]) -> Result<(), HostError>;
    /// Load a whole program (`LOAD`), returning its raw bytes.
    fn osload(&mut self, name: &str) -> Result<Vec<u8>, HostError>;

    /// Open `name` in the given mode, returning a channel handle.
    fn osopen(&mut self, mode: OpenMode, name: &str) -> Result<i64, HostError>;
    /// Close one channel, or every open channel when `channel == 0`.
    fn osshut(&mut self, channel: i64) -> Result<(), HostError>;
    /// Read one byte and advance the channel's pointer (`BGET#`).
    fn osbget(&mut self, channel: i64) -> Result<u8, HostError>;
    /// Write one byte and advance the channel's pointer (`BPUT#`).
    fn osbput(&mut self, channel: i64, byte: u8) -> Result<(), HostError>;
    /// Current byte offset (`PTR#`).
    fn getptr(&self, channel: i64) -> Result<u64, HostError>;
    /// Reposition the channel (`PTR# = `).
    fn setptr(&mut self, channel: i64, ptr: u64) -> Result<(), HostError>;
    /// Current length in bytes (`EXT#`).
    fn getext(&self, channel: i64) -> Result<u64, HostError>;
    /// Whether the pointer is at or past the end (`EOF#`).
    fn geteof(&self, channel: i64) -> Result<bool, HostError>;

    /// Read one character from the console, blocking (`GET`, `OSRDCH`).
    fn osrdch(&mut self) -> Result<u8, HostError>;
    /// Write one character to the console (`VDU`/`PRINT` fall through here).
    fn oswrch(&mut self, byte: u8) -> Result<(), HostError>;
    /// Read one line from the console (`INPUT`), echo and editing owned by
    /// the host.
    fn osline(&mut self) -> Result<String, HostError>;

    /// Poll the keyboard. `n >= 0`: wait up to `n` centiseconds for a key,
    /// returning its code or `-1` on timeout (`INKEY`). `n < 0`: test
    /// whether the key numbered `-n` is currently held, returning `-1` if
    /// so or `0` otherwise (`INKEY(-n)`).
    fn oskey(&mut self, n: i32) -> Result<i32, HostError>;
    /// Suspend the program for `cs` centiseconds, still servicing events.
    fn oswait(&mut self, cs: u32);

    /// Centisecond tick count since the host's epoch (`TIME`).
    fn getime(&self) -> i64;
    /// Reset the tick counter (`TIME =`).
    fn putime(&mut self, value: i64);

    /// Run a star command (`*FOO`, or `OSCLI`). Unrecognized commands are
    /// the host's concern; a mock host may simply record them.
    fn oscli(&mut self, command: &str) -> Result<(), HostError>;

    /// Raise (or lower) the high-water mark of user RAM to at least `addr`
    /// bytes. Returns the realized ceiling, which may be less than
    /// requested if the host can't grow that far (`HIMEM =`, paging).
    fn oshwm(&mut self, addr: u32) -> u32;
}
