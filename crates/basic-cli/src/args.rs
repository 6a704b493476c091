//! Command-line arguments, in the style of `Vector35-idb-rs`'s `tools.rs`:
//! a `clap::Parser` struct with doc comments doing double duty as `--help`
//! text.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "basic", about = "A BBC BASIC interpreter")]
pub struct Args {
    /// Program file to load and run immediately; omit to drop into the REPL.
    #[arg(long, value_name = "PATH")]
    pub program: Option<PathBuf>,

    /// User RAM size in bytes (the `HIMEM` ceiling at startup).
    #[arg(long, value_name = "BYTES", default_value_t = 64 * 1024)]
    pub himem: usize,

    /// Value stored in the program store's `fast_slots_reserved` header
    /// field (round-trips through `SAVE`/`LOAD`); unrelated to the symbol
    /// table's own fixed-size fast-slot array.
    #[arg(long, value_name = "N", default_value_t = 8)]
    pub fast_slots: u16,

    /// Enable `trace`-level logging of statement dispatch and control-stack
    /// transitions (equivalent to `RUST_LOG=basic_exec=trace`).
    #[arg(long)]
    pub trace: bool,

    /// Directory `LOAD`/`SAVE`/`OPENIN`/`OPENOUT` resolve relative paths
    /// against (`@dir$`).
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,
}
