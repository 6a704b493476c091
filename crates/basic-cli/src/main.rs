//! The `basic` binary: parse arguments, wire up a [`LocalHost`], and either
//! run a program file straight through or drop into the REPL (spec §6).

mod args;
mod commands;
mod config;
mod local_host;
mod repl;

use std::process::ExitCode;

use anyhow::Result;
use basic_exec::Interpreter;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::Args;
use config::RuntimeConfig;
use local_host::LocalHost;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.trace);

    let cfg = RuntimeConfig::from(&args);
    let host = LocalHost::new(args.dir.clone());
    let mut interp = Interpreter::new(cfg.ram_size, Box::new(host));
    interp.program.reset(&mut interp.mem, cfg.fast_slots_reserved);

    if let Some(path) = &args.program {
        let path = path.to_string_lossy().into_owned();
        commands::load(&mut interp, &path)?;
        repl::report_outcome(basic_exec::run(&mut interp));
    } else {
        repl::run_repl(&mut interp)?;
    }

    Ok(ExitCode::from(interp.exit_code.unwrap_or(0).clamp(0, 255) as u8))
}

fn init_tracing(trace: bool) {
    let filter = if trace {
        EnvFilter::new("basic_exec=trace")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
