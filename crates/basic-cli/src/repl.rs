//! The read-tokenize-dispatch loop for typed input (spec §6.3). Shaped
//! the way `sarnowski-lona`'s own REPL reads a line and matches on what
//! came back, minus its UART/`no_std` constraints: a numbered line stores
//! itself, a recognized command dispatches to [`crate::commands`], a `*`
//! line goes to the host's `OSCLI`, and everything else runs immediately
//! (spec §6.3, `basic_exec::run_immediate`).

use std::io::{self, BufRead, Write};

use basic_exec::{run, run_immediate, Interpreter, RunOutcome};
use basic_host::Host;
use basic_human::Report;

use crate::commands;

pub fn run_repl(interp: &mut Interpreter) -> io::Result<()> {
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let text = line.trim_end_matches(['\r', '\n']).to_string();
        if text.trim().is_empty() {
            continue;
        }
        dispatch(interp, &text)?;
        if interp.exit_code.is_some() {
            return Ok(());
        }
    }
}

fn dispatch(interp: &mut Interpreter, text: &str) -> io::Result<()> {
    let trimmed = text.trim_start();

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        store_line(interp, trimmed);
        return Ok(());
    }

    if let Some(rest) = trimmed.strip_prefix('*') {
        star_command(interp, rest.trim());
        return Ok(());
    }

    if dispatch_command(interp, trimmed)? {
        return Ok(());
    }

    match basic_lexer::tokenize(trimmed) {
        Ok(tokens) => report_outcome(run_immediate(interp, &tokens)),
        Err(e) => eprintln!("{}", Report::from_basic_error(&e).banner()),
    }
    Ok(())
}

/// A line that starts with a digit: a real program line, stored verbatim.
/// A line number with nothing after it (or only whitespace) deletes that
/// line, matching [`basic_program::ProgramStore::set_line`]'s own
/// empty-tokens-means-delete behaviour.
fn store_line(interp: &mut Interpreter, trimmed: &str) {
    let digits_end = trimmed.find(|c: char| !c.is_ascii_digit()).unwrap_or(trimmed.len());
    let Ok(line_no) = trimmed[..digits_end].parse::<u16>() else {
        eprintln!("Line number out of range");
        return;
    };
    let rest = trimmed[digits_end..].trim_start();
    let tokens = if rest.is_empty() {
        Vec::new()
    } else {
        match basic_lexer::tokenize(rest) {
            Ok(tokens) => tokens,
            Err(e) => {
                eprintln!("{}", Report::from_basic_error(&e).banner());
                return;
            }
        }
    };
    let _ = interp.program.set_line(&mut interp.mem, line_no, &tokens);
}

/// `*` commands are host territory (spec §6.3: "not specified here"), with
/// one exception this shell wires up itself since nothing else in the
/// workspace owns symbol-table case sensitivity: `*LOWERCASE` flips it off,
/// the one star command whose effect has to reach past `Host::oscli` and
/// into the running interpreter rather than just being recorded.
fn star_command(interp: &mut Interpreter, command: &str) {
    let name = command.split_whitespace().next().unwrap_or("").to_ascii_uppercase();
    if name == "LOWERCASE" {
        interp.symbols.case_sensitive = false;
        return;
    }
    if let Err(e) = interp.host.oscli(command) {
        eprintln!("{e}");
    }
}

/// Recognized immediate-mode commands (spec §6.3). Returns `true` if
/// `text` matched one (even if its arguments were bad), so the caller
/// doesn't fall through to treating it as a statement to run.
fn dispatch_command(interp: &mut Interpreter, text: &str) -> io::Result<bool> {
    let mut words = text.splitn(2, |c: char| c.is_whitespace() || c == ',');
    let head = words.next().unwrap_or("");
    let verb = head.to_ascii_uppercase();
    let rest = text[head.len()..].trim_start_matches([' ', ',']).trim();

    match verb.as_str() {
        "RUN" => {
            report_outcome(run(interp));
            Ok(true)
        }
        "NEW" => {
            commands::new(interp);
            Ok(true)
        }
        "LIST" => {
            let (lo, hi) = parse_range(rest);
            commands::list(interp, lo, hi);
            Ok(true)
        }
        "LISTO" => {
            commands::listo(interp, rest.parse().unwrap_or(0));
            Ok(true)
        }
        "DELETE" => {
            let (lo, hi) = parse_range(rest);
            commands::delete(interp, lo.unwrap_or(0), hi.unwrap_or(u16::MAX));
            Ok(true)
        }
        "RENUMBER" => {
            let mut parts = rest.split(',').map(str::trim);
            let start = parts.next().and_then(|s| s.parse().ok()).unwrap_or(10);
            let step = parts.next().and_then(|s| s.parse().ok()).unwrap_or(10);
            commands::renumber(interp, start, step);
            Ok(true)
        }
        "AUTO" => {
            let mut parts = rest.split(',').map(str::trim);
            let lo = parts.next().and_then(|s| s.parse().ok()).unwrap_or(10);
            let inc = parts.next().and_then(|s| s.parse().ok()).unwrap_or(10);
            commands::auto(interp, lo, inc)?;
            Ok(true)
        }
        "EDIT" => {
            let Ok(line_no) = rest.parse() else {
                eprintln!("Line number required");
                return Ok(true);
            };
            commands::edit(interp, line_no)?;
            Ok(true)
        }
        "SAVE" => {
            if let Err(e) = commands::save(interp, unquote(rest)) {
                eprintln!("{e}");
            }
            Ok(true)
        }
        "LOAD" => {
            if let Err(e) = commands::load(interp, unquote(rest)) {
                eprintln!("{e}");
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches('"')
}

fn parse_range(rest: &str) -> (Option<u16>, Option<u16>) {
    if rest.is_empty() {
        return (None, None);
    }
    let mut parts = rest.split(',').map(str::trim);
    let lo = parts.next().and_then(|s| s.parse().ok());
    let hi = parts.next().and_then(|s| s.parse().ok()).or(lo);
    (lo, hi)
}

pub(crate) fn report_outcome(outcome: RunOutcome) {
    match outcome {
        RunOutcome::Ended | RunOutcome::Stopped | RunOutcome::Paused => {}
        RunOutcome::Error(e) => eprintln!("{}", Report::new(e.code, e.message, e.line).banner()),
    }
}
