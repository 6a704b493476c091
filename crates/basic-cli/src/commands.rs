//! Immediate-mode commands (spec §6.3): `AUTO`, `DELETE`, `EDIT`, `LIST`,
//! `LISTO`, `LOAD`, `NEW`, `RENUMBER`, `SAVE`. Out of scope for the
//! interpreter CORE itself (spec §1's "editor/LIST/RENUMBER immediate-mode
//! commands" exclusion), these live entirely in this crate and operate on
//! `ProgramStore` directly.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicU8, Ordering};

use basic_exec::Interpreter;
use basic_host::Host;
use basic_lexer::keyword::TLINO;
use basic_lexer::{detokenize, list_line, tlino};
use basic_memory::{Addr, MemorySpace};
use basic_program::FindResult;

/// `LIST[lo[,hi]]`: print every line in `[lo, hi]` (both ends optional) in
/// source form, with the same indentation `list_line` tracks during `*LOAD`.
pub fn list(interp: &Interpreter, lo: Option<u16>, hi: Option<u16>) {
    let mut indent = 0u32;
    let mut addr = interp.program.page();
    while let Some(next) = interp.program.next_line(&interp.mem, addr) {
        let line_no = interp.program.line_number(&interp.mem, addr);
        if lo.is_none_or(|lo| line_no >= lo) && hi.is_none_or(|hi| line_no <= hi) {
            let (start, len) = interp.program.tokens(&interp.mem, addr);
            let tokens = read_tokens(interp, start, len);
            println!("{line_no:>5} {}", list_line(&mut indent, &tokens));
        }
        addr = next;
    }
}

fn read_tokens(interp: &Interpreter, start: Addr, len: u32) -> Vec<u8> {
    (0..len).map(|i| interp.mem.read_u8(start.add(i))).collect()
}

/// `LISTO n`'s option word. This workspace has exactly one listing style
/// (`LIST`'s own indented-keyword form), so there's nothing for any bit of
/// `n` to actually switch yet; it's stored so a script that reads it back
/// via `*LISTO` round-trips, and so `LISTO` isn't a silently-ignored
/// command.
static LISTO: AtomicU8 = AtomicU8::new(0);

/// `LISTO n`: set the listing option word.
pub fn listo(_interp: &Interpreter, n: u8) {
    LISTO.store(n, Ordering::Relaxed);
}

/// `DELETE lo[,hi]`: remove every line numbered in `[lo, hi]`.
pub fn delete(interp: &mut Interpreter, lo: u16, hi: u16) {
    for line_no in lo..=hi {
        let _ = interp.program.set_line(&mut interp.mem, line_no, &[]);
    }
}

/// `NEW`: drop the program and every variable/function/procedure.
pub fn new(interp: &mut Interpreter) {
    interp.new_program();
}

/// `SAVE path`: write out the raw tokenized image (spec §6.2).
///
/// # Errors
/// Whatever the host's `ossave` reports.
pub fn save(interp: &mut Interpreter, path: &str) -> Result<(), basic_host::HostError> {
    let top = interp.program.top();
    let page = interp.program.page();
    let image: Vec<u8> = (0..top.diff(page).max(0) as u32).map(|i| interp.mem.read_u8(page.add(i))).collect();
    interp.host.ossave(path, &image)
}

/// `LOAD path`: install a program, auto-detecting the tokenized-vs-text
/// format by whether the file ends in `0x0D` (spec §6.2).
///
/// # Errors
/// Whatever the host's `osload` or the program store's load routines
/// report.
pub fn load(interp: &mut Interpreter, path: &str) -> Result<(), anyhow::Error> {
    let data = interp.host.osload(path)?;
    if data.last() == Some(&0x0D) {
        interp.program.load_tokenized(&mut interp.mem, &data)?;
    } else {
        let text = String::from_utf8_lossy(&data);
        interp.program.load_text(&mut interp.mem, &text)?;
    }
    Ok(())
}

/// `RENUMBER[start[,step]]`: reassign every line's number and rewrite
/// every embedded line-number reference (`GOTO`/`GOSUB`/`THEN`/`ELSE`/
/// `RESTORE`/`TRACE`'s packed `TLINO` operand) to match.
///
/// References to a line number that no longer exists after renumbering
/// are left untouched — the same as BASIC's own behaviour of leaving a
/// dangling `GOTO` to fail with "no such line" at run time rather than
/// silently.
pub fn renumber(interp: &mut Interpreter, start: u16, step: u16) {
    let mut lines = Vec::new();
    let mut addr = interp.program.page();
    while let Some(next) = interp.program.next_line(&interp.mem, addr) {
        let old_no = interp.program.line_number(&interp.mem, addr);
        let (tok_start, tok_len) = interp.program.tokens(&interp.mem, addr);
        lines.push((old_no, read_tokens(interp, tok_start, tok_len)));
        addr = next;
    }

    let mapping: HashMap<u16, u16> = lines.iter().enumerate().map(|(i, (old, _))| (*old, start + i as u16 * step)).collect();

    let rewritten: Vec<(u16, Vec<u8>)> = lines
        .into_iter()
        .map(|(old, tokens)| (mapping[&old], rewrite_line_refs(&tokens, &mapping)))
        .collect();

    interp.program.reset(&mut interp.mem, 0);
    for (no, tokens) in rewritten {
        let _ = interp.program.set_line(&mut interp.mem, no, &tokens);
    }
}

fn rewrite_line_refs(tokens: &[u8], mapping: &HashMap<u16, u16>) -> Vec<u8> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == TLINO && i + 3 < tokens.len() {
            if let Some(old) = tlino::decode([tokens[i + 1], tokens[i + 2], tokens[i + 3]]) {
                let new = mapping.get(&old).copied().unwrap_or(old);
                out.push(TLINO);
                out.extend_from_slice(&tlino::encode(new));
                i += 4;
                continue;
            }
        }
        out.push(tokens[i]);
        i += 1;
    }
    out
}

/// `AUTO[lo[,inc]]`: prompt with successive line numbers until a blank
/// line is entered, storing each non-blank reply as that numbered line.
pub fn auto(interp: &mut Interpreter, mut line_no: u16, inc: u16) -> io::Result<()> {
    loop {
        print!("{line_no:>5} ");
        io::stdout().flush()?;
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf)? == 0 {
            return Ok(());
        }
        let text = buf.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            return Ok(());
        }
        if let Ok(tokens) = basic_lexer::tokenize(text) {
            let _ = interp.program.set_line(&mut interp.mem, line_no, &tokens);
        }
        line_no += inc;
    }
}

/// `EDIT lo`: print the line's current text, then replace it with
/// whatever the user types next (blank input leaves it unchanged).
pub fn edit(interp: &mut Interpreter, line_no: u16) -> io::Result<()> {
    let FindResult::Exact(addr) = interp.program.find_line(&interp.mem, line_no) else {
        println!("No such line");
        return Ok(());
    };
    let (start, len) = interp.program.tokens(&interp.mem, addr);
    let tokens = read_tokens(interp, start, len);
    println!("{}", detokenize(&tokens));
    print!("{line_no:>5} ");
    io::stdout().flush()?;
    let mut buf = String::new();
    io::stdin().read_line(&mut buf)?;
    let text = buf.trim_end_matches(['\r', '\n']);
    if !text.is_empty() {
        if let Ok(new_tokens) = basic_lexer::tokenize(text) {
            let _ = interp.program.set_line(&mut interp.mem, line_no, &new_tokens);
        }
    }
    Ok(())
}
