//! The statement dispatch loop (spec §4.G): reads one token, executes it,
//! and repeats. Control constructs (`GOTO`/`GOSUB`, loops, `IF`, `CASE`)
//! just reposition the loop's cursor; `PROC` calls stay in the same loop
//! too (a call frame remembers where to resume). `FN` calls are the one
//! construct that genuinely recurses the Rust call stack, since
//! `Runtime::call_function` has to hand back a `Value` synchronously to
//! whatever expression called it.

use std::rc::Rc;

use basic_core::{arith, BasicError, ErrorCode, Value};
use basic_eval::{evaluate, strings, Cursor};
use basic_lexer::keyword::{self, text_for_token};
use basic_memory::{Addr, MemorySpace};
use basic_program::FindResult;
use basic_symbols::{ArrayBinding, Binding, FieldType, StructDef, StructInstance};

use crate::error::ExecError;
use crate::frame::{Frame, LoopKind, Pos, ReturnBinding};
use crate::interpreter::{ErrorTrap, Interpreter};

/// What a statement (or a whole run) just did.
pub enum Flow {
    /// Keep looping; `pos` already points at wherever execution continues.
    Next,
    EndProgram,
    Stopped,
    Paused,
    /// `ENDPROC`/`=expr` unwound back to the call boundary this particular
    /// `run_from` invocation owns. Only ever produced for a [`Frame::FnReturn`]
    /// in practice — `PROC` calls never leave the loop that pushed them.
    Returned(Option<Value>),
}

/// What `run()` (or a resumed `PAUSE`) reports back to the host.
pub enum RunOutcome {
    Ended,
    Stopped,
    Paused,
    Error(ExecError),
}

fn kw(name: &str) -> u8 {
    keyword::token_for_keyword(name).unwrap_or_else(|| unreachable!("{name} is always a keyword"))
}

fn err(code: ErrorCode, message: impl Into<String>) -> ExecError {
    ExecError::new(code, message)
}

/// Run the whole program from its first line, to completion, a `STOP`, a
/// `PAUSE`, or an uncaught error.
pub fn run(interp: &mut Interpreter) -> RunOutcome {
    scan_definitions(interp);
    let first = interp.program.page();
    if interp.program.next_line(&interp.mem, first).is_none() {
        return RunOutcome::Ended;
    }
    interp.clear();
    resume_from(interp, pos_for_line(interp, first))
}

/// Reserved line number a REPL can stage a typed, unstored statement at
/// (spec §6.3's immediate mode): higher than any line a real program can
/// reach via `GOTO`/`GOSUB` in practice, so the statement falls off the
/// end of the program when it finishes, instead of into whatever the
/// stored program happens to have next, unless it explicitly transfers
/// control itself (a typed `GOTO 10` really does resume the program).
pub const IMMEDIATE_LINE: u16 = 0xFFFF;

/// Run one line of tokens that isn't otherwise part of the stored program
/// (spec §6.3): stage it as the last line, execute it the same way any
/// other statement runs, then remove it again so `LIST` never sees it.
///
/// # Errors
/// Whatever staging the line into the program store itself reports (out
/// of room), surfaced the same way a statement execution error is.
pub fn run_immediate(interp: &mut Interpreter, tokens: &[u8]) -> RunOutcome {
    if let Err(e) = interp.program.set_line(&mut interp.mem, IMMEDIATE_LINE, tokens) {
        return RunOutcome::Error(e.into());
    }
    let addr = match interp.program.find_line(&interp.mem, IMMEDIATE_LINE) {
        FindResult::Exact(addr) => addr,
        _ => return RunOutcome::Error(err(ErrorCode::SYNTAX_ERROR, "couldn't stage immediate statement")),
    };
    let outcome = resume_from(interp, pos_for_line(interp, addr));
    let _ = interp.program.set_line(&mut interp.mem, IMMEDIATE_LINE, &[]);
    outcome
}

/// Resume execution (e.g. after a host-initiated `PAUSE`) from a saved
/// position instead of the program's first line.
pub fn resume_from(interp: &mut Interpreter, start: Pos) -> RunOutcome {
    match run_from(interp, start, 0) {
        Ok(Flow::EndProgram | Flow::Returned(_)) => RunOutcome::Ended,
        Ok(Flow::Stopped) => RunOutcome::Stopped,
        Ok(Flow::Paused) => RunOutcome::Paused,
        Ok(Flow::Next) => unreachable!("run_from never returns mid-statement"),
        Err(e) => {
            if e.code.0 < 0 {
                interp.exit_code = Some(-e.code.0);
            }
            RunOutcome::Error(e)
        }
    }
}

/// One deferred scan over the whole program (`RUN`'s first act, spec
/// §4.G): register every `DEF FN`/`DEF PROC` so calls can resolve by name
/// without a linear search each time.
fn scan_definitions(interp: &mut Interpreter) {
    interp.symbols.clear_functions();
    interp.struct_defs.clear();
    let def_token = kw("DEF");
    let fn_token = kw("FN");
    let proc_token = kw("PROC");
    let mut search_from = interp.program.page();
    while let Some(line_addr) = interp.program.search_line_with_token(&interp.mem, search_from, def_token) {
        let (start, len) = interp.program.tokens(&interp.mem, line_addr);
        let end = start.add(len);
        if let Some(def_pos) = find_byte_outside_strings(interp, start, end, def_token) {
            let mut cur = Cursor::new(def_pos, end);
            cur.advance();
            cur.skip_spaces(&interp.mem);
            let kind = cur.bump(&interp.mem);
            cur.skip_spaces(&interp.mem);
            let name = cur.read_identifier(&interp.mem);
            if !name.is_empty() {
                if kind == Some(fn_token) {
                    interp.symbols.define_function(name, cur.pos);
                } else if kind == Some(proc_token) {
                    interp.symbols.define_procedure(name, cur.pos);
                }
            }
        }
        search_from = match interp.program.next_line(&interp.mem, line_addr) {
            Some(next) => next,
            None => break,
        };
    }
}

fn find_byte_outside_strings(interp: &Interpreter, start: Addr, end: Addr, target: u8) -> Option<Addr> {
    let mut in_string = false;
    let mut cur = start;
    while cur.as_usize() < end.as_usize() {
        let b = interp.mem.read_u8(cur);
        if in_string {
            if b == b'"' {
                in_string = false;
            }
        } else if b == b'"' {
            in_string = true;
        } else if b == target {
            return Some(cur);
        }
        cur = cur.add(1);
    }
    None
}

fn pos_for_line(interp: &Interpreter, line: Addr) -> Pos {
    let (start, len) = interp.program.tokens(&interp.mem, line);
    Pos {
        cursor: Cursor::new(start, start.add(len)),
        line,
    }
}

fn line_containing(interp: &Interpreter, addr: Addr) -> Option<Addr> {
    let mut cur = interp.program.page();
    loop {
        let (start, len) = interp.program.tokens(&interp.mem, cur);
        let end = start.add(len);
        if addr.as_usize() >= cur.as_usize() && addr.as_usize() <= end.as_usize() {
            return Some(cur);
        }
        cur = interp.program.next_line(&interp.mem, cur)?;
    }
}

/// The flat dispatch loop. `stop_depth` is the control-stack depth this
/// invocation owns: an `ENDPROC`/`=expr` that unwinds back down to it
/// returns control to the caller instead of continuing to loop. Top-level
/// `RUN` passes `0`; a recursive `FN` call passes its own call-time depth.
fn run_from(interp: &mut Interpreter, start: Pos, stop_depth: usize) -> Result<Flow, ExecError> {
    let mut pos = start;
    loop {
        interp.cursor = pos.cursor;
        interp.current_line = pos.line;

        if interp.flags.kill {
            interp.exit_code = Some(-1);
            return Ok(Flow::EndProgram);
        }
        if interp.flags.pause {
            return Ok(Flow::Paused);
        }
        if interp.flags.escape {
            interp.flags.escape = false;
            if let Err(e) = Err::<(), _>(err(ErrorCode::ESCAPE, "Escape")) {
                if let Some(next) = catch_or_propagate(interp, &mut pos, e)? {
                    return Ok(next);
                }
                continue;
            }
        }
        if interp.flags.alert {
            if let Some(handler) = interp.events.dispatch_next() {
                if let Some(line) = line_containing(interp, handler) {
                    let target = pos_at(interp, line, handler);
                    interp.control.push(Frame::Gosub { return_pos: pos });
                    pos = target;
                }
            }
            if interp.events.is_empty() {
                interp.flags.alert = false;
            }
        }

        interp.accumulator.clear();
        pos.cursor.skip_spaces(&interp.mem);
        if pos.cursor.at_end() {
            match interp.program.next_line(&interp.mem, pos.line) {
                Some(next) if interp.program.tokens(&interp.mem, next).1 > 0 => {
                    pos = pos_for_line(interp, next);
                    continue;
                }
                _ => return Ok(Flow::EndProgram),
            }
        }

        let b = pos.cursor.peek(&interp.mem).unwrap();
        if b == b':' {
            pos.cursor.advance();
            continue;
        }

        match exec_statement(interp, &mut pos, stop_depth) {
            Ok(Flow::Next) => continue,
            Ok(other) => return Ok(other),
            Err(e) => {
                if let Some(next) = catch_or_propagate(interp, &mut pos, e)? {
                    return Ok(next);
                }
            }
        }
    }
}

/// If `ON ERROR` is active at or above its installed depth, splice the
/// handler in and keep looping (spec §7); otherwise hand the error back
/// up to `run_from`'s caller.
fn catch_or_propagate(interp: &mut Interpreter, pos: &mut Pos, e: ExecError) -> Result<Option<Flow>, ExecError> {
    if let Some(trap) = interp.error_trap {
        if interp.control.depth() >= trap.anchor {
            interp.error_state = basic_eval::ErrorState {
                err: e.code.0,
                erl: e.line.unwrap_or(0),
                report: e.message.clone(),
            };
            interp.control.truncate(trap.anchor);
            *pos = trap.handler;
            return Ok(None);
        }
    }
    Err(e)
}

fn pos_at(interp: &Interpreter, line: Addr, addr: Addr) -> Pos {
    let (start, len) = interp.program.tokens(&interp.mem, line);
    Pos {
        cursor: Cursor::new(addr, start.add(len)),
        line,
    }
}

fn pos_for_found_line(interp: &Interpreter, found: FindResult) -> Result<Pos, ExecError> {
    match found {
        FindResult::Exact(addr) => Ok(pos_for_line(interp, addr)),
        _ => Err(err(ErrorCode::NO_SUCH_LINE, "no such line")),
    }
}

// ---------------------------------------------------------------------
// cursor / expression helpers
// ---------------------------------------------------------------------

fn skip_ws(interp: &Interpreter, pos: &mut Pos) {
    pos.cursor.skip_spaces(&interp.mem);
}

fn peek(interp: &Interpreter, pos: &Pos) -> Option<u8> {
    pos.cursor.peek(&interp.mem)
}

fn read_ident(interp: &Interpreter, pos: &mut Pos) -> String {
    pos.cursor.read_identifier(&interp.mem)
}

fn eval_expr(interp: &mut Interpreter, pos: &mut Pos) -> Result<Value, ExecError> {
    let mut cursor = pos.cursor;
    let v = evaluate(&mut cursor, interp)?;
    pos.cursor = cursor;
    Ok(v)
}

/// Copy an accumulator-resident string onto the heap before it's stashed
/// anywhere that outlives the current statement (a variable, a `LOCAL`
/// save, a `RETURN`-formal writeback).
fn promote(interp: &mut Interpreter, v: Value) -> Result<Value, ExecError> {
    match v {
        Value::Str(s) if !s.owned => {
            let stack_top = interp.stack_top_addr();
            let promoted = strings::promote_to_heap(&mut interp.mem, &mut interp.heap, &interp.accumulator, s, stack_top)?;
            Ok(Value::Str(promoted))
        }
        other => Ok(other),
    }
}

fn read_line_number(interp: &Interpreter, pos: &mut Pos) -> Option<u16> {
    skip_ws(interp, pos);
    let text = pos.cursor.read_number_text(&interp.mem);
    text.parse::<u16>().ok()
}

/// Walk forward token-by-token (string- and `REM`-aware, crossing line
/// boundaries) until a byte in `targets` turns up at nesting depth zero.
/// `open` increments depth, `close` decrements it unless it's also a
/// target, in which case it's reported like any other match.
fn scan_forward(interp: &Interpreter, from: Pos, open: u8, close: u8, targets: &[u8]) -> Option<(u8, Pos)> {
    let mut line = from.line;
    let mut cur = from.cursor;
    let mut depth = 0i32;
    let mut in_string = false;
    let rem = kw("REM");
    loop {
        if cur.at_end() {
            line = interp.program.next_line(&interp.mem, line)?;
            let (s, l) = interp.program.tokens(&interp.mem, line);
            cur = Cursor::new(s, s.add(l));
            continue;
        }
        let b = cur.peek(&interp.mem).unwrap();
        if in_string {
            cur.advance();
            if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
            cur.advance();
            continue;
        }
        if b == rem {
            line = interp.program.next_line(&interp.mem, line)?;
            let (s, l) = interp.program.tokens(&interp.mem, line);
            cur = Cursor::new(s, s.add(l));
            continue;
        }
        if depth == 0 && targets.contains(&b) {
            let here = Pos { cursor: cur, line };
            cur.advance();
            return Some((b, here));
        }
        if b == open {
            depth += 1;
            cur.advance();
            continue;
        }
        if b == close {
            if depth == 0 {
                let here = Pos { cursor: cur, line };
                cur.advance();
                return Some((b, here));
            }
            depth -= 1;
            cur.advance();
            continue;
        }
        cur.advance();
    }
}

/// Same idea, but never leaves the current line (for single-line `IF`'s
/// inline `ELSE`, which can't span a newline).
fn scan_line_for_token(interp: &Interpreter, mut cursor: Cursor, target: u8) -> Option<Cursor> {
    let mut in_string = false;
    while !cursor.at_end() {
        let b = cursor.peek(&interp.mem).unwrap();
        if in_string {
            cursor.advance();
            if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
            cursor.advance();
            continue;
        }
        if b == target {
            cursor.advance();
            return Some(cursor);
        }
        cursor.advance();
    }
    None
}

/// Jump to just past the line containing a matched loop/block terminator,
/// used by `EXIT` and a false `FOR`'s zero-iteration skip. Simplifying
/// assumption: the terminator (`NEXT`, `UNTIL <cond>`, `ENDWHILE`) is the
/// last thing on its line, so "skip past it" is "skip to line end".
fn landing_after(interp: &Interpreter, matched_line: Addr) -> Pos {
    let (start, len) = interp.program.tokens(&interp.mem, matched_line);
    let end = start.add(len);
    Pos {
        cursor: Cursor::new(end, end),
        line: matched_line,
    }
}

fn default_value(name: &str) -> Value {
    match basic_symbols::SymbolTable::declared_kind(name) {
        basic_symbols::SuffixKind::Int => Value::Int(0),
        basic_symbols::SuffixKind::Float | basic_symbols::SuffixKind::Struct => Value::Float(0.0),
        basic_symbols::SuffixKind::Str => Value::Str(basic_core::StrRef::heap(Addr::NULL, 0)),
    }
}

fn field_type_of(name: &str) -> FieldType {
    match basic_symbols::SymbolTable::declared_kind(name) {
        basic_symbols::SuffixKind::Int => FieldType::Int,
        basic_symbols::SuffixKind::Str => FieldType::Str,
        _ => FieldType::Float,
    }
}

/// Apply a single popped frame's restore action. Frames that don't carry
/// one (`Gosub`, loop frames, `ReturnInfo`, `Module`-less call markers)
/// are no-ops here; their callers handle the jump itself.
fn apply_frame_restore(interp: &mut Interpreter, frame: &Frame) {
    match frame {
        Frame::Local { var_name, saved } | Frame::DimStack { var_name, saved } => match saved {
            Some(b) => interp.symbols.set(var_name, b.clone()),
            None => interp.symbols.set_scalar(var_name, default_value(var_name)),
        },
        Frame::Private { var_name, saved, site } => {
            if let Some(value) = interp.symbols.get_scalar(var_name) {
                interp.private_vars.insert((*site, var_name.clone()), value);
            }
            match saved {
                Some(b) => interp.symbols.set(var_name, b.clone()),
                None => interp.symbols.set_scalar(var_name, default_value(var_name)),
            }
        }
        Frame::LocalData { saved_line, saved_item } => interp.program.set_data_cursor(*saved_line, *saved_item),
        Frame::OnError { saved_handler, saved_anchor } => {
            interp.error_trap = saved_handler.map(|handler| ErrorTrap { handler, anchor: *saved_anchor });
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------
// top-level statement dispatch
// ---------------------------------------------------------------------

fn exec_statement(interp: &mut Interpreter, pos: &mut Pos, stop_depth: usize) -> Result<Flow, ExecError> {
    let b = pos.cursor.peek(&interp.mem).unwrap();

    if b == b'=' {
        pos.cursor.advance();
        return exec_fn_return(interp, pos);
    }
    if b == b'*' {
        pos.cursor.advance();
        return exec_star_command(interp, pos);
    }
    if keyword::FIRST_KEYWORD_TOKEN <= b && b <= keyword::LAST_KEYWORD_TOKEN {
        if let Some(name) = text_for_token(b) {
            pos.cursor.advance();
            return dispatch_keyword(interp, pos, stop_depth, name);
        }
    }
    if b.is_ascii_alphabetic() || b == b'@' {
        return exec_assignment(interp, pos);
    }

    eval_expr(interp, pos)?;
    Ok(Flow::Next)
}

fn dispatch_keyword(interp: &mut Interpreter, pos: &mut Pos, stop_depth: usize, name: &str) -> Result<Flow, ExecError> {
    match name {
        "LET" => exec_assignment(interp, pos),
        "GOTO" => exec_goto(interp, pos),
        "GOSUB" => exec_gosub(interp, pos),
        "RETURN" => exec_return(interp, pos),
        "FOR" => exec_for(interp, pos),
        "NEXT" => exec_next(interp, pos),
        "REPEAT" => {
            interp.control.push(Frame::Repeat { body_pos: *pos });
            Ok(Flow::Next)
        }
        "UNTIL" => exec_until(interp, pos),
        "WHILE" => exec_while(interp, pos),
        "ENDWHILE" => {
            while let Some(f) = interp.control.pop() {
                if f.loop_kind() == Some(LoopKind::While) {
                    break;
                }
                apply_frame_restore(interp, &f);
            }
            Ok(Flow::Next)
        }
        "EXIT" => exec_exit(interp, pos),
        "IF" => exec_if(interp, pos),
        "ELSE" => {
            pos.cursor.pos = pos.cursor.end;
            Ok(Flow::Next)
        }
        "ENDIF" => Ok(Flow::Next),
        "CASE" => exec_case(interp, pos),
        "WHEN" | "OTHERWISE" => {
            let (_, landing) = scan_forward(interp, *pos, kw("CASE"), kw("ENDCASE"), &[kw("ENDCASE")])
                .ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "ENDCASE not found"))?;
            *pos = landing_after(interp, landing.line);
            Ok(Flow::Next)
        }
        "ENDCASE" => Ok(Flow::Next),
        "PROC" => exec_proc_call(interp, pos),
        "ENDPROC" => {
            let return_pos = unwind_to_call_boundary(interp)?;
            *pos = return_pos;
            Ok(Flow::Next)
        }
        "DEF" => exec_def_header(interp, pos),
        "LOCAL" => exec_local(interp, pos, false),
        "PRIVATE" => exec_local(interp, pos, true),
        "DIM" => exec_dim(interp, pos, None),
        "READ" => exec_read(interp, pos),
        "DATA" => {
            pos.cursor.pos = pos.cursor.end;
            Ok(Flow::Next)
        }
        "RESTORE" => exec_restore(interp, pos),
        "ON" => exec_on(interp, pos),
        "ERROR" => exec_error_stmt(interp, pos),
        "INPUT" => exec_input(interp, pos),
        "PRINT" => exec_print(interp, pos),
        "BPUT" => exec_bput(interp, pos),
        "OSCLI" => exec_oscli(interp, pos),
        "STOP" => Ok(Flow::Stopped),
        "END" => Ok(Flow::EndProgram),
        "REM" => {
            pos.cursor.pos = pos.cursor.end;
            Ok(Flow::Next)
        }
        "CLEAR" => {
            interp.clear();
            Ok(Flow::Next)
        }
        "NEW" => {
            interp.new_program();
            Ok(Flow::Next)
        }
        "TRACE" | "INSTALL" | "CHAIN" => {
            tracing::warn!(statement = name, "not implemented, ignoring rest of line");
            pos.cursor.pos = pos.cursor.end;
            Ok(Flow::Next)
        }
        _ => {
            pos.cursor.pos = pos.cursor.pos.sub(1);
            eval_expr(interp, pos)?;
            let _ = stop_depth;
            Ok(Flow::Next)
        }
    }
}

// ---------------------------------------------------------------------
// assignment
// ---------------------------------------------------------------------

fn exec_assignment(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let name = read_ident(interp, pos);
    if name.is_empty() {
        return Err(err(ErrorCode::SYNTAX_ERROR, "expected a statement"));
    }

    if let Some(base) = name.strip_suffix('.') {
        let field = read_ident(interp, pos);
        skip_ws(interp, pos);
        expect_byte(interp, pos, b'=')?;
        let value = eval_expr(interp, pos)?;
        let value = promote(interp, value)?;
        let binding = interp
            .symbols
            .get_binding_mut(base)
            .ok_or_else(|| err(ErrorCode::NO_SUCH_VARIABLE, format!("no such structure {base}")))?;
        match binding {
            Binding::Struct(s) => {
                s.set(&field, value).ok_or_else(|| err(ErrorCode::NO_SUCH_STRUCT_FIELD, field.clone()))?;
            }
            _ => return Err(err(ErrorCode::TYPE_MISMATCH, "not a structure")),
        }
        return Ok(Flow::Next);
    }

    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'(') {
        let save = pos.cursor;
        pos.cursor.advance();
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b')') {
            pos.cursor.advance();
            return exec_whole_array_assignment(interp, pos, &name);
        }
        pos.cursor = save;
        return exec_array_element_assignment(interp, pos, &name);
    }

    expect_byte(interp, pos, b'=')?;
    let value = eval_expr(interp, pos)?;
    let value = promote(interp, value)?;
    interp.symbols.set_scalar(&name, value);
    Ok(Flow::Next)
}

fn expect_byte(interp: &Interpreter, pos: &mut Pos, target: u8) -> Result<(), ExecError> {
    skip_ws(interp, pos);
    if pos.cursor.bump(&interp.mem) == Some(target) {
        Ok(())
    } else {
        Err(err(ErrorCode::SYNTAX_ERROR, format!("expected '{}'", target as char)))
    }
}

fn expect_token(interp: &Interpreter, pos: &mut Pos, tok: u8, what: &str) -> Result<(), ExecError> {
    skip_ws(interp, pos);
    if pos.cursor.bump(&interp.mem) == Some(tok) {
        Ok(())
    } else {
        Err(err(ErrorCode::SYNTAX_ERROR, format!("expected {what}")))
    }
}

fn exec_array_element_assignment(interp: &mut Interpreter, pos: &mut Pos, name: &str) -> Result<Flow, ExecError> {
    pos.cursor.advance();
    let mut subs = Vec::new();
    skip_ws(interp, pos);
    loop {
        let v = eval_expr(interp, pos)?;
        subs.push(index_of(v)?);
        skip_ws(interp, pos);
        match pos.cursor.bump(&interp.mem) {
            Some(b',') => {
                skip_ws(interp, pos);
                continue;
            }
            Some(b')') => break,
            _ => return Err(err(ErrorCode::SYNTAX_ERROR, "expected ',' or ')'")),
        }
    }
    expect_byte(interp, pos, b'=')?;
    let value = eval_expr(interp, pos)?;
    let value = promote(interp, value)?;
    let binding = interp.symbols.get_binding_mut(name).ok_or_else(|| err(ErrorCode::NO_SUCH_VARIABLE, name.to_string()))?;
    let array = binding.as_array_mut().ok_or_else(|| err(ErrorCode::BAD_USE_OF_ARRAY, "not an array"))?;
    let flat = array
        .flat_index(&subs)
        .ok_or_else(|| err(ErrorCode::BAD_USE_OF_ARRAY, "subscript out of range"))?;
    array.data[flat] = value;
    Ok(Flow::Next)
}

fn index_of(v: Value) -> Result<usize, ExecError> {
    match v {
        Value::Int(n) if n >= 0 => Ok(n as usize),
        Value::Float(f) if f >= 0.0 => Ok(f as usize),
        _ => Err(err(ErrorCode::BAD_USE_OF_ARRAY, "negative subscript")),
    }
}

fn try_parse_array_ref(interp: &mut Interpreter, pos: &mut Pos) -> Option<String> {
    skip_ws(interp, pos);
    let b = peek(interp, pos)?;
    if !b.is_ascii_alphabetic() {
        return None;
    }
    let save = pos.cursor;
    let name = read_ident(interp, pos);
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'(') {
        let save2 = pos.cursor;
        pos.cursor.advance();
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b')') {
            pos.cursor.advance();
            return Some(name);
        }
        pos.cursor = save2;
    }
    pos.cursor = save;
    None
}

fn exec_whole_array_assignment(interp: &mut Interpreter, pos: &mut Pos, name: &str) -> Result<Flow, ExecError> {
    expect_byte(interp, pos, b'=')?;
    skip_ws(interp, pos);

    if let Some(rhs_name) = try_parse_array_ref(interp, pos) {
        let rhs = array_clone(interp, &rhs_name)?;
        skip_ws(interp, pos);
        let op_byte = peek(interp, pos).filter(|b| matches!(b, b'+' | b'-' | b'*' | b'/' | b'.'));
        let data = if let Some(opb) = op_byte {
            pos.cursor.advance();
            skip_ws(interp, pos);
            if let Some(rhs2_name) = try_parse_array_ref(interp, pos) {
                let rhs2 = array_clone(interp, &rhs2_name)?;
                if opb == b'.' {
                    basic_eval::array::dot_product(&rhs, &rhs2)?
                } else {
                    basic_eval::array::combine_elementwise(&rhs, Some(&rhs2), None, op_fn(opb))?
                }
            } else {
                let scalar = eval_expr(interp, pos)?;
                basic_eval::array::combine_elementwise(&rhs, None, Some(scalar), op_fn(opb))?
            }
        } else {
            rhs.data.clone()
        };
        let binding = interp.symbols.get_binding_mut(name).ok_or_else(|| err(ErrorCode::NO_SUCH_VARIABLE, name.to_string()))?;
        let target = binding.as_array_mut().ok_or_else(|| err(ErrorCode::BAD_USE_OF_ARRAY, "not an array"))?;
        if data.len() != target.data.len() {
            return Err(err(ErrorCode::BAD_USE_OF_ARRAY, "array shapes don't match"));
        }
        target.data = data;
        return Ok(Flow::Next);
    }

    let mut values = Vec::new();
    loop {
        values.push(eval_expr(interp, pos)?);
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            skip_ws(interp, pos);
            continue;
        }
        break;
    }
    let binding = interp.symbols.get_binding_mut(name).ok_or_else(|| err(ErrorCode::NO_SUCH_VARIABLE, name.to_string()))?;
    let target = binding.as_array_mut().ok_or_else(|| err(ErrorCode::BAD_USE_OF_ARRAY, "not an array"))?;
    basic_eval::array::fill_from_initializer_list(target, &values);
    Ok(Flow::Next)
}

fn array_clone(interp: &mut Interpreter, name: &str) -> Result<ArrayBinding, ExecError> {
    match interp.symbols.get_binding(name) {
        Some(Binding::Array(a)) => Ok(a.clone()),
        Some(_) => Err(err(ErrorCode::BAD_USE_OF_ARRAY, "not an array")),
        None => Err(err(ErrorCode::NO_SUCH_VARIABLE, name.to_string())),
    }
}

fn op_fn(b: u8) -> impl Fn(Value, Value) -> Result<Value, BasicError> {
    move |a, v| match b {
        b'+' => arith::add(a, v),
        b'-' => arith::sub(a, v),
        b'*' => arith::mul(a, v),
        b'/' => arith::div(a, v),
        _ => arith::add(a, v),
    }
}

// ---------------------------------------------------------------------
// GOTO / GOSUB / RETURN
// ---------------------------------------------------------------------

fn exec_goto(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let n = read_line_number(interp, pos).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "expected a line number"))?;
    *pos = pos_for_found_line(interp, interp.program.find_line(&interp.mem, n))?;
    Ok(Flow::Next)
}

fn exec_gosub(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let n = read_line_number(interp, pos).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "expected a line number"))?;
    let target = pos_for_found_line(interp, interp.program.find_line(&interp.mem, n))?;
    interp.control.push(Frame::Gosub { return_pos: *pos });
    *pos = target;
    Ok(Flow::Next)
}

fn exec_return(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let explicit_line = if peek(interp, pos).is_some_and(|b| b.is_ascii_digit()) {
        read_line_number(interp, pos)
    } else {
        None
    };
    loop {
        let frame = interp.control.pop().ok_or_else(|| err(ErrorCode::NOT_IN_SUBROUTINE, "not in a subroutine"))?;
        if let Frame::Gosub { return_pos } = frame {
            *pos = match explicit_line {
                Some(n) => pos_for_found_line(interp, interp.program.find_line(&interp.mem, n))?,
                None => return_pos,
            };
            return Ok(Flow::Next);
        }
        apply_frame_restore(interp, &frame);
    }
}

// ---------------------------------------------------------------------
// FOR / NEXT
// ---------------------------------------------------------------------

fn exec_for(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let var = read_ident(interp, pos);
    expect_byte(interp, pos, b'=')?;
    let start = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    expect_token(interp, pos, kw("TO"), "TO")?;
    let limit = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    let step = if peek(interp, pos) == Some(kw("STEP")) {
        pos.cursor.advance();
        eval_expr(interp, pos)?
    } else {
        Value::Int(1)
    };
    let start = promote(interp, start)?;
    interp.symbols.set_scalar(&var, start);

    let enters = if step.as_f64().unwrap_or(0.0) >= 0.0 {
        start.as_f64().unwrap_or(0.0) <= limit.as_f64().unwrap_or(0.0)
    } else {
        start.as_f64().unwrap_or(0.0) >= limit.as_f64().unwrap_or(0.0)
    };

    if enters {
        interp.control.push(Frame::For {
            body_pos: *pos,
            var_name: var,
            limit,
            step,
        });
    } else if let Some((_, matched)) = scan_forward(interp, *pos, kw("FOR"), kw("NEXT"), &[kw("NEXT")]) {
        *pos = landing_after(interp, matched.line);
    } else {
        return Err(err(ErrorCode::NOT_IN_A_FOR_LOOP, "NEXT not found"));
    }
    Ok(Flow::Next)
}

fn exec_next(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let requested = if peek(interp, pos).is_some_and(|b| b.is_ascii_alphabetic()) {
        Some(read_ident(interp, pos))
    } else {
        None
    };
    loop {
        let frame = interp
            .control
            .pop()
            .ok_or_else(|| err(ErrorCode::NOT_IN_A_FOR_LOOP, "NEXT without FOR"))?;
        match frame {
            Frame::For { body_pos, var_name, limit, step } => {
                if let Some(want) = &requested {
                    if !want.eq_ignore_ascii_case(&var_name) {
                        continue;
                    }
                }
                let current = interp.symbols.get_scalar(&var_name).unwrap_or(Value::Int(0));
                let next_val = arith::add(current, step)?;
                let continues = if step.as_f64().unwrap_or(0.0) >= 0.0 {
                    next_val.as_f64().unwrap_or(0.0) <= limit.as_f64().unwrap_or(0.0)
                } else {
                    next_val.as_f64().unwrap_or(0.0) >= limit.as_f64().unwrap_or(0.0)
                };
                interp.symbols.set_scalar(&var_name, next_val);
                if continues {
                    interp.control.push(Frame::For { body_pos, var_name, limit, step });
                    *pos = body_pos;
                }
                return Ok(Flow::Next);
            }
            other => apply_frame_restore(interp, &other),
        }
    }
}

// ---------------------------------------------------------------------
// REPEAT / UNTIL, WHILE / ENDWHILE, EXIT
// ---------------------------------------------------------------------

fn exec_until(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let cond = eval_expr(interp, pos)?;
    loop {
        let frame = interp.control.pop().ok_or_else(|| err(ErrorCode::NOT_IN_A_LOOP, "UNTIL without REPEAT"))?;
        if let Frame::Repeat { body_pos } = frame {
            if !cond.is_truthy() {
                *pos = body_pos;
            }
            return Ok(Flow::Next);
        }
        apply_frame_restore(interp, &frame);
    }
}

fn exec_while(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let condition_pos = *pos;
    let cond = eval_expr(interp, pos)?;
    if cond.is_truthy() {
        interp.control.push(Frame::While { condition_pos });
    } else if let Some((_, matched)) = scan_forward(interp, *pos, kw("WHILE"), kw("ENDWHILE"), &[kw("ENDWHILE")]) {
        *pos = landing_after(interp, matched.line);
    } else {
        return Err(err(ErrorCode::NOT_IN_A_LOOP, "ENDWHILE not found"));
    }
    Ok(Flow::Next)
}

fn exec_exit(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let b = pos.cursor.peek(&interp.mem).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "expected FOR/REPEAT/WHILE"))?;
    let (kind, open, close, var) = if b == kw("FOR") {
        pos.cursor.advance();
        skip_ws(interp, pos);
        let v = if peek(interp, pos).is_some_and(|c| c.is_ascii_alphabetic()) {
            Some(read_ident(interp, pos))
        } else {
            None
        };
        (LoopKind::For, kw("FOR"), kw("NEXT"), v)
    } else if b == kw("REPEAT") {
        pos.cursor.advance();
        (LoopKind::Repeat, kw("REPEAT"), kw("UNTIL"), None)
    } else if b == kw("WHILE") {
        pos.cursor.advance();
        (LoopKind::While, kw("WHILE"), kw("ENDWHILE"), None)
    } else {
        return Err(err(ErrorCode::SYNTAX_ERROR, "expected FOR/REPEAT/WHILE"));
    };

    let code = match kind {
        LoopKind::For => ErrorCode::CANT_MATCH_FOR,
        _ => ErrorCode::NOT_IN_A_LOOP,
    };
    let body_pos = loop {
        let frame = interp.control.pop().ok_or_else(|| err(code, "not in a matching loop"))?;
        match (&frame, kind) {
            (Frame::For { body_pos, var_name, .. }, LoopKind::For) => {
                if var.as_ref().is_none_or(|v| v.eq_ignore_ascii_case(var_name)) {
                    break *body_pos;
                }
                apply_frame_restore(interp, &frame);
            }
            (Frame::Repeat { body_pos }, LoopKind::Repeat) => break *body_pos,
            (Frame::While { condition_pos }, LoopKind::While) => break *condition_pos,
            _ => apply_frame_restore(interp, &frame),
        }
    };
    let (_, matched) = scan_forward(interp, body_pos, open, close, &[close]).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "terminator not found"))?;
    *pos = landing_after(interp, matched.line);
    Ok(Flow::Next)
}

// ---------------------------------------------------------------------
// IF / THEN / ELSE / ENDIF
// ---------------------------------------------------------------------

fn exec_if(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let cond = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    expect_token(interp, pos, kw("THEN"), "THEN")?;
    skip_ws(interp, pos);

    if pos.cursor.at_end() {
        if cond.is_truthy() {
            return Ok(Flow::Next);
        }
        let Some(next_line) = interp.program.next_line(&interp.mem, pos.line) else {
            return Ok(Flow::EndProgram);
        };
        let from = pos_for_line(interp, next_line);
        let (_, landing) = scan_forward(interp, from, kw("IF"), kw("ENDIF"), &[kw("ELSE"), kw("ENDIF")])
            .ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "ENDIF not found"))?;
        *pos = landing;
        return Ok(Flow::Next);
    }

    if cond.is_truthy() {
        Ok(Flow::Next)
    } else if let Some(cur) = scan_line_for_token(interp, pos.cursor, kw("ELSE")) {
        pos.cursor = cur;
        Ok(Flow::Next)
    } else {
        pos.cursor.pos = pos.cursor.end;
        Ok(Flow::Next)
    }
}

// ---------------------------------------------------------------------
// CASE / WHEN / OTHERWISE / ENDCASE
// ---------------------------------------------------------------------

fn exec_case(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let value = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    expect_token(interp, pos, kw("OF"), "OF")?;

    let when = kw("WHEN");
    let otherwise = kw("OTHERWISE");
    let endcase = kw("ENDCASE");
    let case_tok = kw("CASE");

    loop {
        let Some((tok, found)) = scan_forward(interp, *pos, case_tok, endcase, &[when, otherwise, endcase]) else {
            return Err(err(ErrorCode::SYNTAX_ERROR, "ENDCASE not found"));
        };
        if tok == endcase {
            *pos = found;
            pos.cursor.advance();
            return Ok(Flow::Next);
        }
        if tok == otherwise {
            *pos = found;
            pos.cursor.advance();
            return Ok(Flow::Next);
        }
        // WHEN: parse its comma-separated value list and compare.
        let mut clause_pos = found;
        clause_pos.cursor.advance();
        let mut matched = false;
        loop {
            let candidate = eval_expr(interp, &mut clause_pos)?;
            if values_equal(interp, value, candidate)? {
                matched = true;
            }
            skip_ws(interp, &mut clause_pos);
            if peek(interp, &clause_pos) == Some(b',') {
                clause_pos.cursor.advance();
                skip_ws(interp, &mut clause_pos);
                continue;
            }
            break;
        }
        if matched {
            *pos = clause_pos;
            return Ok(Flow::Next);
        }
        *pos = clause_pos;
    }
}

fn values_equal(interp: &mut Interpreter, a: Value, b: Value) -> Result<bool, ExecError> {
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        let bx = strings::read(&interp.mem, &interp.accumulator, x).to_vec();
        let by = strings::read(&interp.mem, &interp.accumulator, y).to_vec();
        return Ok(bx == by);
    }
    Ok(matches!(arith::eq(a, b)?, Value::Int(n) if n != 0))
}

// ---------------------------------------------------------------------
// PROC / FN / DEF / ENDPROC / `=expr`
// ---------------------------------------------------------------------

struct Formal {
    name: String,
    is_return: bool,
}

fn resolve_call_site(interp: &Interpreter, def_addr: Addr) -> Result<(Vec<Formal>, Pos), ExecError> {
    let header_line = line_containing(interp, def_addr).ok_or_else(|| err(ErrorCode::BAD_PROGRAM, "definition not found"))?;
    let (start, len) = interp.program.tokens(&interp.mem, header_line);
    let end = start.add(len);
    let mut cur = Cursor::new(def_addr, end);
    let mut formals = Vec::new();
    cur.skip_spaces(&interp.mem);
    if cur.peek(&interp.mem) == Some(b'(') {
        cur.advance();
        cur.skip_spaces(&interp.mem);
        if cur.peek(&interp.mem) != Some(b')') {
            loop {
                cur.skip_spaces(&interp.mem);
                let is_return = if cur.peek(&interp.mem) == Some(kw("RETURN")) {
                    cur.advance();
                    cur.skip_spaces(&interp.mem);
                    true
                } else {
                    false
                };
                let fname = cur.read_identifier(&interp.mem);
                formals.push(Formal { name: fname, is_return });
                cur.skip_spaces(&interp.mem);
                match cur.bump(&interp.mem) {
                    Some(b',') => continue,
                    Some(b')') => break,
                    _ => return Err(err(ErrorCode::SYNTAX_ERROR, "expected ',' or ')'")),
                }
            }
        } else {
            cur.advance();
        }
    }
    let body = Pos {
        cursor: Cursor::new(cur.pos, end),
        line: header_line,
    };
    Ok((formals, body))
}

fn bind_call_frame(interp: &mut Interpreter, formals: &[Formal], actual_values: Vec<Value>, actual_names: Vec<Option<String>>) -> Result<(), ExecError> {
    let mut return_entries = Vec::new();
    for (i, formal) in formals.iter().enumerate() {
        let value = promote(interp, actual_values[i])?;
        let old = interp.symbols.get_scalar(&formal.name);
        interp.control.push(Frame::Local {
            var_name: formal.name.clone(),
            saved: old.map(Binding::Scalar),
        });
        interp.symbols.set_scalar(&formal.name, value);
        if formal.is_return {
            if let Some(actual) = &actual_names[i] {
                return_entries.push(ReturnBinding {
                    formal: formal.name.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }
    if !return_entries.is_empty() {
        interp.control.push(Frame::ReturnInfo { entries: return_entries });
    }
    Ok(())
}

fn parse_actuals(interp: &mut Interpreter, pos: &mut Pos, formals: &[Formal]) -> Result<(Vec<Value>, Vec<Option<String>>), ExecError> {
    let mut values = Vec::new();
    let mut names = Vec::new();
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'(') {
        pos.cursor.advance();
        skip_ws(interp, pos);
        if peek(interp, pos) != Some(b')') {
            for (i, formal) in formals.iter().enumerate() {
                skip_ws(interp, pos);
                if formal.is_return {
                    let n = read_ident(interp, pos);
                    let v = interp.symbols.get_scalar(&n).ok_or_else(|| err(ErrorCode::NO_SUCH_VARIABLE, n.clone()))?;
                    values.push(v);
                    names.push(Some(n));
                } else {
                    values.push(eval_expr(interp, pos)?);
                    names.push(None);
                }
                skip_ws(interp, pos);
                match pos.cursor.bump(&interp.mem) {
                    Some(b',') if i + 1 < formals.len() => continue,
                    Some(b')') => break,
                    _ => return Err(err(ErrorCode::INCORRECT_ARGUMENTS, "wrong number of arguments")),
                }
            }
        } else {
            pos.cursor.advance();
        }
    }
    if values.len() != formals.len() {
        return Err(err(ErrorCode::INCORRECT_ARGUMENTS, "wrong number of arguments"));
    }
    Ok((values, names))
}

fn exec_proc_call(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    let name = read_ident(interp, pos);
    let def_addr = interp
        .symbols
        .lookup_procedure(&name)
        .ok_or_else(|| err(ErrorCode::NO_SUCH_FN_PROC, format!("no such PROC{name}")))?;
    let (formals, body_pos) = resolve_call_site(interp, def_addr)?;
    let (values, names) = parse_actuals(interp, pos, &formals)?;

    let return_pos = *pos;
    interp.control.push(Frame::ProcReturn { return_pos });
    bind_call_frame(interp, &formals, values, names)?;
    *pos = body_pos;
    Ok(Flow::Next)
}

fn exec_def_header(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    pos.cursor.advance(); // FN or PROC
    skip_ws(interp, pos);
    let name = read_ident(interp, pos);
    let _ = name;
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'(') {
        pos.cursor.advance();
        let mut depth = 1;
        while depth > 0 {
            match pos.cursor.bump(&interp.mem) {
                Some(b'(') => depth += 1,
                Some(b')') => depth -= 1,
                Some(_) => {}
                None => break,
            }
        }
    }
    Ok(Flow::Next)
}

/// Pop frames (applying each one's restore action) until the call
/// boundary this `PROC`/`FN` pushed, writing back any `RETURN` formals
/// first, since that needs their *current* value before `Local` restores
/// it to whatever the caller had.
fn unwind_to_call_boundary(interp: &mut Interpreter) -> Result<Pos, ExecError> {
    loop {
        let frame = interp
            .control
            .pop()
            .ok_or_else(|| err(ErrorCode::NOT_IN_SUBROUTINE, "not in a PROC/FN"))?;
        match frame {
            Frame::ProcReturn { return_pos } | Frame::FnReturn { return_pos } => return Ok(return_pos),
            Frame::ReturnInfo { entries } => {
                for entry in entries {
                    if let Some(v) = interp.symbols.get_scalar(&entry.formal) {
                        let v = promote(interp, v)?;
                        interp.symbols.set_scalar(&entry.actual, v);
                    }
                }
            }
            other => apply_frame_restore(interp, &other),
        }
    }
}

fn exec_fn_return(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let value = eval_expr(interp, pos)?;
    let value = promote(interp, value)?;
    let return_pos = unwind_to_call_boundary(interp)?;
    *pos = return_pos;
    Ok(Flow::Returned(Some(value)))
}

/// `Runtime::call_function`'s implementation: resolve, bind, and run an
/// `FN` body to completion in its own (Rust-recursive) dispatch loop. The
/// caller's own `pos` lives on a different stack frame entirely (inside
/// `basic-eval`'s expression parser), so there's nothing to save here.
pub fn call_fn(interp: &mut Interpreter, name: &str, args: &[Value]) -> Result<Value, ExecError> {
    let def_addr = interp
        .symbols
        .lookup_function(name)
        .ok_or_else(|| err(ErrorCode::NO_SUCH_FN_PROC, format!("no such FN{name}")))?;
    let (formals, body_pos) = resolve_call_site(interp, def_addr)?;
    if formals.len() != args.len() {
        return Err(err(ErrorCode::INCORRECT_ARGUMENTS, "wrong number of arguments"));
    }
    let anchor = interp.control.depth();
    interp.control.push(Frame::FnReturn { return_pos: body_pos });
    bind_call_frame(interp, &formals, args.to_vec(), vec![None; formals.len()])?;
    match run_from(interp, body_pos, anchor)? {
        Flow::Returned(Some(v)) => Ok(v),
        Flow::Returned(None) => Ok(Value::Int(0)),
        _ => Err(err(ErrorCode::SYNTAX_ERROR, "FN ended without '='")),
    }
}

// ---------------------------------------------------------------------
// LOCAL / PRIVATE / DIM
// ---------------------------------------------------------------------

/// `LOCAL` saves-and-zeroes a name for the call's lifetime. `PRIVATE` does
/// the same save/restore, but initializes from (and, on unwind, writes
/// back to) a hidden companion slot keyed by the address of this
/// declaration plus the variable's name (spec §3/§4.G), so the value
/// persists across separate calls through the same call site rather than
/// resetting to zero/empty each time.
fn exec_local(interp: &mut Interpreter, pos: &mut Pos, private: bool) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("DIM")) {
        pos.cursor.advance();
        return exec_dim(interp, pos, Some(()));
    }
    loop {
        skip_ws(interp, pos);
        let site = pos.cursor.pos;
        let name = read_ident(interp, pos);
        if name.is_empty() {
            return Err(err(ErrorCode::SYNTAX_ERROR, "expected a variable name"));
        }
        let old = interp.symbols.get_scalar(&name);
        if private {
            let key = (site, name.clone());
            let init = interp.private_vars.get(&key).cloned().unwrap_or_else(|| default_value(&name));
            interp.control.push(Frame::Private {
                var_name: name.clone(),
                saved: old.map(Binding::Scalar),
                site,
            });
            interp.symbols.set_scalar(&name, init);
        } else {
            interp.control.push(Frame::Local {
                var_name: name.clone(),
                saved: old.map(Binding::Scalar),
            });
            interp.symbols.set_scalar(&name, default_value(&name));
        }
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    Ok(Flow::Next)
}

fn exec_dim(interp: &mut Interpreter, pos: &mut Pos, local: Option<()>) -> Result<Flow, ExecError> {
    loop {
        skip_ws(interp, pos);
        let name = read_ident(interp, pos);
        if name.is_empty() {
            return Err(err(ErrorCode::SYNTAX_ERROR, "expected a name to DIM"));
        }
        if let Some(base) = name.strip_suffix('{') {
            dim_struct(interp, pos, base, local.is_some())?;
        } else {
            skip_ws(interp, pos);
            if peek(interp, pos) == Some(b'(') {
                dim_array(interp, pos, &name, local.is_some())?;
            } else {
                dim_address_only(interp, pos, &name)?;
            }
        }
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    Ok(Flow::Next)
}

fn install_binding(interp: &mut Interpreter, name: &str, binding: Binding, local: bool) {
    if local {
        let old = interp.symbols.get_binding(name).cloned();
        interp.control.push(Frame::DimStack {
            var_name: name.to_string(),
            saved: old,
        });
    }
    interp.symbols.set(name, binding);
}

fn dim_array(interp: &mut Interpreter, pos: &mut Pos, name: &str, local: bool) -> Result<(), ExecError> {
    pos.cursor.advance();
    let mut dims = Vec::new();
    skip_ws(interp, pos);
    loop {
        let v = eval_expr(interp, pos)?;
        let n = index_of(v)?;
        dims.push(n + 1);
        skip_ws(interp, pos);
        match pos.cursor.bump(&interp.mem) {
            Some(b',') => {
                skip_ws(interp, pos);
                continue;
            }
            Some(b')') => break,
            _ => return Err(err(ErrorCode::SYNTAX_ERROR, "expected ',' or ')'")),
        }
    }
    let kind = field_type_of(name);
    let fill = default_value(name);
    let array = ArrayBinding::new(kind, dims, fill).ok_or_else(|| err(ErrorCode::BAD_DIM, "zero-extent dimension"))?;
    install_binding(interp, name, Binding::Array(array), local);
    Ok(())
}

fn dim_struct(interp: &mut Interpreter, pos: &mut Pos, base: &str, local: bool) -> Result<(), ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'}') {
        pos.cursor.advance();
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b'=') {
            pos.cursor.advance();
            skip_ws(interp, pos);
            let other = read_ident(interp, pos);
            let other_base = other.strip_suffix('{').unwrap_or(&other);
            skip_ws(interp, pos);
            expect_byte(interp, pos, b'{')?;
            expect_byte(interp, pos, b'}')?;
            let def = interp
                .struct_defs
                .get(other_base)
                .cloned()
                .ok_or_else(|| err(ErrorCode::NO_SUCH_STRUCT_FIELD, "unknown structure format"))?;
            interp.struct_defs.insert(base.to_string(), Rc::clone(&def));
            install_binding(interp, base, Binding::Struct(StructInstance::new(def)), local);
            return Ok(());
        }
        return Err(err(ErrorCode::SYNTAX_ERROR, "expected '=' after {}"));
    }
    let mut fields = Vec::new();
    loop {
        skip_ws(interp, pos);
        let fname = read_ident(interp, pos);
        if fname.is_empty() {
            return Err(err(ErrorCode::SYNTAX_ERROR, "expected a field name"));
        }
        let ft = field_type_of(&fname);
        fields.push((fname, ft));
        skip_ws(interp, pos);
        match pos.cursor.bump(&interp.mem) {
            Some(b',') => continue,
            Some(b'}') => break,
            _ => return Err(err(ErrorCode::SYNTAX_ERROR, "expected ',' or '}'")),
        }
    }
    let def = Rc::new(StructDef {
        name: base.to_string(),
        fields,
    });
    interp.struct_defs.insert(base.to_string(), Rc::clone(&def));
    install_binding(interp, base, Binding::Struct(StructInstance::new(def)), local);
    Ok(())
}

/// `DIM p% n`: reserve `n + 1` bytes on the heap and leave `p%` holding
/// the address, with no type tracking at all — the classic "byte buffer"
/// form of `DIM`.
fn dim_address_only(interp: &mut Interpreter, pos: &mut Pos, name: &str) -> Result<(), ExecError> {
    let size = eval_expr(interp, pos)?;
    let n = index_of(size)?;
    let stack_top = interp.stack_top_addr();
    let addr = interp.heap.allocate(&mut interp.mem, None, n + 1, stack_top, 0)?;
    interp.symbols.set_scalar(name, Value::Int(i64::from(addr.as_u32())));
    Ok(())
}

// ---------------------------------------------------------------------
// READ / DATA / RESTORE
// ---------------------------------------------------------------------

fn assign_read_value(interp: &mut Interpreter, name: &str, text: &str) -> Result<(), ExecError> {
    let value = if name.ends_with('$') {
        Value::Str(interp.accumulator.store(text.as_bytes()))
    } else {
        basic_eval::numtext::parse_numeric_prefix(text)
    };
    let value = promote(interp, value)?;
    interp.symbols.set_scalar(name, value);
    Ok(())
}

fn exec_read(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    loop {
        skip_ws(interp, pos);
        let name = read_ident(interp, pos);
        if name.is_empty() {
            return Err(err(ErrorCode::SYNTAX_ERROR, "expected a variable to READ into"));
        }
        let text = interp.program.read_data(&interp.mem)?;
        assign_read_value(interp, &name, &text)?;
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    Ok(Flow::Next)
}

fn exec_restore(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("LOCAL")) {
        pos.cursor.advance();
        let (saved_line, saved_item) = interp.program.data_cursor();
        interp.control.push(Frame::LocalData { saved_line, saved_item });
        return Ok(Flow::Next);
    }
    if pos.cursor.at_end() {
        interp.program.restore_to_first_data(&interp.mem);
        return Ok(Flow::Next);
    }
    if peek(interp, pos) == Some(b'+') {
        pos.cursor.advance();
        let n = read_line_number(interp, pos).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "expected a line offset"))?;
        interp.program.restore_relative(&interp.mem, pos.line, n)?;
        return Ok(Flow::Next);
    }
    let n = read_line_number(interp, pos).ok_or_else(|| err(ErrorCode::SYNTAX_ERROR, "expected a line number"))?;
    let addr = match interp.program.find_line(&interp.mem, n) {
        FindResult::Exact(a) => a,
        _ => return Err(err(ErrorCode::NO_SUCH_LINE, "no such line")),
    };
    interp.program.restore_to_line(addr);
    Ok(Flow::Next)
}

// ---------------------------------------------------------------------
// ON ERROR / ERROR / ON expr GOTO|GOSUB
// ---------------------------------------------------------------------

fn exec_on(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("ERROR")) {
        pos.cursor.advance();
        return exec_on_error(interp, pos);
    }

    let selector = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    let is_gosub = if peek(interp, pos) == Some(kw("GOSUB")) {
        pos.cursor.advance();
        true
    } else if peek(interp, pos) == Some(kw("GOTO")) {
        pos.cursor.advance();
        false
    } else if peek(interp, pos) == Some(kw("PROC")) {
        pos.cursor.advance();
        let n = selector.as_f64().unwrap_or(0.0) as i64;
        return exec_on_proc(interp, pos, n);
    } else {
        return Err(err(ErrorCode::SYNTAX_ERROR, "expected GOTO, GOSUB or PROC"));
    };
    let n = selector.as_f64().unwrap_or(0.0) as i64;
    let mut idx = 1i64;
    loop {
        skip_ws(interp, pos);
        let Some(line_no) = read_line_number(interp, pos) else { break };
        if idx == n {
            let target = pos_for_found_line(interp, interp.program.find_line(&interp.mem, line_no))?;
            if is_gosub {
                let return_pos = landing_after(interp, pos.line);
                interp.control.push(Frame::Gosub { return_pos });
            }
            *pos = target;
            return Ok(Flow::Next);
        }
        idx += 1;
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("ELSE")) {
        pos.cursor.advance();
        return Ok(Flow::Next);
    }
    Err(err(ErrorCode::ON_RANGE, "ON range"))
}

/// `ON expr PROC name1, name2, … [ELSE …]` (spec §4.G): picks the
/// (1-based) `n`th name and calls it exactly like a bare `PROC name(...)`
/// statement, reusing `exec_proc_call`'s own resolve/bind machinery. The
/// call's return address lands after the whole `ON` statement, not after
/// just the call, so the untaken names in the list are skipped rather
/// than evaluated.
fn exec_on_proc(interp: &mut Interpreter, pos: &mut Pos, n: i64) -> Result<Flow, ExecError> {
    let mut idx = 1i64;
    loop {
        skip_ws(interp, pos);
        if idx == n {
            let name = read_ident(interp, pos);
            if name.is_empty() {
                return Err(err(ErrorCode::SYNTAX_ERROR, "expected a PROC name"));
            }
            let def_addr = interp
                .symbols
                .lookup_procedure(&name)
                .ok_or_else(|| err(ErrorCode::NO_SUCH_FN_PROC, format!("no such PROC{name}")))?;
            let (formals, body_pos) = resolve_call_site(interp, def_addr)?;
            let (values, names) = parse_actuals(interp, pos, &formals)?;
            skip_to_statement_end(interp, pos);
            let return_pos = *pos;
            interp.control.push(Frame::ProcReturn { return_pos });
            bind_call_frame(interp, &formals, values, names)?;
            *pos = body_pos;
            return Ok(Flow::Next);
        }
        skip_on_proc_item(interp, pos);
        idx += 1;
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("ELSE")) {
        pos.cursor.advance();
        return Ok(Flow::Next);
    }
    Err(err(ErrorCode::ON_RANGE, "ON range"))
}

/// Skip one untaken `ON … PROC` list entry (a name and its optional
/// parenthesised actuals) without evaluating it.
fn skip_on_proc_item(interp: &Interpreter, pos: &mut Pos) {
    skip_ws(interp, pos);
    let _ = read_ident(interp, pos);
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'(') {
        pos.cursor.advance();
        let mut depth = 1i32;
        let mut in_string = false;
        while depth > 0 {
            let Some(b) = pos.cursor.peek(&interp.mem) else { break };
            pos.cursor.advance();
            if in_string {
                if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'(' => depth += 1,
                b')' => depth -= 1,
                _ => {}
            }
        }
    }
}

/// Advance to the next unquoted `:` or end of tokens, leaving `pos` there
/// (not consumed), the same position the main dispatch loop expects as a
/// statement boundary.
fn skip_to_statement_end(interp: &Interpreter, pos: &mut Pos) {
    let mut in_string = false;
    loop {
        match pos.cursor.peek(&interp.mem) {
            None => break,
            Some(b':') if !in_string => break,
            Some(b'"') => {
                in_string = !in_string;
                pos.cursor.advance();
            }
            Some(_) => pos.cursor.advance(),
        }
    }
}

fn exec_on_error(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(kw("OFF")) {
        pos.cursor.advance();
        interp.error_trap = None;
        pos.cursor.pos = pos.cursor.end;
        return Ok(Flow::Next);
    }
    let local = peek(interp, pos) == Some(kw("LOCAL"));
    if local {
        pos.cursor.advance();
        skip_ws(interp, pos);
    }
    let handler = *pos;
    let anchor = interp.control.depth();
    if local {
        interp.control.push(Frame::OnError {
            saved_handler: interp.error_trap.map(|t| t.handler),
            saved_anchor: interp.error_trap.map_or(0, |t| t.anchor),
        });
    }
    interp.error_trap = Some(ErrorTrap { handler, anchor });
    pos.cursor.pos = pos.cursor.end;
    Ok(Flow::Next)
}

fn exec_error_stmt(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let n = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    let message = if peek(interp, pos) == Some(b',') {
        pos.cursor.advance();
        let v = eval_expr(interp, pos)?;
        value_to_text(interp, v)
    } else {
        Vec::new()
    };
    let code = ErrorCode(n.as_f64().unwrap_or(0.0) as i32);
    Err(ExecError::new(code, String::from_utf8_lossy(&message).into_owned()).at_line(u32::from(interp.program.line_number(&interp.mem, pos.line))))
}

// ---------------------------------------------------------------------
// INPUT / PRINT / BPUT / OSCLI
// ---------------------------------------------------------------------

fn value_to_text(interp: &mut Interpreter, v: Value) -> Vec<u8> {
    match v {
        Value::Str(s) => strings::read(&interp.mem, &interp.accumulator, s).to_vec(),
        Value::Int(n) => n.to_string().into_bytes(),
        Value::Float(f) => format_float_at(interp, f).into_bytes(),
    }
}

/// `@%`'s field-format word (spec §4.G PRINT field formatting): byte 0
/// selects mode (`0`=general, `1`=exponential, `2`=fixed), byte 1 is the
/// field width (`0` = no padding), byte 2 the decimal-place count, and bit
/// 24 forces exponential notation even for `G` mode. `@% == 0`, the
/// default, falls straight through to the plain general formatter.
fn format_float_at(interp: &Interpreter, f: f64) -> String {
    let raw = interp.symbols.get_scalar("@%").and_then(|v| v.as_f64()).unwrap_or(0.0) as i64 as u32;
    if raw == 0 {
        return basic_eval::numtext::format_float(f);
    }
    let mode = (raw & 0xFF) as u8;
    let width = ((raw >> 8) & 0xFF) as u8 as usize;
    let decimals = ((raw >> 16) & 0xFF) as u8 as usize;
    let forced_exp = (raw >> 24) & 1 != 0;

    let body = if mode == 2 {
        format!("{f:.decimals$}")
    } else if mode == 1 || forced_exp {
        let mantissa_digits = decimals.max(1);
        let sci = format!("{f:.mantissa_digits$e}");
        // Rust renders `1.50e2`; BASIC wants `1.50E+02` (signed, 2-digit exponent).
        if let Some((mantissa, exp)) = sci.split_once('e') {
            let exp: i32 = exp.parse().unwrap_or(0);
            format!("{mantissa}E{:+03}", exp)
        } else {
            sci
        }
    } else {
        basic_eval::numtext::format_float(f)
    };

    if body.len() < width {
        format!("{body:>width$}")
    } else {
        body
    }
}

fn write_bytes(interp: &mut Interpreter, bytes: &[u8]) -> Result<(), ExecError> {
    for &b in bytes {
        interp.host.oswrch(b)?;
    }
    Ok(())
}

fn exec_print(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'#') {
        return exec_print_file(interp, pos);
    }
    let mut suppress_newline = false;
    loop {
        skip_ws(interp, pos);
        match peek(interp, pos) {
            None => break,
            Some(b':') => break,
            Some(b';') => {
                pos.cursor.advance();
                suppress_newline = true;
            }
            Some(b',') => {
                pos.cursor.advance();
                write_bytes(interp, b" ")?;
                suppress_newline = false;
            }
            Some(b'\'') => {
                pos.cursor.advance();
                write_bytes(interp, b"\n")?;
                suppress_newline = false;
            }
            _ => {
                let v = eval_expr(interp, pos)?;
                let text = value_to_text(interp, v);
                write_bytes(interp, &text)?;
                suppress_newline = false;
            }
        }
    }
    if !suppress_newline {
        write_bytes(interp, b"\n")?;
    }
    Ok(Flow::Next)
}

fn exec_print_file(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    pos.cursor.advance();
    let channel = eval_expr(interp, pos)?;
    let channel = channel.as_f64().unwrap_or(0.0) as i64;
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b',') {
        pos.cursor.advance();
    }
    loop {
        skip_ws(interp, pos);
        if matches!(peek(interp, pos), None | Some(b':')) {
            break;
        }
        let v = eval_expr(interp, pos)?;
        for b in value_to_text(interp, v) {
            interp.host.osbput(channel, b)?;
        }
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    Ok(Flow::Next)
}

fn exec_input(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'"') {
        let v = eval_expr(interp, pos)?;
        let text = value_to_text(interp, v);
        write_bytes(interp, &text)?;
        skip_ws(interp, pos);
        if matches!(peek(interp, pos), Some(b',') | Some(b';')) {
            pos.cursor.advance();
        }
    }
    loop {
        skip_ws(interp, pos);
        if pos.cursor.at_end() || peek(interp, pos) == Some(b':') {
            break;
        }
        let name = read_ident(interp, pos);
        if name.is_empty() {
            break;
        }
        write_bytes(interp, b"? ")?;
        let line = interp.host.osline()?;
        assign_read_value(interp, &name, &line)?;
        skip_ws(interp, pos);
        if peek(interp, pos) == Some(b',') {
            pos.cursor.advance();
            continue;
        }
        break;
    }
    Ok(Flow::Next)
}

fn exec_bput(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    skip_ws(interp, pos);
    if peek(interp, pos) == Some(b'#') {
        pos.cursor.advance();
    }
    let channel = eval_expr(interp, pos)?;
    skip_ws(interp, pos);
    expect_byte(interp, pos, b',')?;
    let v = eval_expr(interp, pos)?;
    let byte = v.as_f64().unwrap_or(0.0) as i64 as u8;
    interp.host.osbput(channel.as_f64().unwrap_or(0.0) as i64, byte)?;
    Ok(Flow::Next)
}

fn exec_oscli(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let v = eval_expr(interp, pos)?;
    let text = value_to_text(interp, v);
    interp.host.oscli(&String::from_utf8_lossy(&text))?;
    Ok(Flow::Next)
}

fn exec_star_command(interp: &mut Interpreter, pos: &mut Pos) -> Result<Flow, ExecError> {
    let start = pos.cursor.pos;
    let end = pos.cursor.end;
    let bytes: Vec<u8> = (start.as_usize()..end.as_usize()).map(|i| interp.mem.read_u8(Addr::new(i as u32))).collect();
    pos.cursor.pos = end;
    interp.host.oscli(String::from_utf8_lossy(&bytes).trim())?;
    Ok(Flow::Next)
}
