//! Builtin function dispatch (spec §4.F): "a 256-entry table keyed on the
//! leading byte". Keyword tokens already live in a single flat array
//! (`basic_lexer::keyword::KEYWORDS`); reversing a token byte to its name
//! via [`basic_lexer::keyword::text_for_token`] and matching on the name
//! gets the same O(byte)-keyed dispatch the spec describes without a
//! second, parallel 256-entry array of function pointers to keep in sync
//! with it.

use crate::context::Runtime;
use crate::cursor::Cursor;
use crate::numtext;
use crate::strings::check_length;
use basic_core::{BasicError, ErrorCode, StrRef, Value};
use basic_memory::MemorySpace;

type ParseExpr<'a> = dyn FnMut(&mut Cursor, &mut dyn Runtime) -> Result<Value, BasicError> + 'a;

fn read_string_bytes(rt: &mut dyn Runtime, s: StrRef) -> Vec<u8> {
    if s.owned {
        rt.mem().slice(s.addr, s.len()).to_vec()
    } else {
        rt.accumulator().read(s).to_vec()
    }
}

fn expect_str(v: Value) -> Result<StrRef, BasicError> {
    match v {
        Value::Str(s) => Ok(s),
        other => Err(BasicError::with_message(
            ErrorCode::TYPE_MISMATCH,
            format!("expected a string, got {}", other.type_name()),
        )),
    }
}

fn expect_num_f64(v: Value) -> Result<f64, BasicError> {
    v.as_f64()
        .ok_or_else(|| BasicError::with_message(ErrorCode::TYPE_MISMATCH, "expected a number"))
}

fn expect_num_i64(v: Value) -> Result<i64, BasicError> {
    match v {
        Value::Int(n) => Ok(n),
        Value::Float(f) => Ok(f as i64),
        Value::Str(_) => Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
    }
}

/// Consume a `(` `)`-delimited, comma-separated argument list. `min`/`max`
/// bound the accepted arity (`max = None` for unbounded, used by nothing
/// here but kept for symmetry).
fn parse_args(
    cursor: &mut Cursor,
    rt: &mut dyn Runtime,
    eval: &mut ParseExpr,
    min: usize,
    max: usize,
) -> Result<Vec<Value>, BasicError> {
    cursor.skip_spaces(rt.mem());
    if cursor.peek(rt.mem()) != Some(b'(') {
        return if min == 0 {
            Ok(Vec::new())
        } else {
            Err(BasicError::new(ErrorCode::INCORRECT_ARGUMENTS))
        };
    }
    cursor.advance();
    let mut args = Vec::new();
    cursor.skip_spaces(rt.mem());
    if cursor.peek(rt.mem()) == Some(b')') {
        cursor.advance();
    } else {
        loop {
            args.push(eval(cursor, rt)?);
            cursor.skip_spaces(rt.mem());
            match cursor.bump(rt.mem()) {
                Some(b',') => {
                    cursor.skip_spaces(rt.mem());
                }
                Some(b')') => break,
                _ => return Err(BasicError::new(ErrorCode::SYNTAX_ERROR)),
            }
        }
    }
    if args.len() < min || args.len() > max {
        return Err(BasicError::new(ErrorCode::INCORRECT_ARGUMENTS));
    }
    Ok(args)
}

/// Dispatch a builtin named by keyword `token`, whose name text the caller
/// already resolved. `cursor` is positioned just past the keyword; this
/// function consumes whatever argument list (if any) the builtin needs.
pub fn call(name: &str, cursor: &mut Cursor, rt: &mut dyn Runtime, eval: &mut ParseExpr) -> Result<Value, BasicError> {
    match name {
        "TRUE" => Ok(Value::truth(true)),
        "FALSE" => Ok(Value::truth(false)),
        "PI" => Ok(Value::Float(std::f64::consts::PI)),

        "CHR$" => {
            let [a] = one(cursor, rt, eval)?;
            let n = expect_num_i64(a)?;
            let byte = u8::try_from(n).map_err(|_| BasicError::new(ErrorCode::TYPE_MISMATCH))?;
            Ok(Value::Str(rt.accumulator().store(&[byte])))
        }
        "STR$" => {
            let [a] = one(cursor, rt, eval)?;
            let text = match a {
                Value::Int(n) => n.to_string(),
                Value::Float(f) => numtext::format_float(f),
                Value::Str(_) => return Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
            };
            Ok(Value::Str(rt.accumulator().store(text.as_bytes())))
        }
        "ASC" => {
            let [a] = one(cursor, rt, eval)?;
            let bytes = read_string_bytes(rt, expect_str(a)?);
            Ok(Value::Int(bytes.first().map_or(-1, |&b| i64::from(b))))
        }
        "VAL" => {
            let [a] = one(cursor, rt, eval)?;
            let bytes = read_string_bytes(rt, expect_str(a)?);
            let text = String::from_utf8_lossy(&bytes);
            Ok(numtext::parse_numeric_prefix(&text))
        }
        "LEN" => {
            let [a] = one(cursor, rt, eval)?;
            Ok(Value::Int(expect_str(a)?.len() as i64))
        }

        "SGN" => {
            let [a] = one(cursor, rt, eval)?;
            let f = expect_num_f64(a)?;
            Ok(Value::Int(i64::from(f.partial_cmp(&0.0).map_or(0, |o| o as i8))))
        }
        "ABS" => {
            let [a] = one(cursor, rt, eval)?;
            Ok(match a {
                Value::Int(n) => Value::Int(n.wrapping_abs()),
                Value::Float(f) => Value::Float(f.abs()),
                Value::Str(_) => return Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
            })
        }
        "SQR" => {
            let [a] = one(cursor, rt, eval)?;
            let f = expect_num_f64(a)?;
            if f < 0.0 {
                return Err(BasicError::new(ErrorCode::NEGATIVE_ROOT));
            }
            Ok(Value::Float(f.sqrt()))
        }
        "SIN" => trig(cursor, rt, eval, f64::sin),
        "COS" => trig(cursor, rt, eval, f64::cos),
        "TAN" => trig(cursor, rt, eval, f64::tan),
        "ASN" => trig(cursor, rt, eval, f64::asin),
        "ACS" => trig(cursor, rt, eval, f64::acos),
        "ATN" => trig(cursor, rt, eval, f64::atan),
        "RAD" => trig(cursor, rt, eval, f64::to_radians),
        "DEG" => trig(cursor, rt, eval, f64::to_degrees),
        "EXP" => trig(cursor, rt, eval, f64::exp),
        "LOG" => {
            let [a] = one(cursor, rt, eval)?;
            let f = expect_num_f64(a)?;
            if f <= 0.0 {
                return Err(BasicError::new(ErrorCode::LOGARITHM_RANGE));
            }
            Ok(Value::Float(f.log10()))
        }
        "LN" => {
            let [a] = one(cursor, rt, eval)?;
            let f = expect_num_f64(a)?;
            if f <= 0.0 {
                return Err(BasicError::new(ErrorCode::LOGARITHM_RANGE));
            }
            Ok(Value::Float(f.ln()))
        }

        "RND" => {
            cursor.skip_spaces(rt.mem());
            let args = parse_args(cursor, rt, eval, 0, 1)?;
            let arg = args.first().copied();
            rt.rng().rnd(arg)
        }

        "LEFT$" => {
            let args = parse_args(cursor, rt, eval, 1, 2)?;
            let bytes = read_string_bytes(rt, expect_str(args[0])?);
            let n = match args.get(1) {
                Some(&v) => expect_num_i64(v)?.max(0) as usize,
                None => bytes.len().saturating_sub(1),
            };
            let n = n.min(bytes.len());
            Ok(Value::Str(rt.accumulator().store(&bytes[..n])))
        }
        "RIGHT$" => {
            let args = parse_args(cursor, rt, eval, 1, 2)?;
            let bytes = read_string_bytes(rt, expect_str(args[0])?);
            let n = match args.get(1) {
                Some(&v) => expect_num_i64(v)?.max(0) as usize,
                None => usize::from(!bytes.is_empty()),
            };
            let n = n.min(bytes.len());
            Ok(Value::Str(rt.accumulator().store(&bytes[bytes.len() - n..])))
        }
        "MID$" => {
            let args = parse_args(cursor, rt, eval, 2, 3)?;
            let bytes = read_string_bytes(rt, expect_str(args[0])?);
            let start = (expect_num_i64(args[1])?.max(1) - 1) as usize;
            if start >= bytes.len() {
                return Ok(Value::Str(rt.accumulator().store(b"")));
            }
            let len = match args.get(2) {
                Some(&v) => expect_num_i64(v)?.max(0) as usize,
                None => bytes.len() - start,
            };
            let end = (start + len).min(bytes.len());
            Ok(Value::Str(rt.accumulator().store(&bytes[start..end])))
        }
        "STRING$" => {
            let args = parse_args(cursor, rt, eval, 2, 2)?;
            let n = expect_num_i64(args[0])?;
            let bytes = read_string_bytes(rt, expect_str(args[1])?);
            if n <= 0 || bytes.is_empty() {
                return Ok(Value::Str(rt.accumulator().store(b"")));
            }
            let total = bytes.len() * n as usize;
            check_length(total)?;
            let mut out = Vec::with_capacity(total);
            for _ in 0..n {
                out.extend_from_slice(&bytes);
            }
            Ok(Value::Str(rt.accumulator().store(&out)))
        }
        "INSTR" => {
            let args = parse_args(cursor, rt, eval, 2, 3)?;
            let haystack = read_string_bytes(rt, expect_str(args[0])?);
            let needle = read_string_bytes(rt, expect_str(args[1])?);
            let start = match args.get(2) {
                Some(&v) => (expect_num_i64(v)? - 1).max(0) as usize,
                None => 0,
            };
            let found = if needle.is_empty() || start >= haystack.len() {
                None
            } else {
                haystack[start..].windows(needle.len()).position(|w| w == needle.as_slice())
            };
            Ok(Value::Int(found.map_or(0, |i| (start + i + 1) as i64)))
        }
        "SPC" | "TAB" => {
            // PRINT-field positioning; the VDU driver that would honour
            // real cursor columns is out of scope, so both render as a
            // run of spaces of the requested width.
            let [a] = one(cursor, rt, eval)?;
            let n = expect_num_i64(a)?.max(0) as usize;
            check_length(n)?;
            Ok(Value::Str(rt.accumulator().store(&vec![b' '; n])))
        }

        "EOF" => {
            let [a] = channel_arg(cursor, rt, eval)?;
            let channel = expect_num_i64(a)?;
            Ok(Value::truth(rt.host().eof(channel)?))
        }
        "BGET" => {
            let [a] = channel_arg(cursor, rt, eval)?;
            let channel = expect_num_i64(a)?;
            Ok(Value::Int(i64::from(rt.host().bget(channel)?)))
        }
        "GET" => {
            let code = rt.host().inkey(i32::MAX)?;
            Ok(Value::Int(i64::from(code)))
        }
        "GET$" => {
            let code = rt.host().inkey(i32::MAX)?;
            let byte = u8::try_from(code).unwrap_or(0);
            Ok(Value::Str(rt.accumulator().store(&[byte])))
        }
        "INKEY" => {
            let [a] = one(cursor, rt, eval)?;
            let n = expect_num_i64(a)? as i32;
            Ok(Value::Int(i64::from(rt.host().inkey(n)?)))
        }
        "INKEY$" => {
            let [a] = one(cursor, rt, eval)?;
            let n = expect_num_i64(a)? as i32;
            let code = rt.host().inkey(n)?;
            if code < 0 {
                Ok(Value::Str(rt.accumulator().store(b"")))
            } else {
                Ok(Value::Str(rt.accumulator().store(&[code as u8])))
            }
        }
        "TIME" => Ok(Value::Int(rt.host().centiseconds())),
        "TIME$" => {
            let cs = rt.host().centiseconds();
            Ok(Value::Str(rt.accumulator().store(format_elapsed(cs).as_bytes())))
        }

        "ERR" => Ok(Value::Int(i64::from(rt.error_state().err))),
        "ERL" => Ok(Value::Int(i64::from(rt.error_state().erl))),
        "REPORT$" => {
            let msg = rt.error_state().report.clone();
            Ok(Value::Str(rt.accumulator().store(msg.as_bytes())))
        }

        _ => Err(BasicError::with_message(ErrorCode::NO_SUCH_FN_PROC, format!("unknown builtin {name}"))),
    }
}

fn one(cursor: &mut Cursor, rt: &mut dyn Runtime, eval: &mut ParseExpr) -> Result<[Value; 1], BasicError> {
    let args = parse_args(cursor, rt, eval, 1, 1)?;
    Ok([args[0]])
}

fn channel_arg(cursor: &mut Cursor, rt: &mut dyn Runtime, eval: &mut ParseExpr) -> Result<[Value; 1], BasicError> {
    cursor.skip_spaces(rt.mem());
    if cursor.peek(rt.mem()) == Some(b'#') {
        cursor.advance();
    }
    one(cursor, rt, eval)
}

fn trig(
    cursor: &mut Cursor,
    rt: &mut dyn Runtime,
    eval: &mut ParseExpr,
    f: impl Fn(f64) -> f64,
) -> Result<Value, BasicError> {
    let [a] = one(cursor, rt, eval)?;
    Ok(Value::Float(f(expect_num_f64(a)?)))
}

fn format_elapsed(centiseconds: i64) -> String {
    let total_seconds = centiseconds / 100;
    let hh = total_seconds / 3600;
    let mm = (total_seconds / 60) % 60;
    let ss = total_seconds % 60;
    format!("{hh:02}:{mm:02}:{ss:02}")
}
