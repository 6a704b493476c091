//! The operator-precedence expression evaluator itself (spec §4.F):
//! recursive descent over seven precedence levels, tightest-binding first.

use crate::array;
use crate::builtins;
use crate::context::Runtime;
use crate::cursor::Cursor;
use crate::numtext;
use crate::strings;
use basic_core::{arith, BasicError, ErrorCode, StrRef, Value};
use basic_lexer::keyword;
use basic_memory::MemorySpace;
use basic_symbols::Binding;

fn tok(name: &str) -> u8 {
    keyword::token_for_keyword(name).unwrap_or_else(|| unreachable!("{name} is always a keyword"))
}

/// Parse and evaluate one full expression starting at `cursor`.
///
/// # Errors
/// Any [`BasicError`] a sub-expression, variable lookup or builtin call
/// raises.
pub fn evaluate(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    parse_or(cursor, rt)
}

fn parse_or(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let mut left = parse_and(cursor, rt)?;
    loop {
        cursor.skip_spaces(rt.mem());
        let Some(byte) = cursor.peek(rt.mem()) else { break };
        if byte == tok("OR") {
            cursor.advance();
            let right = parse_and(cursor, rt)?;
            left = arith::or(left, right)?;
        } else if byte == tok("EOR") {
            cursor.advance();
            let right = parse_and(cursor, rt)?;
            left = arith::eor(left, right)?;
        } else {
            break;
        }
    }
    Ok(left)
}

fn parse_and(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let mut left = parse_relational(cursor, rt)?;
    loop {
        cursor.skip_spaces(rt.mem());
        if cursor.peek(rt.mem()) == Some(tok("AND")) {
            cursor.advance();
            let right = parse_relational(cursor, rt)?;
            left = arith::and(left, right)?;
        } else {
            break;
        }
    }
    Ok(left)
}

/// Relational operators are non-chaining (spec §4.F): at most one per
/// comparison, so `a < b < c` parses as `(a < b) < c`, not a mathematical
/// range check, by falling straight back out to `parse_and` after at most
/// one match.
fn parse_relational(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let left = parse_additive(cursor, rt)?;
    cursor.skip_spaces(rt.mem());
    let Some(op) = match_relational_op(cursor, rt.mem()) else {
        return Ok(left);
    };
    let right = parse_additive(cursor, rt)?;
    apply_relational(op, left, right, rt)
}

#[derive(Clone, Copy)]
enum RelOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    ShrLogical,
}

fn match_relational_op(cursor: &mut Cursor, mem: &dyn MemorySpace) -> Option<RelOp> {
    let op = match (cursor.peek(mem)?, cursor.peek_at(mem, 1)) {
        (b'<', Some(b'=')) => (RelOp::Le, 2),
        (b'<', Some(b'>')) => (RelOp::Ne, 2),
        (b'<', Some(b'<')) if cursor.peek_at(mem, 2) == Some(b'<') => (RelOp::ShrLogical, 3),
        (b'<', Some(b'<')) => (RelOp::Shl, 2),
        (b'>', Some(b'=')) => (RelOp::Ge, 2),
        (b'>', Some(b'>')) if cursor.peek_at(mem, 2) == Some(b'>') => (RelOp::ShrLogical, 3),
        (b'>', Some(b'>')) => (RelOp::Shr, 2),
        (b'=', _) => (RelOp::Eq, 1),
        (b'<', _) => (RelOp::Lt, 1),
        (b'>', _) => (RelOp::Gt, 1),
        _ => return None,
    };
    for _ in 0..op.1 {
        cursor.advance();
    }
    Some(op.0)
}

fn apply_relational(op: RelOp, a: Value, b: Value, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    if matches!(op, RelOp::Shl | RelOp::Shr | RelOp::ShrLogical) {
        let mode = arith::ShiftMode::default();
        return match op {
            RelOp::Shl => arith::shl(a, b, mode),
            RelOp::Shr => arith::shr(a, b, mode),
            RelOp::ShrLogical => arith::shr_logical(a, b, mode),
            _ => unreachable!(),
        };
    }
    if let (Value::Str(x), Value::Str(y)) = (a, b) {
        let ord = strings_compare(rt, x, y);
        return Ok(Value::truth(match op {
            RelOp::Eq => ord.is_eq(),
            RelOp::Ne => !ord.is_eq(),
            RelOp::Lt => ord.is_lt(),
            RelOp::Gt => ord.is_gt(),
            RelOp::Le => ord.is_le(),
            RelOp::Ge => ord.is_ge(),
            _ => unreachable!(),
        }));
    }
    match op {
        RelOp::Eq => arith::eq(a, b),
        RelOp::Ne => arith::ne(a, b),
        RelOp::Lt => arith::lt(a, b),
        RelOp::Gt => arith::gt(a, b),
        RelOp::Le => arith::le(a, b),
        RelOp::Ge => arith::ge(a, b),
        _ => unreachable!(),
    }
}

fn strings_compare(rt: &mut dyn Runtime, a: StrRef, b: StrRef) -> std::cmp::Ordering {
    let ba = read_bytes(rt, a);
    let bb = read_bytes(rt, b);
    ba.cmp(&bb)
}

fn read_bytes(rt: &mut dyn Runtime, s: StrRef) -> Vec<u8> {
    if s.owned {
        rt.mem().slice(s.addr, s.len()).to_vec()
    } else {
        rt.accumulator().read(s).to_vec()
    }
}

fn parse_additive(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let mut left = parse_multiplicative(cursor, rt)?;
    loop {
        cursor.skip_spaces(rt.mem());
        match cursor.peek(rt.mem()) {
            Some(b'+') => {
                cursor.advance();
                let right = parse_multiplicative(cursor, rt)?;
                left = add_values(left, right, rt)?;
            }
            Some(b'-') => {
                cursor.advance();
                let right = parse_multiplicative(cursor, rt)?;
                left = arith::sub(left, right)?;
            }
            _ => break,
        }
    }
    Ok(left)
}

fn add_values(a: Value, b: Value, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    if a.is_string() || b.is_string() {
        let abytes = to_text(rt, a);
        let bbytes = to_text(rt, b);
        let mut combined = abytes;
        combined.extend(bbytes);
        strings::check_length(combined.len())?;
        Ok(Value::Str(rt.accumulator().store(&combined)))
    } else {
        arith::add(a, b)
    }
}

fn to_text(rt: &mut dyn Runtime, v: Value) -> Vec<u8> {
    match v {
        Value::Str(s) => read_bytes(rt, s),
        Value::Int(n) => n.to_string().into_bytes(),
        Value::Float(f) => numtext::format_float(f).into_bytes(),
    }
}

fn parse_multiplicative(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let mut left = parse_power(cursor, rt)?;
    loop {
        cursor.skip_spaces(rt.mem());
        let Some(byte) = cursor.peek(rt.mem()) else { break };
        if byte == b'*' {
            cursor.advance();
            left = arith::mul(left, parse_power(cursor, rt)?)?;
        } else if byte == b'/' {
            cursor.advance();
            left = arith::div(left, parse_power(cursor, rt)?)?;
        } else if byte == tok("DIV") {
            cursor.advance();
            left = arith::int_div(left, parse_power(cursor, rt)?)?;
        } else if byte == tok("MOD") {
            cursor.advance();
            left = arith::int_mod(left, parse_power(cursor, rt)?)?;
        } else {
            break;
        }
    }
    Ok(left)
}

/// `^` is right-associative: `2^3^2 == 2^(3^2)`.
fn parse_power(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let left = parse_unary(cursor, rt)?;
    cursor.skip_spaces(rt.mem());
    if cursor.peek(rt.mem()) == Some(b'^') {
        cursor.advance();
        let right = parse_power(cursor, rt)?;
        arith::pow(left, right)
    } else {
        Ok(left)
    }
}

fn parse_unary(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    cursor.skip_spaces(rt.mem());
    match cursor.peek(rt.mem()) {
        Some(b'-') => {
            cursor.advance();
            let v = parse_unary(cursor, rt)?;
            arith::sub(Value::Int(0), v)
        }
        Some(b'+') => {
            cursor.advance();
            parse_unary(cursor, rt)
        }
        Some(byte) if byte == tok("NOT") => {
            cursor.advance();
            let v = parse_unary(cursor, rt)?;
            let n = match v {
                Value::Int(n) => n,
                Value::Float(f) => f as i64,
                Value::Str(_) => return Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
            };
            Ok(Value::Int(!n))
        }
        _ => parse_primary(cursor, rt),
    }
}

fn parse_primary(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    cursor.skip_spaces(rt.mem());
    let Some(byte) = cursor.peek(rt.mem()) else {
        return Err(BasicError::new(ErrorCode::SYNTAX_ERROR));
    };

    if byte == b'"' {
        cursor.advance();
        let bytes = cursor.read_string_literal(rt.mem());
        strings::check_length(bytes.len())?;
        return Ok(Value::Str(rt.accumulator().store(&bytes)));
    }

    if byte == b'(' {
        cursor.advance();
        let v = evaluate(cursor, rt)?;
        cursor.skip_spaces(rt.mem());
        if cursor.bump(rt.mem()) != Some(b')') {
            return Err(BasicError::new(ErrorCode::SYNTAX_ERROR));
        }
        return Ok(v);
    }

    if byte.is_ascii_digit() || byte == b'.' || byte == b'&' || (byte == b'%' && cursor.peek_at(rt.mem(), 1).is_some_and(|b| b == b'0' || b == b'1')) {
        let text = cursor.read_number_text(rt.mem());
        return Ok(parse_literal_number(&text));
    }

    if (keyword::FIRST_KEYWORD_TOKEN..=keyword::LAST_KEYWORD_TOKEN).contains(&byte) {
        if let Some(name) = keyword::text_for_token(byte) {
            if name == "SUM" {
                cursor.advance();
                let arr = resolve_array_ref(cursor, rt)?;
                return array::sum(&arr);
            }
            cursor.advance();
            return builtins::call(name, cursor, rt, &mut |c, r| evaluate(c, r));
        }
    }

    if byte.is_ascii_alphabetic() || byte == b'@' {
        return parse_name_reference(cursor, rt);
    }

    Err(BasicError::new(ErrorCode::SYNTAX_ERROR))
}

fn parse_literal_number(text: &str) -> Value {
    if let Some(hex) = text.strip_prefix('&') {
        return Value::Int(i64::from_str_radix(hex, 16).unwrap_or(0));
    }
    if let Some(bin) = text.strip_prefix('%') {
        return Value::Int(i64::from_str_radix(bin, 2).unwrap_or(0));
    }
    if text.contains(['.', 'E', 'e']) {
        Value::Float(text.parse().unwrap_or(0.0))
    } else {
        text.parse::<i64>().map_or_else(|_| Value::Float(text.parse().unwrap_or(0.0)), Value::Int)
    }
}

/// Read a bare name and resolve it: array index, struct field, or scalar
/// variable.
fn parse_name_reference(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<Value, BasicError> {
    let name = cursor.read_identifier(rt.mem());
    if name.is_empty() {
        return Err(BasicError::new(ErrorCode::SYNTAX_ERROR));
    }

    if let Some(base) = name.strip_suffix('.') {
        let field = cursor.read_identifier(rt.mem());
        let binding = rt
            .symbols()
            .get_binding(base)
            .ok_or_else(|| BasicError::with_message(ErrorCode::NO_SUCH_VARIABLE, format!("no such structure {base}")))?;
        let instance = match binding {
            Binding::Struct(s) => s,
            _ => return Err(BasicError::new(ErrorCode::TYPE_MISMATCH)),
        };
        return instance
            .get(&field)
            .copied()
            .ok_or_else(|| BasicError::new(ErrorCode::NO_SUCH_STRUCT_FIELD));
    }

    cursor.skip_spaces(rt.mem());
    if cursor.peek(rt.mem()) == Some(b'(') {
        cursor.advance();
        let mut subscripts = Vec::new();
        cursor.skip_spaces(rt.mem());
        if cursor.peek(rt.mem()) != Some(b')') {
            loop {
                let idx = evaluate(cursor, rt)?;
                subscripts.push(index_value(idx)?);
                cursor.skip_spaces(rt.mem());
                match cursor.bump(rt.mem()) {
                    Some(b',') => {}
                    Some(b')') => break,
                    _ => return Err(BasicError::new(ErrorCode::SYNTAX_ERROR)),
                }
            }
        } else {
            cursor.advance();
        }
        let binding = rt
            .symbols()
            .get_binding(&name)
            .ok_or_else(|| BasicError::new(ErrorCode::NO_SUCH_VARIABLE))?;
        let array = binding.as_array().ok_or_else(|| BasicError::new(ErrorCode::BAD_USE_OF_ARRAY))?;
        let flat = array
            .flat_index(&subscripts)
            .ok_or_else(|| BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "subscript out of range"))?;
        return Ok(array.data[flat]);
    }

    rt.symbols()
        .get_scalar(&name)
        .ok_or_else(|| BasicError::with_message(ErrorCode::NO_SUCH_VARIABLE, format!("no such variable {name}")))
}

fn index_value(v: Value) -> Result<usize, BasicError> {
    match v {
        Value::Int(n) if n >= 0 => Ok(n as usize),
        Value::Float(f) if f >= 0.0 => Ok(f as usize),
        _ => Err(BasicError::with_message(ErrorCode::BAD_USE_OF_ARRAY, "negative subscript")),
    }
}

/// `SUM name()`: the array must be referenced bare (`name()`), not
/// subscripted.
fn resolve_array_ref(cursor: &mut Cursor, rt: &mut dyn Runtime) -> Result<basic_symbols::ArrayBinding, BasicError> {
    cursor.skip_spaces(rt.mem());
    let name = cursor.read_identifier(rt.mem());
    cursor.skip_spaces(rt.mem());
    if cursor.bump(rt.mem()) != Some(b'(') || cursor.bump(rt.mem()) != Some(b')') {
        return Err(BasicError::with_message(ErrorCode::SYNTAX_ERROR, "SUM expects name()"));
    }
    rt.symbols()
        .get_binding(&name)
        .and_then(Binding::as_array)
        .cloned()
        .ok_or_else(|| BasicError::new(ErrorCode::NO_SUCH_VARIABLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Accumulator, ErrorState, EvalHost, NullHost, Rng};
    use basic_heap::Heap;
    use basic_memory::{Addr, UserRam};
    use basic_symbols::SymbolTable;

    struct TestRuntime {
        mem: UserRam,
        heap: Heap,
        symbols: SymbolTable,
        acc: Accumulator,
        rng: Rng,
        host: NullHost,
        errors: ErrorState,
    }

    impl TestRuntime {
        fn new() -> Self {
            Self {
                mem: UserRam::new(4096),
                heap: Heap::new(Addr::new(0)),
                symbols: SymbolTable::new(),
                acc: Accumulator::new(),
                rng: Rng::default(),
                host: NullHost::default(),
                errors: ErrorState::default(),
            }
        }
    }

    impl Runtime for TestRuntime {
        fn mem(&self) -> &dyn MemorySpace {
            &self.mem
        }
        fn mem_mut(&mut self) -> &mut dyn MemorySpace {
            &mut self.mem
        }
        fn heap(&mut self) -> &mut Heap {
            &mut self.heap
        }
        fn symbols(&mut self) -> &mut SymbolTable {
            &mut self.symbols
        }
        fn accumulator(&mut self) -> &mut Accumulator {
            &mut self.acc
        }
        fn rng(&mut self) -> &mut Rng {
            &mut self.rng
        }
        fn host(&mut self) -> &mut dyn EvalHost {
            &mut self.host
        }
        fn stack_top(&self) -> Addr {
            Addr::new(4096)
        }
        fn call_function(&mut self, name: &str, _args: &[Value]) -> Result<Value, BasicError> {
            Err(BasicError::with_message(ErrorCode::NO_SUCH_FN_PROC, name))
        }
        fn error_state(&self) -> &ErrorState {
            &self.errors
        }
    }

    fn eval_str(rt: &mut TestRuntime, src: &str) -> Value {
        let tokens = basic_lexer::tokenize(src).unwrap();
        let base = Addr::new(1024);
        rt.mem.slice_mut(base, tokens.len()).copy_from_slice(&tokens);
        let mut cursor = Cursor::new(base, base.add(tokens.len() as u32));
        evaluate(&mut cursor, rt).unwrap()
    }

    #[test]
    fn arithmetic_precedence_is_textbook() {
        let mut rt = TestRuntime::new();
        assert_eq!(eval_str(&mut rt, "2+3*4"), Value::Int(14));
        assert_eq!(eval_str(&mut rt, "(2+3)*4"), Value::Int(20));
        assert_eq!(eval_str(&mut rt, "2^3^2"), Value::Int(512));
    }

    #[test]
    fn string_concatenation_with_plus() {
        let mut rt = TestRuntime::new();
        let v = eval_str(&mut rt, "\"foo\"+\"bar\"");
        match v {
            Value::Str(s) => assert_eq!(rt.acc.read(s), b"foobar"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn variable_lookup_reads_static_slots() {
        let mut rt = TestRuntime::new();
        rt.symbols.set_scalar("A%", Value::Int(7));
        assert_eq!(eval_str(&mut rt, "A%*2"), Value::Int(14));
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let mut rt = TestRuntime::new();
        let tokens = basic_lexer::tokenize("undef%").unwrap();
        let base = Addr::new(1024);
        rt.mem.slice_mut(base, tokens.len()).copy_from_slice(&tokens);
        let mut cursor = Cursor::new(base, base.add(tokens.len() as u32));
        let err = evaluate(&mut cursor, &mut rt).unwrap_err();
        assert_eq!(err.code, ErrorCode::NO_SUCH_VARIABLE);
    }

    #[test]
    fn array_indexing_reads_an_element() {
        let mut rt = TestRuntime::new();
        let arr = basic_symbols::ArrayBinding::new(basic_symbols::FieldType::Int, vec![3], Value::Int(0)).unwrap();
        rt.symbols.set("nums%", Binding::Array(arr));
        if let Some(binding) = rt.symbols.get_binding_mut("nums%") {
            if let Some(array) = binding.as_array_mut() {
                array.data[1] = Value::Int(99);
            }
        }
        assert_eq!(eval_str(&mut rt, "nums%(1)"), Value::Int(99));
    }

    #[test]
    fn builtin_functions_dispatch_by_token() {
        let mut rt = TestRuntime::new();
        assert_eq!(eval_str(&mut rt, "ABS(-5)"), Value::Int(5));
        assert_eq!(eval_str(&mut rt, "LEN(\"hello\")"), Value::Int(5));
    }

    #[test]
    fn relational_operators_are_non_chaining() {
        let mut rt = TestRuntime::new();
        // (1<2) is -1 (true); -1 < 3 is also true (-1), so result is -1.
        assert_eq!(eval_str(&mut rt, "1<2<3"), Value::Int(-1));
    }

    #[test]
    fn not_inverts_all_bits() {
        let mut rt = TestRuntime::new();
        assert_eq!(eval_str(&mut rt, "NOT 0"), Value::Int(-1));
    }
}
