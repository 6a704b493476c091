//! String operations that need to resolve a [`StrRef`] against either the
//! heap or the accumulator (spec §4.A/§4.F) — arithmetic proper stays in
//! `basic_core::arith`, which never has a `MemorySpace` to hand.

use crate::Accumulator;
use basic_core::{BasicError, ErrorCode, StrRef, Value};
use basic_heap::Heap;
use basic_memory::MemorySpace;

/// Borrow a string's bytes, wherever they live.
#[must_use]
pub fn read<'a>(mem: &'a impl MemorySpace, acc: &'a Accumulator, s: StrRef) -> &'a [u8] {
    if s.owned {
        mem.slice(s.addr, s.len())
    } else {
        acc.read(s)
    }
}

/// `a + b` where at least one operand is a string: BASIC string `+` is
/// concatenation, and concatenating a number coerces it to its decimal
/// text first.
pub fn concat(mem: &impl MemorySpace, acc: &mut Accumulator, a: Value, b: Value) -> Result<Value, BasicError> {
    let mut bytes = to_text_bytes(mem, acc, a);
    bytes.extend(to_text_bytes(mem, acc, b));
    Ok(Value::Str(acc.store(&bytes)))
}

fn to_text_bytes(mem: &impl MemorySpace, acc: &Accumulator, v: Value) -> Vec<u8> {
    match v {
        Value::Str(s) => read(mem, acc, s).to_vec(),
        Value::Int(n) => n.to_string().into_bytes(),
        Value::Float(f) => crate::numtext::format_float(f).into_bytes(),
    }
}

/// Lexicographic byte comparison for `= <> < > <= >=` between two strings.
pub fn compare(mem: &impl MemorySpace, acc: &Accumulator, a: StrRef, b: StrRef) -> std::cmp::Ordering {
    read(mem, acc, a).cmp(read(mem, acc, b))
}

/// Copy an accumulator-resident string onto the heap, so it survives past
/// the next call that reuses the accumulator (spec §5: "must either live
/// in the accumulator... or be promoted into the heap").
///
/// # Errors
/// Whatever [`Heap::allocate`] returns on exhaustion.
pub fn promote_to_heap(
    mem: &mut impl MemorySpace,
    heap: &mut Heap,
    acc: &Accumulator,
    s: StrRef,
    stack_top: basic_memory::Addr,
) -> Result<StrRef, BasicError> {
    if s.owned {
        return Ok(s);
    }
    let bytes = acc.read(s).to_vec();
    let addr = heap.allocate(mem, None, bytes.len(), stack_top, 0)?;
    mem.slice_mut(addr, bytes.len()).copy_from_slice(&bytes);
    Ok(StrRef::heap(addr, bytes.len() as u32))
}

/// Reject a string longer than 255 bytes, the classic BBC BASIC string
/// length ceiling (`LEFT$`/`MID$`/concatenation all observe it).
pub fn check_length(len: usize) -> Result<(), BasicError> {
    if len > 255 {
        Err(BasicError::new(ErrorCode::STRING_TOO_LONG))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basic_memory::{Addr, UserRam};

    #[test]
    fn concat_joins_two_accumulator_strings() {
        let mem = UserRam::new(64);
        let mut acc = Accumulator::new();
        let a = acc.store(b"foo");
        let b = acc.store(b"bar");
        let v = concat(&mem, &mut acc, Value::Str(a), Value::Str(b)).unwrap();
        match v {
            Value::Str(s) => assert_eq!(acc.read(s), b"foobar"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn concat_coerces_a_number_to_text() {
        let mem = UserRam::new(64);
        let mut acc = Accumulator::new();
        let a = acc.store(b"n=");
        let v = concat(&mem, &mut acc, Value::Str(a), Value::Int(42)).unwrap();
        match v {
            Value::Str(s) => assert_eq!(acc.read(s), b"n=42"),
            _ => panic!("expected string"),
        }
    }

    #[test]
    fn promote_copies_accumulator_bytes_onto_the_heap() {
        let mut mem = UserRam::new(256);
        let mut heap = Heap::new(Addr::new(0));
        let mut acc = Accumulator::new();
        let s = acc.store(b"promote me");
        let heap_ref = promote_to_heap(&mut mem, &mut heap, &acc, s, Addr::new(256)).unwrap();
        assert!(heap_ref.owned);
        assert_eq!(mem.slice(heap_ref.addr, heap_ref.len()), b"promote me");
    }
}
