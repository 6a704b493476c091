//! The name resolver itself: static slots, fast slots, and 27
//! self-organizing buckets (spec §4.D).
//!
//! This keeps the algorithm the spec describes (O(1) statics, O(1) fast
//! slots, move-to-front buckets, a separate non-organizing `@` bucket) but
//! represents bindings as ordinary owned Rust values rather than
//! byte-packed nodes in the shared address space — the spec's own
//! redesign notes ask for typed views over the program/heap/stack, and
//! applying the same idea to the variable table avoids re-deriving a
//! hand-rolled arena for what is, at its core, a small hash/linked-list
//! structure. See DESIGN.md.

use crate::binding::Binding;
use crate::suffix::{self, SuffixKind};
use basic_core::Value;
use basic_memory::Addr;

/// Number of fast slots (tokens `0x19..=0x1F` in the original encoding).
pub const MAX_FAST_SLOTS: usize = 7;

/// Index of the dedicated `@`-system-variable bucket, one past the 26
/// letter buckets.
const SYSTEM_BUCKET: usize = 26;
const NUM_BUCKETS: usize = 27;

struct Entry {
    name: String,
    binding: Binding,
}

pub struct SymbolTable {
    /// `A%..Z%`, indexed by `letter - 'A'`.
    statics: [Value; 26],
    fast_names: Vec<String>,
    fast_values: Vec<Binding>,
    buckets: [Vec<Entry>; NUM_BUCKETS],
    /// `DEF FN` name -> program cursor of the `DEF` line.
    functions: Vec<(String, Addr)>,
    /// `DEF PROC` name -> program cursor of the `DEF` line.
    procedures: Vec<(String, Addr)>,
    /// Whether names other than the statics are compared case-sensitively
    /// ("lowercase option", spec §4.D).
    pub case_sensitive: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            statics: [Value::Int(0); 26],
            fast_names: Vec::with_capacity(MAX_FAST_SLOTS),
            fast_values: Vec::with_capacity(MAX_FAST_SLOTS),
            buckets: std::array::from_fn(|_| Vec::new()),
            functions: Vec::new(),
            procedures: Vec::new(),
            case_sensitive: false,
        }
    }

    /// Reset everything but the FN/PROC tables, as `CLEAR` does (they're
    /// dropped separately by `RUN`/`CHAIN`/`INSTALL` rescans).
    pub fn clear_variables(&mut self) {
        self.statics = [Value::Int(0); 26];
        self.fast_names.clear();
        self.fast_values.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }

    pub fn clear_functions(&mut self) {
        self.functions.clear();
        self.procedures.clear();
    }

    fn normalize<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        if self.case_sensitive {
            std::borrow::Cow::Borrowed(name)
        } else {
            std::borrow::Cow::Owned(name.to_ascii_uppercase())
        }
    }

    /// Is `name` one of the 26 static integer slots (`A%`, or `a%` when
    /// the lowercase option is on)? Case folds regardless of
    /// [`Self::case_sensitive`]: the original keeps one static table no
    /// matter which case convention is active.
    fn static_index(name: &str) -> Option<usize> {
        let mut chars = name.chars();
        let letter = chars.next()?;
        if chars.as_str() != "%" {
            return None;
        }
        if letter.is_ascii_alphabetic() {
            Some((letter.to_ascii_uppercase() as u8 - b'A') as usize)
        } else {
            None
        }
    }

    fn bucket_of(name: &str) -> usize {
        match name.as_bytes().first() {
            Some(b'@') => SYSTEM_BUCKET,
            Some(&b) if b.is_ascii_alphabetic() => (b.to_ascii_uppercase() - b'A') as usize,
            _ => SYSTEM_BUCKET,
        }
    }

    /// Register a tokenized name for O(1) fast-slot access. A no-op
    /// returning the existing slot if already registered; returns `None`
    /// once all [`MAX_FAST_SLOTS`] are taken.
    pub fn assign_fast_slot(&mut self, name: &str) -> Option<u8> {
        let key = self.normalize(name).into_owned();
        if let Some(i) = self.fast_names.iter().position(|n| *n == key) {
            return Some(i as u8);
        }
        if self.fast_names.len() >= MAX_FAST_SLOTS {
            return None;
        }
        self.fast_names.push(key);
        self.fast_values.push(Binding::Scalar(default_for(suffix::kind_of(name))));
        Some((self.fast_names.len() - 1) as u8)
    }

    /// Look up a non-static name's full binding (array or structure,
    /// not just a scalar), promoting it to its bucket's head on a hit —
    /// the self-organizing behaviour spec §4.D describes. Fast slots are
    /// already O(1) and are never reordered. Returns `None` for `A%..Z%`
    /// names; those are always bare scalars, so use [`Self::get_scalar`].
    pub fn get_binding(&mut self, name: &str) -> Option<&Binding> {
        if Self::static_index(name).is_some() {
            return None;
        }
        let key = self.normalize(name);
        if let Some(i) = self.fast_names.iter().position(|n| n == key.as_ref()) {
            return self.fast_values.get(i);
        }
        let bucket = Self::bucket_of(&key);
        let list = &mut self.buckets[bucket];
        let pos = list.iter().position(|e| e.name == key.as_ref())?;
        if bucket != SYSTEM_BUCKET && pos != 0 {
            let entry = list.remove(pos);
            list.insert(0, entry);
            return Some(&list[0].binding);
        }
        Some(&list[pos].binding)
    }

    /// Mutable counterpart to [`Self::get_binding`], e.g. for indexing
    /// into an array element in place. Also promotes on hit.
    pub fn get_binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        if Self::static_index(name).is_some() {
            return None;
        }
        let key = self.normalize(name);
        if let Some(i) = self.fast_names.iter().position(|n| n == key.as_ref()) {
            return self.fast_values.get_mut(i);
        }
        let bucket = Self::bucket_of(&key);
        let list = &mut self.buckets[bucket];
        let pos = list.iter().position(|e| e.name == key.as_ref())?;
        if bucket != SYSTEM_BUCKET && pos != 0 {
            let entry = list.remove(pos);
            list.insert(0, entry);
            return Some(&mut list[0].binding);
        }
        Some(&mut list[pos].binding)
    }

    /// Read a static or fast scalar slot directly (the common path the
    /// evaluator takes for `A%` and install-time fast names).
    #[must_use]
    pub fn get_scalar(&self, name: &str) -> Option<Value> {
        if let Some(idx) = Self::static_index(name) {
            return Some(self.statics[idx]);
        }
        let key = self.normalize(name);
        if let Some(i) = self.fast_names.iter().position(|n| n == key.as_ref()) {
            return self.fast_values[i].as_scalar().copied();
        }
        let bucket = Self::bucket_of(&key);
        self.buckets[bucket]
            .iter()
            .find(|e| e.name == key.as_ref())
            .and_then(|e| e.binding.as_scalar())
            .copied()
    }

    /// Create-or-update a name's binding. Creating a brand-new bucket name
    /// prepends the new node to its bucket's head, per the spec's node
    /// layout (`[next=old-head-offset, ...]`).
    pub fn set(&mut self, name: &str, binding: Binding) {
        if let Some(idx) = Self::static_index(name) {
            if let Binding::Scalar(v) = binding {
                self.statics[idx] = v;
            }
            return;
        }
        let key = self.normalize(name).into_owned();
        if let Some(i) = self.fast_names.iter().position(|n| *n == key) {
            self.fast_values[i] = binding;
            return;
        }
        let bucket = Self::bucket_of(&key);
        let list = &mut self.buckets[bucket];
        if let Some(i) = list.iter().position(|e| e.name == key) {
            list[i].binding = binding;
            if bucket != SYSTEM_BUCKET && i != 0 {
                let entry = list.remove(i);
                list.insert(0, entry);
            }
            return;
        }
        list.insert(0, Entry { name: key, binding });
    }

    pub fn set_scalar(&mut self, name: &str, value: Value) {
        self.set(name, Binding::Scalar(value));
    }

    #[must_use]
    pub fn declared_kind(name: &str) -> SuffixKind {
        suffix::kind_of(name)
    }

    pub fn define_function(&mut self, name: impl Into<String>, cursor: Addr) {
        define(&mut self.functions, name.into(), cursor);
    }

    pub fn define_procedure(&mut self, name: impl Into<String>, cursor: Addr) {
        define(&mut self.procedures, name.into(), cursor);
    }

    #[must_use]
    pub fn lookup_function(&self, name: &str) -> Option<Addr> {
        lookup(&self.functions, name, self.case_sensitive)
    }

    #[must_use]
    pub fn lookup_procedure(&self, name: &str) -> Option<Addr> {
        lookup(&self.procedures, name, self.case_sensitive)
    }
}

fn define(table: &mut Vec<(String, Addr)>, name: String, cursor: Addr) {
    if let Some(entry) = table.iter_mut().find(|(n, _)| *n == name) {
        entry.1 = cursor;
    } else {
        table.push((name, cursor));
    }
}

fn lookup(table: &[(String, Addr)], name: &str, case_sensitive: bool) -> Option<Addr> {
    table
        .iter()
        .find(|(n, _)| {
            if case_sensitive {
                n == name
            } else {
                n.eq_ignore_ascii_case(name)
            }
        })
        .map(|(_, cursor)| *cursor)
}

fn default_for(kind: SuffixKind) -> Value {
    match kind {
        SuffixKind::Int => Value::Int(0),
        SuffixKind::Float => Value::Float(0.0),
        SuffixKind::Str => Value::Str(basic_core::StrRef::heap(Addr::NULL, 0)),
        SuffixKind::Struct => Value::Int(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_slots_are_o1_and_shared_by_letter() {
        let mut table = SymbolTable::new();
        table.set_scalar("A%", Value::Int(42));
        assert_eq!(table.get_scalar("A%"), Some(Value::Int(42)));
        assert_eq!(table.get_scalar("B%"), Some(Value::Int(0)));
    }

    #[test]
    fn fast_slots_fill_up_and_then_refuse() {
        let mut table = SymbolTable::new();
        for i in 0..MAX_FAST_SLOTS {
            let name = format!("v{i}%");
            assert!(table.assign_fast_slot(&name).is_some());
        }
        assert_eq!(table.assign_fast_slot("overflow%"), None);
    }

    #[test]
    fn bucket_lookup_promotes_hit_to_head() {
        let mut table = SymbolTable::new();
        table.set_scalar("apple$", Value::Int(1));
        table.set_scalar("avocado$", Value::Int(2));
        // avocado was inserted after apple, so it's currently the head.
        table.get_binding("apple$");
        // apple now promoted to head; confirm via direct bucket order.
        let bucket = SymbolTable::bucket_of("apple$");
        assert_eq!(table.buckets[bucket][0].name, "APPLE$");
    }

    #[test]
    fn system_bucket_is_not_self_organizing() {
        let mut table = SymbolTable::new();
        table.set_scalar("@cmd$", Value::Int(1));
        table.set_scalar("@dir$", Value::Int(2));
        table.get_binding("@cmd$");
        let bucket = SymbolTable::bucket_of("@cmd$");
        // @dir$ stays at the head; @-bucket never reorders on lookup.
        assert_eq!(table.buckets[bucket][0].name, "@DIR$");
    }

    #[test]
    fn proc_table_resolves_by_name() {
        let mut table = SymbolTable::new();
        table.define_procedure("greet", Addr::new(100));
        assert_eq!(table.lookup_procedure("GREET"), Some(Addr::new(100)));
        assert_eq!(table.lookup_procedure("missing"), None);
    }
}
