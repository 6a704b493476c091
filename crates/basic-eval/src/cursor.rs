//! A read cursor over a line's token bytes, bounded so the evaluator never
//! reads past the statement it was asked to evaluate.

use basic_memory::{Addr, MemorySpace};

#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    pub pos: Addr,
    pub end: Addr,
}

impl Cursor {
    #[must_use]
    pub const fn new(pos: Addr, end: Addr) -> Self {
        Self { pos, end }
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos.as_usize() >= self.end.as_usize()
    }

    #[must_use]
    pub fn peek(&self, mem: &dyn MemorySpace) -> Option<u8> {
        if self.at_end() {
            None
        } else {
            Some(mem.read_u8(self.pos))
        }
    }

    #[must_use]
    pub fn peek_at(&self, mem: &dyn MemorySpace, offset: u32) -> Option<u8> {
        let p = self.pos.add(offset);
        if p.as_usize() >= self.end.as_usize() {
            None
        } else {
            Some(mem.read_u8(p))
        }
    }

    pub fn advance(&mut self) {
        self.pos = self.pos.add(1);
    }

    pub fn bump(&mut self, mem: &dyn MemorySpace) -> Option<u8> {
        let b = self.peek(mem)?;
        self.advance();
        Some(b)
    }

    pub fn skip_spaces(&mut self, mem: &dyn MemorySpace) {
        while self.peek(mem) == Some(b' ') {
            self.advance();
        }
    }

    /// Consume an identifier: letters/digits/underscore, plus one trailing
    /// type suffix character (`% %% # $ & { .`). Mirrors
    /// `basic_lexer`'s own identifier scan, just reading from `MemorySpace`
    /// instead of a `&str`.
    pub fn read_identifier(&mut self, mem: &dyn MemorySpace) -> String {
        let mut name = String::new();
        while let Some(b) = self.peek(mem) {
            if b.is_ascii_alphanumeric() || b == b'_' {
                name.push(b as char);
                self.advance();
            } else {
                break;
            }
        }
        if let Some(b) = self.peek(mem) {
            if matches!(b, b'%' | b'#' | b'$' | b'&' | b'{' | b'.') {
                name.push(b as char);
                self.advance();
                if b == b'%' && self.peek(mem) == Some(b'%') {
                    name.push('%');
                    self.advance();
                }
            }
        }
        name
    }

    /// Consume a numeric literal: decimal, hex (`&`), or binary (`%`
    /// followed by a binary digit), returning its raw text (the caller
    /// parses it).
    pub fn read_number_text(&mut self, mem: &dyn MemorySpace) -> String {
        let mut text = String::new();
        if self.peek(mem) == Some(b'&') {
            text.push('&');
            self.advance();
            while let Some(b) = self.peek(mem) {
                if b.is_ascii_hexdigit() {
                    text.push(b as char);
                    self.advance();
                } else {
                    break;
                }
            }
            return text;
        }
        if self.peek(mem) == Some(b'%') && matches!(self.peek_at(mem, 1), Some(b'0' | b'1')) {
            text.push('%');
            self.advance();
            while let Some(b @ (b'0' | b'1')) = self.peek(mem) {
                text.push(b as char);
                self.advance();
            }
            return text;
        }
        let mut seen_dot = false;
        while let Some(b) = self.peek(mem) {
            match b {
                b'0'..=b'9' => {
                    text.push(b as char);
                    self.advance();
                }
                b'.' if !seen_dot => {
                    seen_dot = true;
                    text.push('.');
                    self.advance();
                }
                b'E' | b'e' if !text.is_empty() => {
                    let save = *self;
                    let mut exp = String::from("E");
                    self.advance();
                    if matches!(self.peek(mem), Some(b'+' | b'-')) {
                        exp.push(self.peek(mem).unwrap() as char);
                        self.advance();
                    }
                    let digits_start = text.len();
                    let mut any = false;
                    while let Some(d @ b'0'..=b'9') = self.peek(mem) {
                        exp.push(d as char);
                        self.advance();
                        any = true;
                    }
                    let _ = digits_start;
                    if any {
                        text.push_str(&exp);
                    } else {
                        *self = save;
                        break;
                    }
                }
                _ => break,
            }
        }
        text
    }

    /// Consume a `"`-delimited string literal (the opening quote must
    /// already have been consumed by the caller), honouring `""` as an
    /// escaped quote. Returns the unescaped bytes.
    pub fn read_string_literal(&mut self, mem: &dyn MemorySpace) -> Vec<u8> {
        let mut bytes = Vec::new();
        loop {
            match self.bump(mem) {
                Some(b'"') => {
                    if self.peek(mem) == Some(b'"') {
                        bytes.push(b'"');
                        self.advance();
                    } else {
                        break;
                    }
                }
                Some(b) => bytes.push(b),
                None => break,
            }
        }
        bytes
    }
}
