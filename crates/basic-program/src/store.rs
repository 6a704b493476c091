//! The tokenized program store (spec §4.E): a singly-linked chain of line
//! records `[length:1, lineno:2, tokens..., 0x0D]` living at the bottom of
//! user RAM, terminated by a `length == 0` record whose would-be line
//! number field instead holds the count of reserved fast-variable slots.

use basic_core::{BasicError, ErrorCode};
use basic_memory::{Addr, MemorySpace};

/// Bytes of header (`length` + `lineno`) before a line's tokens.
const HEADER_SIZE: u32 = 3;
/// Header + trailing `0x0D` terminator.
const RECORD_OVERHEAD: u32 = HEADER_SIZE + 1;

fn data_token() -> u8 {
    basic_lexer::keyword::token_for_keyword("DATA").expect("DATA is a keyword")
}

/// Result of [`ProgramStore::find_line`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FindResult {
    /// A line numbered exactly `n` exists at this address.
    Exact(Addr),
    /// No line numbered `n`; this is the address of the first line past
    /// where it would go.
    InsertBefore(Addr),
    /// No line numbered `n`, and it's past the last line; this is the
    /// address of the terminator record.
    EndOfProgram(Addr),
}

impl FindResult {
    #[must_use]
    pub const fn addr(self) -> Addr {
        match self {
            Self::Exact(a) | Self::InsertBefore(a) | Self::EndOfProgram(a) => a,
        }
    }
}

/// Outcome of [`ProgramStore::gettop`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GetTop {
    pub top: Addr,
    pub fast_slots_reserved: u16,
}

pub struct ProgramStore {
    page: Addr,
    top: Addr,
    data_line: Option<Addr>,
    data_item: usize,
}

impl ProgramStore {
    #[must_use]
    pub const fn new(page: Addr) -> Self {
        Self {
            page,
            top: page,
            data_line: None,
            data_item: 0,
        }
    }

    #[must_use]
    pub const fn page(&self) -> Addr {
        self.page
    }

    /// One past the terminator record; this is `LOMEM`.
    #[must_use]
    pub const fn top(&self) -> Addr {
        self.top
    }

    /// Write a fresh, empty program (`NEW`).
    pub fn reset(&mut self, mem: &mut impl MemorySpace, fast_slots_reserved: u16) {
        mem.write_u8(self.page, 0);
        mem.write_u16(self.page.add(1), fast_slots_reserved);
        self.top = self.page.add(HEADER_SIZE);
        self.data_line = None;
        self.data_item = 0;
    }

    fn record_len(mem: &impl MemorySpace, addr: Addr) -> u8 {
        mem.read_u8(addr)
    }

    #[must_use]
    pub fn line_number(&self, mem: &impl MemorySpace, addr: Addr) -> u16 {
        mem.read_u16(addr.add(1))
    }

    fn tokens_span(addr: Addr, record_len: u8) -> (Addr, u32) {
        (addr.add(HEADER_SIZE), u32::from(record_len) - RECORD_OVERHEAD)
    }

    /// The token bytes of the line record at `addr`.
    #[must_use]
    pub fn tokens(&self, mem: &impl MemorySpace, addr: Addr) -> (Addr, u32) {
        Self::tokens_span(addr, Self::record_len(mem, addr))
    }

    /// The address of the next line record, or `None` at the terminator.
    #[must_use]
    pub fn next_line(&self, mem: &impl MemorySpace, addr: Addr) -> Option<Addr> {
        let len = Self::record_len(mem, addr);
        (len != 0).then(|| addr.add(u32::from(len)))
    }

    /// Walk to the terminator, validating the chain and recovering the
    /// reserved fast-slot count it stores. Also refreshes `top()`.
    ///
    /// # Errors
    /// [`ErrorCode::BAD_PROGRAM`] if the chain runs off the end of `mem`
    /// without hitting a `length == 0` record.
    pub fn gettop(&mut self, mem: &impl MemorySpace) -> Result<GetTop, BasicError> {
        let mut addr = self.page;
        loop {
            if addr.as_usize() >= mem.len() {
                return Err(BasicError::new(ErrorCode::BAD_PROGRAM));
            }
            let len = Self::record_len(mem, addr);
            if len == 0 {
                let fast_slots_reserved = mem.read_u16(addr.add(1));
                let top = addr.add(HEADER_SIZE);
                self.top = top;
                return Ok(GetTop {
                    top,
                    fast_slots_reserved,
                });
            }
            addr = addr.add(u32::from(len));
        }
    }

    /// Walk the chain until the stored line number matches or exceeds `n`.
    #[must_use]
    pub fn find_line(&self, mem: &impl MemorySpace, n: u16) -> FindResult {
        let mut addr = self.page;
        loop {
            let len = Self::record_len(mem, addr);
            if len == 0 {
                return FindResult::EndOfProgram(addr);
            }
            let line_no = self.line_number(mem, addr);
            match line_no.cmp(&n) {
                std::cmp::Ordering::Equal => return FindResult::Exact(addr),
                std::cmp::Ordering::Greater => return FindResult::InsertBefore(addr),
                std::cmp::Ordering::Less => addr = addr.add(u32::from(len)),
            }
        }
    }

    /// Scan forward from `start` for the first line whose tokens contain
    /// byte `tok` outside a string literal. Keyword tokens never collide
    /// with the ASCII range string/`REM`/`DATA` payloads are stored in, so
    /// this can't walk into a comment or a quoted string by accident.
    #[must_use]
    pub fn search_line_with_token(&self, mem: &impl MemorySpace, start: Addr, tok: u8) -> Option<Addr> {
        let mut addr = start;
        loop {
            let len = Self::record_len(mem, addr);
            if len == 0 {
                return None;
            }
            let (tok_start, tok_len) = Self::tokens_span(addr, len);
            let mut in_string = false;
            for i in 0..tok_len {
                let b = mem.read_u8(tok_start.add(i));
                if b == b'"' {
                    in_string = !in_string;
                } else if !in_string && b == tok {
                    return Some(addr);
                }
            }
            addr = addr.add(u32::from(len));
        }
    }

    /// Replace (or delete, if `tokens` is empty) the line numbered
    /// `line_no`, or insert a new one in sorted position.
    ///
    /// # Errors
    /// [`ErrorCode::BAD_PROGRAM`] if the encoded record would exceed 255
    /// bytes; [`ErrorCode::NO_ROOM`] if it doesn't fit before the control
    /// stack (bound by `mem.len()` here, since this crate doesn't know the
    /// stack's extent).
    pub fn set_line(
        &mut self,
        mem: &mut impl MemorySpace,
        line_no: u16,
        tokens: &[u8],
    ) -> Result<(), BasicError> {
        let insert_at = match self.find_line(mem, line_no) {
            FindResult::Exact(addr) => {
                self.remove_record(mem, addr)?;
                addr
            }
            FindResult::InsertBefore(addr) | FindResult::EndOfProgram(addr) => addr,
        };

        if tokens.is_empty() {
            return Ok(());
        }

        let record_len = tokens.len() + RECORD_OVERHEAD as usize;
        if record_len > usize::from(u8::MAX) {
            return Err(BasicError::with_message(ErrorCode::BAD_PROGRAM, "line too long"));
        }

        let mut record = Vec::with_capacity(record_len);
        record.push(record_len as u8);
        record.extend_from_slice(&line_no.to_le_bytes());
        record.extend_from_slice(tokens);
        record.push(0x0D);
        self.insert_record(mem, insert_at, &record)
    }

    fn remove_record(&mut self, mem: &mut impl MemorySpace, addr: Addr) -> Result<(), BasicError> {
        let len = u32::from(Self::record_len(mem, addr));
        let tail_start = addr.add(len);
        let tail_len = self.top.diff(tail_start);
        if tail_len < 0 {
            return Err(BasicError::new(ErrorCode::BAD_PROGRAM));
        }
        mem.copy_within(tail_start, addr, tail_len as usize);
        self.top = self.top.sub(len);
        Ok(())
    }

    fn insert_record(&mut self, mem: &mut impl MemorySpace, addr: Addr, record: &[u8]) -> Result<(), BasicError> {
        let len = record.len() as u32;
        let new_top = self.top.add(len);
        if new_top.as_usize() > mem.len() {
            return Err(BasicError::new(ErrorCode::NO_ROOM));
        }
        let tail_len = self.top.diff(addr);
        if tail_len < 0 {
            return Err(BasicError::new(ErrorCode::BAD_PROGRAM));
        }
        mem.copy_within(addr, addr.add(len), tail_len as usize);
        mem.slice_mut(addr, record.len()).copy_from_slice(record);
        self.top = new_top;
        Ok(())
    }

    /// `RESTORE` with no argument: reset the DATA pointer to the first
    /// `DATA` statement in the program.
    pub fn restore_to_first_data(&mut self, mem: &impl MemorySpace) {
        self.data_line = self.search_line_with_token(mem, self.page, data_token());
        self.data_item = 0;
    }

    /// `RESTORE +n`: advance `n` line records from `current_line` and
    /// resume DATA reading there (the line need not itself contain `DATA`;
    /// the next `READ` will search forward from it).
    ///
    /// # Errors
    /// [`ErrorCode::NO_SUCH_LINE`] if advancing `n` lines runs past the
    /// end of the program.
    pub fn restore_relative(
        &mut self,
        mem: &impl MemorySpace,
        current_line: Addr,
        delta: u16,
    ) -> Result<(), BasicError> {
        let mut addr = current_line;
        for _ in 0..delta {
            addr = self
                .next_line(mem, addr)
                .ok_or_else(|| BasicError::new(ErrorCode::NO_SUCH_LINE))?;
        }
        self.data_line = Some(addr);
        self.data_item = 0;
        Ok(())
    }

    /// `RESTORE <line>`: resume DATA reading at a specific line address
    /// (as located by [`Self::find_line`]).
    pub fn restore_to_line(&mut self, addr: Addr) {
        self.data_line = Some(addr);
        self.data_item = 0;
    }

    /// The current DATA pointer, for `RESTORE LOCAL`'s save/restore frame.
    #[must_use]
    pub const fn data_cursor(&self) -> (Option<Addr>, usize) {
        (self.data_line, self.data_item)
    }

    /// Install a previously-saved DATA pointer verbatim, restoring the
    /// enclosing scope's position on `PROC`/`FN` exit.
    pub fn set_data_cursor(&mut self, line: Option<Addr>, item: usize) {
        self.data_line = line;
        self.data_item = item;
    }

    /// `READ`: return the next DATA item's raw text (the evaluator parses
    /// it against the destination variable's declared type).
    ///
    /// # Errors
    /// [`ErrorCode::OUT_OF_DATA`] once every `DATA` statement in the
    /// program has been consumed.
    pub fn read_data(&mut self, mem: &impl MemorySpace) -> Result<String, BasicError> {
        if self.data_line.is_none() {
            self.restore_to_first_data(mem);
        }
        loop {
            let Some(line_addr) = self.data_line else {
                return Err(BasicError::new(ErrorCode::OUT_OF_DATA));
            };
            let items = self.data_items(mem, line_addr);
            if self.data_item < items.len() {
                let item = items[self.data_item].clone();
                self.data_item += 1;
                return Ok(item);
            }
            self.data_line = self
                .next_line(mem, line_addr)
                .and_then(|addr| self.search_line_with_token(mem, addr, data_token()));
            self.data_item = 0;
            if self.data_line.is_none() {
                return Err(BasicError::new(ErrorCode::OUT_OF_DATA));
            }
        }
    }

    /// `LOAD` on a file that already ends in `0x0D` (spec §6.2): the raw
    /// record chain is installed verbatim, then walked once to recover
    /// `top()` and validate it isn't corrupt.
    ///
    /// # Errors
    /// [`ErrorCode::NO_ROOM`] if the image doesn't fit below the control
    /// stack; [`ErrorCode::BAD_PROGRAM`] if the chain doesn't terminate.
    pub fn load_tokenized(&mut self, mem: &mut impl MemorySpace, image: &[u8]) -> Result<(), BasicError> {
        let end = self.page.add(image.len() as u32);
        if end.as_usize() > mem.len() {
            return Err(BasicError::new(ErrorCode::NO_ROOM));
        }
        mem.slice_mut(self.page, image.len()).copy_from_slice(image);
        self.data_line = None;
        self.data_item = 0;
        self.gettop(mem)?;
        Ok(())
    }

    /// `LOAD` on a file that doesn't end in `0x0D`: plain text, one
    /// statement per line, re-tokenized and inserted the same way typing
    /// it in would (spec §6.2).
    ///
    /// # Errors
    /// Whatever [`basic_lexer::tokenize`] or [`Self::set_line`] return for
    /// a malformed or oversized line.
    pub fn load_text(&mut self, mem: &mut impl MemorySpace, text: &str) -> Result<(), BasicError> {
        self.reset(mem, 0);
        for raw_line in text.lines() {
            let line = raw_line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let digits_end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
            if digits_end == 0 {
                continue;
            }
            let line_no: u16 = line[..digits_end]
                .parse()
                .map_err(|_| BasicError::with_message(ErrorCode::BAD_PROGRAM, "line number out of range"))?;
            let tokens = basic_lexer::tokenize(line[digits_end..].trim_start())?;
            self.set_line(mem, line_no, &tokens)?;
        }
        Ok(())
    }

    fn data_items(&self, mem: &impl MemorySpace, line_addr: Addr) -> Vec<String> {
        let len = Self::record_len(mem, line_addr);
        let (tok_start, tok_len) = Self::tokens_span(line_addr, len);
        let bytes: Vec<u8> = (0..tok_len).map(|i| mem.read_u8(tok_start.add(i))).collect();
        let Some(pos) = bytes.iter().position(|&b| b == data_token()) else {
            return Vec::new();
        };
        split_data_items(&bytes[pos + 1..])
    }
}

fn split_data_items(payload: &[u8]) -> Vec<String> {
    let mut items = Vec::new();
    let mut i = 0;
    while i < payload.len() {
        while i < payload.len() && matches!(payload[i], b' ' | b',') {
            i += 1;
        }
        if i >= payload.len() {
            break;
        }
        if payload[i] == b'"' {
            i += 1;
            let mut s = String::new();
            while i < payload.len() {
                if payload[i] == b'"' {
                    if payload.get(i + 1) == Some(&b'"') {
                        s.push('"');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                s.push(payload[i] as char);
                i += 1;
            }
            items.push(s);
        } else {
            let start = i;
            while i < payload.len() && payload[i] != b',' {
                i += 1;
            }
            items.push(String::from_utf8_lossy(&payload[start..i]).trim().to_string());
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use basic_lexer::tokenize;
    use basic_memory::UserRam;

    fn build_program(lines: &[(u16, &str)]) -> (UserRam, ProgramStore) {
        let mut mem = UserRam::new(4096);
        let mut store = ProgramStore::new(Addr::new(0));
        store.reset(&mut mem, 0);
        for &(no, src) in lines {
            let tokens = tokenize(src).unwrap();
            store.set_line(&mut mem, no, &tokens).unwrap();
        }
        (mem, store)
    }

    #[test]
    fn find_line_locates_exact_and_gaps() {
        let (mem, store) = build_program(&[(10, "PRINT 1"), (30, "PRINT 3")]);
        assert!(matches!(store.find_line(&mem, 10), FindResult::Exact(_)));
        assert!(matches!(store.find_line(&mem, 20), FindResult::InsertBefore(_)));
        assert!(matches!(store.find_line(&mem, 40), FindResult::EndOfProgram(_)));
    }

    #[test]
    fn gettop_walks_to_terminator() {
        let (mem, mut store) = build_program(&[(10, "PRINT 1"), (20, "PRINT 2")]);
        let result = store.gettop(&mem).unwrap();
        assert_eq!(result.top, store.top());
        assert_eq!(result.fast_slots_reserved, 0);
    }

    #[test]
    fn inserting_out_of_order_keeps_lines_sorted() {
        let (mem, store) = build_program(&[(20, "PRINT 2"), (10, "PRINT 1"), (30, "PRINT 3")]);
        let mut addr = store.page();
        let mut seen = Vec::new();
        while let FindResult::Exact(_) | FindResult::InsertBefore(_) = store.find_line(&mem, store.line_number(&mem, addr)) {
            seen.push(store.line_number(&mem, addr));
            match store.next_line(&mem, addr) {
                Some(next) => addr = next,
                None => break,
            }
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }

    #[test]
    fn deleting_a_line_removes_it_from_the_chain() {
        let (mut mem, mut store) = build_program(&[(10, "PRINT 1"), (20, "PRINT 2")]);
        store.set_line(&mut mem, 10, &[]).unwrap();
        assert!(matches!(store.find_line(&mem, 10), FindResult::InsertBefore(_) | FindResult::EndOfProgram(_)));
        assert!(matches!(store.find_line(&mem, 20), FindResult::Exact(_)));
    }

    #[test]
    fn read_and_restore_cycle_through_data() {
        let (mem, mut store) = build_program(&[(10, "DATA 1, \"two\", 3"), (20, "DATA 4")]);
        assert_eq!(store.read_data(&mem).unwrap(), "1");
        assert_eq!(store.read_data(&mem).unwrap(), "two");
        assert_eq!(store.read_data(&mem).unwrap(), "3");
        assert_eq!(store.read_data(&mem).unwrap(), "4");
        assert!(store.read_data(&mem).is_err());

        store.restore_to_first_data(&mem);
        assert_eq!(store.read_data(&mem).unwrap(), "1");
    }

    #[test]
    fn restore_relative_skips_forward_from_current_line() {
        let (mem, mut store) = build_program(&[(10, "DATA 1"), (20, "DATA 2"), (30, "DATA 3")]);
        let line10 = store.find_line(&mem, 10).addr();
        store.restore_relative(&mem, line10, 1).unwrap();
        assert_eq!(store.read_data(&mem).unwrap(), "2");
    }
}
