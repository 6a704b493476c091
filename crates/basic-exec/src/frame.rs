//! The control stack (spec §4.H): one frame per active `GOSUB`, loop,
//! call or trap handler. The spec describes it as a raw byte array with
//! marker-tagged records; `basic-symbols::SymbolTable` already made the
//! same call for variable bindings (typed Rust values over a byte arena),
//! so the stack here is a `Vec<Frame>` instead of packed bytes — see
//! DESIGN.md.

use basic_core::Value;
use basic_eval::Cursor;
use basic_memory::Addr;
use basic_symbols::Binding;

/// A fully resumable program position: the bounded token cursor plus the
/// line record it belongs to (needed to recover `ERL` and to find the
/// *next* line once the cursor runs off the end of this one).
#[derive(Clone, Copy, Debug)]
pub struct Pos {
    pub cursor: Cursor,
    pub line: Addr,
}

/// One entry in a `RETURN`-formal writeback list, recorded when a `PROC`/
/// `FN` call binds a `RETURN name%` formal to a variable actual.
#[derive(Clone, Debug)]
pub struct ReturnBinding {
    pub formal: String,
    pub actual: String,
}

/// A loop kind, for `EXIT` and mismatched-`NEXT` unwinding.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopKind {
    For,
    Repeat,
    While,
}

#[derive(Clone, Debug)]
pub enum Frame {
    Gosub {
        return_pos: Pos,
    },
    FnReturn {
        return_pos: Pos,
    },
    ProcReturn {
        return_pos: Pos,
    },
    For {
        body_pos: Pos,
        var_name: String,
        limit: Value,
        step: Value,
    },
    Repeat {
        body_pos: Pos,
    },
    While {
        condition_pos: Pos,
    },
    /// A `LOCAL`/formal-binding save: restores `var_name` to `saved` (or
    /// removes it, if it didn't exist before) when popped.
    Local {
        var_name: String,
        saved: Option<Binding>,
    },
    /// A `PRIVATE` save: like `Local`, but its current value is also
    /// copied into the call site's hidden companion slot (`site`) before
    /// `var_name` is restored, so the next call from the same site picks
    /// up where this one left off.
    Private {
        var_name: String,
        saved: Option<Binding>,
        site: Addr,
    },
    LocalData {
        saved_line: Option<Addr>,
        saved_item: usize,
    },
    OnError {
        saved_handler: Option<Pos>,
        saved_anchor: usize,
    },
    /// `LOCAL DIM`: an array/struct binding allocated for the lifetime of
    /// the enclosing call, restored (or removed) on exit.
    DimStack {
        var_name: String,
        saved: Option<Binding>,
    },
    ReturnInfo {
        entries: Vec<ReturnBinding>,
    },
}

impl Frame {
    #[must_use]
    pub const fn loop_kind(&self) -> Option<LoopKind> {
        match self {
            Self::For { .. } => Some(LoopKind::For),
            Self::Repeat { .. } => Some(LoopKind::Repeat),
            Self::While { .. } => Some(LoopKind::While),
            _ => None,
        }
    }
}

#[derive(Default)]
pub struct ControlStack {
    frames: Vec<Frame>,
}

impl ControlStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    #[must_use]
    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    #[must_use]
    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Truncate back to a previously recorded depth, as `ON ERROR`'s saved
    /// anchor does (spec §7: "stack restored to the anchor").
    pub fn truncate(&mut self, depth: usize) {
        self.frames.truncate(depth);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(n: u32) -> Pos {
        Pos { cursor: Cursor::new(Addr::new(n), Addr::new(n + 10)), line: Addr::new(n) }
    }

    #[test]
    fn push_pop_is_lifo() {
        let mut stack = ControlStack::new();
        stack.push(Frame::Gosub { return_pos: pos(10) });
        stack.push(Frame::Repeat { body_pos: pos(20) });
        assert!(matches!(stack.pop(), Some(Frame::Repeat { .. })));
        assert!(matches!(stack.pop(), Some(Frame::Gosub { .. })));
        assert!(stack.pop().is_none());
    }

    #[test]
    fn truncate_drops_frames_pushed_after_the_anchor() {
        let mut stack = ControlStack::new();
        stack.push(Frame::Gosub { return_pos: pos(1) });
        let anchor = stack.depth();
        stack.push(Frame::Repeat { body_pos: pos(2) });
        stack.push(Frame::Repeat { body_pos: pos(3) });
        stack.truncate(anchor);
        assert_eq!(stack.depth(), 1);
    }
}
