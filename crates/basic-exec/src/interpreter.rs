//! The interpreter's owned state: the one concrete type that implements
//! [`basic_eval::Runtime`] and [`basic_eval::EvalHost`], tying memory,
//! heap, symbol table, program store, control stack and host together
//! behind the single seam the evaluator needs.

use std::collections::HashMap;

use basic_core::{BasicError, ErrorCode, Value};
use basic_eval::{Accumulator, Cursor, ErrorState, EvalHost, Rng, Runtime};
use basic_heap::Heap;
use basic_host::Host;
use basic_memory::{Addr, MemorySpace, UserRam};
use basic_program::ProgramStore;
use basic_symbols::SymbolTable;

use crate::error::ExecError;
use crate::event::{EventQueue, Flags};
use crate::frame::{ControlStack, Pos};

/// `ON ERROR [LOCAL] handler`'s installed trap: where to jump, and the
/// control-stack depth to unwind back to first (spec §7).
#[derive(Clone, Copy, Debug)]
pub struct ErrorTrap {
    pub handler: Pos,
    pub anchor: usize,
}

pub struct Interpreter {
    pub mem: UserRam,
    pub heap: Heap,
    pub symbols: SymbolTable,
    pub accumulator: Accumulator,
    pub rng: Rng,
    pub host: Box<dyn Host>,
    pub program: ProgramStore,
    pub control: ControlStack,
    pub events: EventQueue,
    pub flags: Flags,
    pub error_state: ErrorState,
    pub error_trap: Option<ErrorTrap>,
    /// Address of the line record currently executing, for `ERL` and
    /// `GOTO`/`GOSUB` relative bookkeeping.
    pub current_line: Addr,
    pub cursor: Cursor,
    /// Deferred `DEF PROC`/`DEF FN` scan results, keyed by uppercased name.
    pub struct_defs: HashMap<String, std::rc::Rc<basic_symbols::StructDef>>,
    /// `PRIVATE`'s hidden companion storage (spec §3/§4.G): keyed by the
    /// address of the `PRIVATE` statement itself plus the variable name,
    /// so each call site keeps its own persisted value across calls to
    /// the same `FN`/`PROC` without colliding with another call site's
    /// `PRIVATE` of the same name.
    pub private_vars: HashMap<(Addr, String), Value>,
    pub exit_code: Option<i32>,
}

impl Interpreter {
    #[must_use]
    pub fn new(ram_size: usize, host: Box<dyn Host>) -> Self {
        let page = Addr::new(0);
        let mut program = ProgramStore::new(page);
        let mut mem = UserRam::new(ram_size);
        program.reset(&mut mem, 0);
        let lomem = program.top();
        Self {
            mem,
            heap: Heap::new(lomem),
            symbols: SymbolTable::new(),
            accumulator: Accumulator::new(),
            rng: Rng::default(),
            host,
            program,
            control: ControlStack::new(),
            events: EventQueue::new(),
            flags: Flags::default(),
            error_state: ErrorState::default(),
            error_trap: None,
            current_line: page,
            cursor: Cursor::new(lomem, lomem),
            struct_defs: HashMap::new(),
            private_vars: HashMap::new(),
            exit_code: None,
        }
    }

    /// `CLEAR`/`RUN`: drop all variables and reset the heap, keeping the
    /// program and `DEF PROC`/`DEF FN` table.
    pub fn clear(&mut self) {
        self.symbols.clear_variables();
        let lomem = self.program.top();
        self.heap.reset(lomem);
        self.control = ControlStack::new();
        self.error_state = ErrorState::default();
        self.error_trap = None;
        self.accumulator.clear();
        self.private_vars.clear();
    }

    /// `NEW`: `CLEAR`, plus drop the program and function table.
    pub fn new_program(&mut self) {
        self.program.reset(&mut self.mem, 0);
        self.symbols.clear_functions();
        self.struct_defs.clear();
        self.clear();
    }

    /// The ceiling heap growth may not cross. The control stack is a typed
    /// `Vec<Frame>` rather than bytes in this address space (see
    /// `frame.rs`), so there's nothing here for the heap to actually
    /// collide with short of the RAM's own size.
    #[must_use]
    pub fn stack_top_addr(&self) -> Addr {
        Addr::new(self.mem.len() as u32)
    }

    /// Promote a fresh `ExecError` to the current statement's line number.
    #[must_use]
    pub fn err_here(&self, code: ErrorCode, message: impl Into<String>) -> ExecError {
        ExecError::new(code, message).at_line(u32::from(self.program.line_number(&self.mem, self.current_line)))
    }
}

impl Runtime for Interpreter {
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
        &mut self.accumulator
    }

    fn rng(&mut self) -> &mut Rng {
        &mut self.rng
    }

    fn host(&mut self) -> &mut dyn EvalHost {
        self
    }

    fn stack_top(&self) -> Addr {
        self.stack_top_addr()
    }

    fn call_function(&mut self, name: &str, args: &[Value]) -> Result<Value, BasicError> {
        crate::statement::call_fn(self, name, args).map_err(|e| BasicError {
            code: e.code,
            message: e.message,
            line: e.line,
        })
    }

    fn error_state(&self) -> &ErrorState {
        &self.error_state
    }
}

/// `basic-host::HostError` and `basic-core::BasicError` both live outside
/// this crate, so a `From` impl between them would be an orphan instance;
/// this free function is the conversion every host call below goes
/// through instead.
pub(crate) fn host_err(e: basic_host::HostError) -> BasicError {
    let code = match &e {
        basic_host::HostError::NoSuchChannel => ErrorCode::NO_SUCH_CHANNEL,
        basic_host::HostError::ChannelsExhausted | basic_host::HostError::NotFound(_) | basic_host::HostError::Io(_) => {
            ErrorCode::FILE_ERROR
        }
    };
    BasicError::with_message(code, e.to_string())
}

/// Bridges the evaluator's narrow host needs onto the full [`Host`] trait,
/// so `basic-eval`'s builtins (`INKEY`, `EOF#`, `BGET#`, `OSCLI`) work
/// against whatever concrete host the executor was built with.
impl EvalHost for Interpreter {
    fn centiseconds(&self) -> i64 {
        self.host.getime()
    }

    fn inkey(&mut self, n: i32) -> Result<i32, BasicError> {
        self.host.oskey(n).map_err(host_err)
    }

    fn eof(&mut self, channel: i64) -> Result<bool, BasicError> {
        self.host.geteof(channel).map_err(host_err)
    }

    fn bget(&mut self, channel: i64) -> Result<u8, BasicError> {
        self.host.osbget(channel).map_err(host_err)
    }

    fn oscli(&mut self, command: &str) -> Result<(), BasicError> {
        self.host.oscli(command).map_err(host_err)
    }
}
