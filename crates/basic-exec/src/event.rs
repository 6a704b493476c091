//! The event dispatcher (spec §4.I): a flags byte the host can set
//! asynchronously (from the executor's point of view — everything here
//! still only runs between statements, so there's no real concurrency to
//! reason about), plus a small ring buffer of pending events and the trap
//! table `ON TIMER`/`ON CLOSE`/... installs into.

use std::collections::VecDeque;

use basic_memory::Addr;

/// What kind of event a trap can be installed for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TrapKind {
    Timer,
    Close,
    Move,
    Sys,
    Mouse,
}

#[derive(Clone, Copy, Debug)]
pub struct Event {
    pub kind: TrapKind,
}

/// The {KILL, PAUSE, ALERT, ESC} flags byte. Matches a status register the
/// host can poke between statements more than it matches a Rust
/// "is something pending" boolean, since each flag clears independently of
/// whether the executor has observed it yet.
#[derive(Clone, Copy, Default, Debug)]
pub struct Flags {
    pub kill: bool,
    pub pause: bool,
    pub alert: bool,
    pub escape: bool,
}

impl Flags {
    #[must_use]
    pub const fn any(self) -> bool {
        self.kill || self.pause || self.alert || self.escape
    }
}

const QUEUE_CAPACITY: usize = 32;

/// Bounded ring buffer of events the host has posted; `basic-host`'s
/// `MockHost` in tests posts directly into this via the interpreter, since
/// the host trait itself has no async channel of its own (spec §5: "the
/// host may post events... the core observes them only at the next
/// statement boundary").
#[derive(Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
    traps: Vec<(TrapKind, Addr)>,
}

impl EventQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Post an event, dropping the oldest if the ring is full.
    pub fn post(&mut self, event: Event) {
        if self.events.len() >= QUEUE_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn install_trap(&mut self, kind: TrapKind, handler: Addr) {
        if let Some(entry) = self.traps.iter_mut().find(|(k, _)| *k == kind) {
            entry.1 = handler;
        } else {
            self.traps.push((kind, handler));
        }
    }

    pub fn remove_trap(&mut self, kind: TrapKind) {
        self.traps.retain(|(k, _)| *k != kind);
    }

    /// Consume the next pending event and, if a trap is installed for its
    /// kind, return the handler cursor to jump to.
    pub fn dispatch_next(&mut self) -> Option<Addr> {
        let event = self.events.pop_front()?;
        self.traps.iter().find(|(k, _)| *k == event.kind).map(|(_, addr)| *addr)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_returns_the_installed_trap_handler() {
        let mut q = EventQueue::new();
        q.install_trap(TrapKind::Timer, Addr::new(500));
        q.post(Event { kind: TrapKind::Timer });
        assert_eq!(q.dispatch_next(), Some(Addr::new(500)));
    }

    #[test]
    fn dispatch_with_no_trap_installed_just_drains_the_event() {
        let mut q = EventQueue::new();
        q.post(Event { kind: TrapKind::Mouse });
        assert_eq!(q.dispatch_next(), None);
        assert!(q.is_empty());
    }

    #[test]
    fn ring_buffer_drops_oldest_past_capacity() {
        let mut q = EventQueue::new();
        for _ in 0..(QUEUE_CAPACITY + 5) {
            q.post(Event { kind: TrapKind::Sys });
        }
        assert_eq!(q.events.len(), QUEUE_CAPACITY);
    }
}
