//! A `Host` impl that shares one [`MockHost`] between the `Interpreter`
//! (which owns it as a `Box<dyn Host>`) and the test harness (which needs
//! to inspect its console/file state after the run). `Rc<RefCell<_>>` is
//! the standard way to give two owners mutable access to the same value
//! without touching `Interpreter`'s existing `Box<dyn Host>` field.

use std::cell::RefCell;
use std::rc::Rc;

use basic_host::{Host, HostError, MockHost, OpenMode};

#[derive(Clone)]
pub struct SharedMockHost(Rc<RefCell<MockHost>>);

impl SharedMockHost {
    #[must_use]
    pub fn new() -> Self {
        Self(Rc::new(RefCell::new(MockHost::new())))
    }

    #[must_use]
    pub fn output(&self) -> Vec<u8> {
        self.0.borrow().output().to_vec()
    }

    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        self.0.borrow().commands().to_vec()
    }

    pub fn feed_input(&self, bytes: impl IntoIterator<Item = u8>) {
        self.0.borrow_mut().feed_input(bytes);
    }

    pub fn put_file(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.0.borrow_mut().put_file(name, data);
    }
}

impl Default for SharedMockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SharedMockHost {
    fn ossave(&mut self, name: &str, data: &[u8]) -> Result<(), HostError> {
        self.0.borrow_mut().ossave(name, data)
    }

    fn osload(&mut self, name: &str) -> Result<Vec<u8>, HostError> {
        self.0.borrow_mut().osload(name)
    }

    fn osopen(&mut self, mode: OpenMode, name: &str) -> Result<i64, HostError> {
        self.0.borrow_mut().osopen(mode, name)
    }

    fn osshut(&mut self, channel: i64) -> Result<(), HostError> {
        self.0.borrow_mut().osshut(channel)
    }

    fn osbget(&mut self, channel: i64) -> Result<u8, HostError> {
        self.0.borrow_mut().osbget(channel)
    }

    fn osbput(&mut self, channel: i64, byte: u8) -> Result<(), HostError> {
        self.0.borrow_mut().osbput(channel, byte)
    }

    fn getptr(&self, channel: i64) -> Result<u64, HostError> {
        self.0.borrow().getptr(channel)
    }

    fn setptr(&mut self, channel: i64, ptr: u64) -> Result<(), HostError> {
        self.0.borrow_mut().setptr(channel, ptr)
    }

    fn getext(&self, channel: i64) -> Result<u64, HostError> {
        self.0.borrow().getext(channel)
    }

    fn geteof(&self, channel: i64) -> Result<bool, HostError> {
        self.0.borrow().geteof(channel)
    }

    fn osrdch(&mut self) -> Result<u8, HostError> {
        self.0.borrow_mut().osrdch()
    }

    fn oswrch(&mut self, byte: u8) -> Result<(), HostError> {
        self.0.borrow_mut().oswrch(byte)
    }

    fn osline(&mut self) -> Result<String, HostError> {
        self.0.borrow_mut().osline()
    }

    fn oskey(&mut self, n: i32) -> Result<i32, HostError> {
        self.0.borrow_mut().oskey(n)
    }

    fn oswait(&mut self, cs: u32) {
        self.0.borrow_mut().oswait(cs);
    }

    fn getime(&self) -> i64 {
        self.0.borrow().getime()
    }

    fn putime(&mut self, value: i64) {
        self.0.borrow_mut().putime(value);
    }

    fn oscli(&mut self, command: &str) -> Result<(), HostError> {
        self.0.borrow_mut().oscli(command)
    }

    fn oshwm(&mut self, addr: u32) -> u32 {
        self.0.borrow_mut().oshwm(addr)
    }
}
