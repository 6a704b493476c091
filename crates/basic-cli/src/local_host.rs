//! The disk/stdio-backed [`Host`]: `basic-host::MockHost`'s real-I/O
//! counterpart. Channels map to real [`File`] handles rooted at the
//! directory the CLI was started with (`@dir$`); console I/O goes to the
//! process's own stdin/stdout; `TIME` is centiseconds since this host was
//! constructed.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use basic_host::{Host, HostError, OpenMode};

fn io_err(e: io::Error) -> HostError {
    HostError::Io(e.to_string())
}

struct Channel {
    file: File,
}

pub struct LocalHost {
    dir: PathBuf,
    channels: HashMap<i64, Channel>,
    next_channel: i64,
    commands: Vec<String>,
    start: Instant,
    time_offset: i64,
}

impl LocalHost {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            channels: HashMap::new(),
            next_channel: 1,
            commands: Vec::new(),
            start: Instant::now(),
            time_offset: 0,
        }
    }

    fn resolve(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }

    fn channel_mut(&mut self, channel: i64) -> Result<&mut Channel, HostError> {
        self.channels.get_mut(&channel).ok_or(HostError::NoSuchChannel)
    }

    /// Every `*` command seen so far, for `basic-cli`'s own builtin-star-command
    /// dispatch to fall back on after recognized ones are handled.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl Host for LocalHost {
    fn ossave(&mut self, name: &str, data: &[u8]) -> Result<(), HostError> {
        std::fs::write(self.resolve(name), data).map_err(io_err)
    }

    fn osload(&mut self, name: &str) -> Result<Vec<u8>, HostError> {
        std::fs::read(self.resolve(name)).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                HostError::NotFound(name.to_string())
            } else {
                io_err(e)
            }
        })
    }

    fn osopen(&mut self, mode: OpenMode, name: &str) -> Result<i64, HostError> {
        let path = self.resolve(name);
        let file = match mode {
            OpenMode::Input => File::open(&path).map_err(|_| HostError::NotFound(name.to_string()))?,
            OpenMode::Output => OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path).map_err(io_err)?,
            OpenMode::Update => OpenOptions::new().read(true).write(true).create(true).open(&path).map_err(io_err)?,
        };
        let handle = self.next_channel;
        self.next_channel += 1;
        self.channels.insert(handle, Channel { file });
        Ok(handle)
    }

    fn osshut(&mut self, channel: i64) -> Result<(), HostError> {
        if channel == 0 {
            self.channels.clear();
        } else {
            self.channels.remove(&channel).ok_or(HostError::NoSuchChannel)?;
        }
        Ok(())
    }

    fn osbget(&mut self, channel: i64) -> Result<u8, HostError> {
        let ch = self.channel_mut(channel)?;
        let mut buf = [0u8; 1];
        ch.file.read_exact(&mut buf).map_err(io_err)?;
        Ok(buf[0])
    }

    fn osbput(&mut self, channel: i64, byte: u8) -> Result<(), HostError> {
        let ch = self.channel_mut(channel)?;
        ch.file.write_all(&[byte]).map_err(io_err)
    }

    fn getptr(&self, channel: i64) -> Result<u64, HostError> {
        let ch = self.channels.get(&channel).ok_or(HostError::NoSuchChannel)?;
        ch.file.try_clone().map_err(io_err)?.stream_position().map_err(io_err)
    }

    fn setptr(&mut self, channel: i64, ptr: u64) -> Result<(), HostError> {
        let ch = self.channel_mut(channel)?;
        ch.file.seek(SeekFrom::Start(ptr)).map_err(io_err)?;
        Ok(())
    }

    fn getext(&self, channel: i64) -> Result<u64, HostError> {
        let ch = self.channels.get(&channel).ok_or(HostError::NoSuchChannel)?;
        ch.file.metadata().map(|m| m.len()).map_err(io_err)
    }

    fn geteof(&self, channel: i64) -> Result<bool, HostError> {
        Ok(self.getptr(channel)? >= self.getext(channel)?)
    }

    fn osrdch(&mut self) -> Result<u8, HostError> {
        let mut buf = [0u8; 1];
        io::stdin().read_exact(&mut buf).map_err(io_err)?;
        Ok(buf[0])
    }

    fn oswrch(&mut self, byte: u8) -> Result<(), HostError> {
        let mut out = io::stdout();
        out.write_all(&[byte]).map_err(io_err)?;
        out.flush().map_err(io_err)
    }

    fn osline(&mut self) -> Result<String, HostError> {
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(io_err)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// No raw-mode terminal crate is available to this workspace, so a
    /// single pending key is read with a timeout on a helper thread
    /// instead of true non-blocking polling; `n < 0` (specific-key-held
    /// test) has no real terminal signal behind it and always reports
    /// "not held".
    fn oskey(&mut self, n: i32) -> Result<i32, HostError> {
        if n < 0 {
            return Ok(0);
        }
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 1];
            if io::stdin().read_exact(&mut buf).is_ok() {
                let _ = tx.send(buf[0]);
            }
        });
        match rx.recv_timeout(Duration::from_millis(u64::from(n) * 10)) {
            Ok(byte) => Ok(i32::from(byte)),
            Err(_) => Ok(-1),
        }
    }

    fn oswait(&mut self, cs: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(cs) * 10));
    }

    fn getime(&self) -> i64 {
        self.time_offset + self.start.elapsed().as_millis() as i64 / 10
    }

    fn putime(&mut self, value: i64) {
        self.time_offset = value - self.start.elapsed().as_millis() as i64 / 10;
    }

    fn oscli(&mut self, command: &str) -> Result<(), HostError> {
        self.commands.push(command.to_string());
        Ok(())
    }

    fn oshwm(&mut self, addr: u32) -> u32 {
        addr
    }
}
