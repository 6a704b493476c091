//! The executor's error type: every lower-layer error (value/arithmetic,
//! host I/O) composes into one `ExecError` that always carries a numeric
//! code, since that's what `ON ERROR`/`ERR`/`REPORT$` need regardless of
//! where the failure originated.

use core::fmt;

use basic_core::{BasicError, ErrorCode};
use basic_host::HostError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecError {
    pub code: ErrorCode,
    pub message: String,
    pub line: Option<u32>,
}

impl ExecError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            line: None,
        }
    }

    #[must_use]
    pub const fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecError {}

impl From<BasicError> for ExecError {
    fn from(e: BasicError) -> Self {
        Self {
            code: e.code,
            message: e.message,
            line: e.line,
        }
    }
}

impl From<HostError> for ExecError {
    fn from(e: HostError) -> Self {
        let code = match &e {
            HostError::NoSuchChannel => ErrorCode::NO_SUCH_CHANNEL,
            HostError::ChannelsExhausted | HostError::NotFound(_) | HostError::Io(_) => ErrorCode::FILE_ERROR,
        };
        Self::new(code, e.to_string())
    }
}
