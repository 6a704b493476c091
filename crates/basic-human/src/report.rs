//! What a user actually sees for an error: `REPORT$`'s text, and the
//! banner the host prints when nothing traps it (spec §7 last paragraph).

use basic_core::{BasicError, ErrorCode};

/// A formatted error, ready for `REPORT$` or the uncaught-error banner.
#[derive(Clone, Debug)]
pub struct Report {
    pub code: ErrorCode,
    pub message: String,
    pub line: Option<u32>,
    /// The `INSTALL`ed library an error was raised inside, if any. This
    /// workspace doesn't implement `INSTALL`, so every `Report` built here
    /// leaves it `None`; the field exists so a future `INSTALL` only needs
    /// to call [`Self::in_module`], not touch the formatting logic.
    pub module: Option<String>,
}

impl Report {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            code,
            message: message.into(),
            line,
            module: None,
        }
    }

    #[must_use]
    pub fn from_basic_error(e: &BasicError) -> Self {
        Self::new(e.code, e.message.clone(), e.line)
    }

    #[must_use]
    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// What `REPORT$` returns: the message, with the originating module
    /// name appended when one was recorded.
    #[must_use]
    pub fn report_text(&self) -> String {
        match &self.module {
            Some(m) => format!("{} ({m})", self.message),
            None => self.message.clone(),
        }
    }

    /// The line printed when an error propagates uncaught and the
    /// interpreter drops back to the immediate-mode prompt.
    #[must_use]
    pub fn banner(&self) -> String {
        match self.line {
            Some(n) => format!("{} at line {n}", self.report_text()),
            None => self.report_text(),
        }
    }

    /// A negative error code is `QUIT n`'s encoding (spec §7): the
    /// process exit code is `-code` rather than the normal `0` an
    /// ordinary uncaught error leaves the interpreter at.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.code.0 < 0 {
            -self.code.0
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_includes_line_when_present() {
        let r = Report::new(ErrorCode::DIVISION_BY_ZERO, "Division by zero", Some(20));
        assert_eq!(r.banner(), "Division by zero at line 20");
    }

    #[test]
    fn banner_omits_line_when_absent() {
        let r = Report::new(ErrorCode::SYNTAX_ERROR, "Syntax error", None);
        assert_eq!(r.banner(), "Syntax error");
    }

    #[test]
    fn module_name_is_appended_in_report_text() {
        let r = Report::new(ErrorCode::NO_SUCH_VARIABLE, "No such variable", Some(10)).in_module("MATHLIB");
        assert_eq!(r.report_text(), "No such variable (MATHLIB)");
        assert_eq!(r.banner(), "No such variable (MATHLIB) at line 10");
    }

    #[test]
    fn quit_code_is_negated() {
        let r = Report::new(ErrorCode(-2), "Quit", None);
        assert_eq!(r.exit_code(), 2);
    }

    #[test]
    fn ordinary_error_exits_zero() {
        let r = Report::new(ErrorCode::DIVISION_BY_ZERO, "Division by zero", None);
        assert_eq!(r.exit_code(), 0);
    }
}
