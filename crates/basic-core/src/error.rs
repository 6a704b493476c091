use core::fmt;

/// A BASIC error number, as reported by `ERR` and used to drive `ON ERROR`.
///
/// The canonical table (spec §7) only lists "selected kinds" — the original
/// interpreter assigns many more. We follow the listed codes exactly and
/// allocate values in the unused 100..200 range for the structural errors
/// the control stack unwinder raises (`NOT_IN_SUBROUTINE` and friends),
/// which §7's table doesn't name; see DESIGN.md for that allocation choice.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    pub const NO_ROOM: Self = Self(0);
    pub const JUMP_OUT_OF_RANGE: Self = Self(1);
    pub const TYPE_MISMATCH: Self = Self(6);
    pub const BAD_USE_OF_ARRAY: Self = Self(14);
    pub const ESCAPE: Self = Self(17);
    pub const DIVISION_BY_ZERO: Self = Self(18);
    pub const STRING_TOO_LONG: Self = Self(19);
    pub const NUMBER_TOO_BIG: Self = Self(20);
    pub const NEGATIVE_ROOT: Self = Self(21);
    pub const LOGARITHM_RANGE: Self = Self(22);
    pub const EXPONENT_RANGE: Self = Self(24);
    pub const NO_SUCH_VARIABLE: Self = Self(26);
    pub const NO_SUCH_FN_PROC: Self = Self(29);
    pub const INCORRECT_ARGUMENTS: Self = Self(31);
    pub const NO_SUCH_LINE: Self = Self(41);
    pub const OUT_OF_DATA: Self = Self(42);
    pub const USER_ERROR: Self = Self(255);

    // Structural control-flow errors (§4.H unwinders), numbered outside the
    // canonical table per the note above.
    pub const NOT_IN_SUBROUTINE: Self = Self(100);
    pub const NOT_IN_A_FOR_LOOP: Self = Self(101);
    pub const CANT_MATCH_FOR: Self = Self(102);
    pub const NOT_IN_A_LOOP: Self = Self(103);
    pub const ON_RANGE: Self = Self(104);
    pub const BAD_DIM: Self = Self(105);
    pub const NO_SUCH_STRUCT_FIELD: Self = Self(106);
    pub const BAD_PROGRAM: Self = Self(107);
    pub const SYNTAX_ERROR: Self = Self(108);
    pub const NO_SUCH_CHANNEL: Self = Self(109);
    pub const FILE_ERROR: Self = Self(110);

    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self.0 {
            0 => "No room",
            1 => "Jump out of range",
            6 => "Type mismatch",
            14 => "Bad use of array",
            17 => "Escape",
            18 => "Division by zero",
            19 => "String too long",
            20 => "Number too big",
            21 => "Negative root",
            22 => "Logarithm range",
            24 => "Exponent range",
            26 => "No such variable",
            29 => "No such FN/PROC",
            31 => "Incorrect arguments",
            41 => "No such line",
            42 => "Out of DATA",
            100 => "Not in a subroutine",
            101 => "Not in a FOR loop",
            102 => "Can't match FOR",
            103 => "Not in a loop",
            104 => "ON range",
            105 => "Bad DIM",
            106 => "No such field",
            107 => "Bad program",
            108 => "Syntax error",
            109 => "No such channel",
            110 => "File error",
            _ => "User error",
        }
    }
}

/// An error raised during tokenization, evaluation or execution.
///
/// `line` is filled in by the statement executor (the one component that
/// knows which program line is current); lower layers may leave it `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicError {
    pub code: ErrorCode,
    pub message: String,
    pub line: Option<u32>,
}

impl BasicError {
    #[must_use]
    pub fn new(code: ErrorCode) -> Self {
        Self {
            message: code.default_message().to_string(),
            code,
            line: None,
        }
    }

    #[must_use]
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
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

impl fmt::Display for BasicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(line) = self.line {
            write!(f, " at line {line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BasicError {}
