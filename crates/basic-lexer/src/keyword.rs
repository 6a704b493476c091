//! The keyword table: maps reserved words to single token bytes.
//!
//! Token byte layout for a tokenized line:
//! - `0x00..=0x1F` (except `0x0D`, the end-of-line marker already used by
//!   the program store) are reserved/unused.
//! - `0x20..=0x7E` is raw ASCII passthrough: identifiers, numeric literals,
//!   string contents, punctuation that isn't a keyword.
//! - `0x80..=0xFE` are keyword tokens (one byte each, at most 127 of them).
//! - `0xFF` is `TLINO`, the marker that introduces an encoded line-number
//!   literal (see [`crate::tlino`]).
//!
//! The spec's own wording is inconsistent about which end of the byte range
//! keywords live in ("a single signed byte" vs. "bytes < 0x20" during
//! LIST). We resolve it in favour of the signed-byte framing: keywords sit
//! at `0x80..=0xFE` so that a reduced keyword set of several dozen entries
//! has headroom, and so a keyword token never collides with a 7-bit ASCII
//! identifier or operator character. See DESIGN.md.

pub const TLINO: u8 = 0xFF;
pub const FIRST_KEYWORD_TOKEN: u8 = 0x80;
pub const LAST_KEYWORD_TOKEN: u8 = 0xFE;

/// One entry in the keyword table.
#[derive(Clone, Copy, Debug)]
pub struct Keyword {
    pub name: &'static str,
    pub token: u8,
    /// Some keywords (pseudo-variables with a statement and an expression
    /// form) tokenize to a different byte when they open a statement.
    pub left_token: Option<u8>,
}

macro_rules! keywords {
    ($($name:literal => $token:expr $(, left = $left:expr)? ;)+) => {
        &[ $( Keyword { name: $name, token: $token, left_token: keywords!(@left $($left)?) } ),+ ]
    };
    (@left) => { None };
    (@left $left:expr) => { Some($left) };
}

/// The full keyword table, ordered by descending name length so a
/// left-to-right scan can do longest-match without a second pass.
///
/// Not every keyword BBC BASIC ever shipped is here — graphics, sound and
/// the assembler are out of scope — but everything the evaluator and
/// executor dispatch on by name is.
#[rustfmt::skip]
pub static KEYWORDS: &[Keyword] = keywords! {
    "OTHERWISE" => 0x80;
    "ENDWHILE"  => 0x81;
    "ENDPROC"   => 0x82;
    "RESTORE"   => 0x83;
    "REPORT$"   => 0x84;
    "INSTALL"   => 0x85;
    "ENDCASE"   => 0x86;
    "LISTO"     => 0x87;
    "RENUMBER"  => 0x88;
    "REPEAT"    => 0x89;
    "RETURN"    => 0x8A;
    "PRIVATE"   => 0x8B;
    "DELETE"    => 0x8C;
    "ENDIF"     => 0x8D;
    "GOSUB"     => 0x8E;
    "LOCAL"     => 0x8F;
    "WHILE"     => 0x90;
    "UNTIL"     => 0x91;
    "INKEY$"    => 0x92;
    "RIGHT$"    => 0x93;
    "MID$"      => 0x94;
    "LEFT$"     => 0x95;
    "ERROR"     => 0x96;
    "WHEN"      => 0x97;
    "TRACE"     => 0x98;
    "CHAIN"     => 0x99;
    "CLEAR"     => 0x9A;
    "GOTO"      => 0x9B;
    "TRUE"      => 0x9C;
    "AUTO"      => 0x9D;
    "EDIT"      => 0x9E;
    "LOAD"      => 0x9F;
    "SAVE"      => 0xA0;
    "OSCLI"     => 0xA1;
    "STOP"      => 0xA2;
    "CASE"      => 0xA3;
    "THEN"      => 0xA4;
    "ELSE"      => 0xA5;
    "EXIT"      => 0xA6;
    "NEXT"      => 0xA7;
    "STEP"      => 0xA8;
    "CHR$"      => 0xA9;
    "STR$"      => 0xAA;
    "ASC"       => 0xAB;
    "VAL"       => 0xAC;
    "LEN"       => 0xAD;
    "SGN"       => 0xAE;
    "ABS"       => 0xAF;
    "SQR"       => 0xB0;
    "SIN"       => 0xB1;
    "COS"       => 0xB2;
    "TAN"       => 0xB3;
    "RAD"       => 0xB4;
    "DEG"       => 0xB5;
    "EXP"       => 0xB6;
    "LOG"       => 0xB7;
    "LN"        => 0xB8;
    "PI"        => 0xB9;
    "RND"       => 0xBA;
    "EOF"       => 0xBB;
    "GET$"      => 0xBC;
    "INKEY"     => 0xBD;
    "FALSE"     => 0xBE;
    "LIST"      => 0xBF;
    "NEW"       => 0xC0;
    "RUN"       => 0xC1;
    "END"       => 0xC2;
    "DEF"       => 0xC3;
    "FOR"       => 0xC4;
    "TO"        => 0xC5;
    "IF"        => 0xC6;
    "OF"        => 0xC7;
    "ON"        => 0xC8;
    "PROC"      => 0xC9;
    "FN"        => 0xCA;
    "DIM"       => 0xCB;
    "READ"      => 0xCC;
    "DATA"      => 0xCD;
    "LET"       => 0xCE;
    "ERR"       => 0xCF;
    "ERL"       => 0xD0;
    "SUM"       => 0xD1;
    "SPC"       => 0xD2;
    "TAB"       => 0xD3;
    "GET"       => 0xD4;
    "BGET"      => 0xD5;
    "BPUT"      => 0xD6;
    "INPUT"     => 0xD7;
    "PRINT"     => 0xD8;
    "REM"       => 0xD9;
    "AND"       => 0xDA;
    "DIV"       => 0xDB;
    "MOD"       => 0xDC;
    "EOR"       => 0xDD;
    "OR"        => 0xDE;
    "NOT"       => 0xDF;
    "OFF"       => 0xE0;
    "TIME$"     => 0xE1;
    "EXT"       => 0xE2, left = 0xE3;
    "PTR"       => 0xE4, left = 0xE5;
    "TIME"      => 0xE6, left = 0xE7;
    "PAGE"      => 0xE8, left = 0xE9;
    "LOMEM"     => 0xEA, left = 0xEB;
    "HIMEM"     => 0xEC, left = 0xED;
    "STRING$"   => 0xEE;
    "INSTR"     => 0xEF;
    "ASN"       => 0xF0;
    "ACS"       => 0xF1;
    "ATN"       => 0xF2;
};

/// Keywords that put the lexer back into "left mode" for the *next* token
/// (i.e. the next token is at the start of a new statement clause).
pub fn enters_left_mode(name: &str) -> bool {
    matches!(name, "THEN" | "ELSE" | "REPEAT" | "GOTO" | "GOSUB")
}

/// The right-form token byte for a keyword, by name (case-insensitive).
/// Used by components that need to recognize a specific keyword's token
/// (e.g. the program store matching `DATA`/`REM`) without re-deriving the
/// table's byte assignment.
#[must_use]
pub fn token_for_keyword(name: &str) -> Option<u8> {
    KEYWORDS
        .iter()
        .find(|k| k.name.eq_ignore_ascii_case(name))
        .map(|k| k.token)
}

/// The exact text a token decodes to, for [`crate::detok`].
#[must_use]
pub fn text_for_token(token: u8) -> Option<&'static str> {
    KEYWORDS
        .iter()
        .find(|k| k.token == token || k.left_token == Some(token))
        .map(|k| k.name)
}

/// Find the longest keyword matching the start of `text` (case-insensitive),
/// provided the character immediately after the match (if any) would not
/// extend an identifier — so `OR` doesn't swallow the first two letters of
/// `ORIGIN`.
#[must_use]
pub fn longest_match(text: &[u8]) -> Option<(&'static Keyword, usize)> {
    let mut best: Option<(&'static Keyword, usize)> = None;
    for kw in KEYWORDS {
        let name = kw.name.as_bytes();
        if text.len() < name.len() {
            continue;
        }
        if !text[..name.len()].eq_ignore_ascii_case(name) {
            continue;
        }
        let boundary_ok = match text.get(name.len()) {
            Some(&c) => !(c.is_ascii_alphanumeric() || c == b'_'),
            None => true,
        };
        if !boundary_ok {
            continue;
        }
        if best.is_none_or(|(_, len)| name.len() > len) {
            best = Some((kw, name.len()));
        }
    }
    best
}
