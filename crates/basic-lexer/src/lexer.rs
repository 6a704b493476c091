//! Tokenizer: turns one line of BASIC source text into the compact token
//! stream the program store persists.
//!
//! Only reserved words become single-byte tokens. Everything else —
//! identifiers, numeric literals, string contents, punctuation — passes
//! through as its original ASCII bytes, exactly as the keyword table's
//! comment promises. The scanner tracks a small mode automaton (string
//! literal / raw-to-end-of-line / hex-or-binary literal / statement-start)
//! rather than a general grammar, since tokenization doesn't need to
//! understand expression structure, only where keywords may start.

use crate::keyword::{self, Keyword};
use crate::tlino;
use basic_core::BasicError;

/// Keywords after which a following line-number literal is encoded via
/// `TLINO` rather than left as raw decimal digits.
fn expects_line_number(name: &str) -> bool {
    matches!(
        name,
        "GOTO" | "GOSUB" | "THEN" | "ELSE" | "RESTORE" | "TRACE"
    )
}

/// Keywords after which the rest of the line is copied verbatim (comments
/// and inline data, not further code).
fn is_raw_to_eol(name: &str) -> bool {
    matches!(name, "REM" | "DATA")
}

pub fn tokenize(src: &str) -> Result<Vec<u8>, BasicError> {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    let mut at_stmt_start = true;
    let mut expect_line_number = false;

    if bytes.first() == Some(&b'*') {
        // Star command: passed through to the host OS command interpreter
        // untouched (spec §6.1 oscli); never tokenized.
        out.extend_from_slice(bytes);
        return Ok(out);
    }

    while i < bytes.len() {
        let c = bytes[i];

        if c == b'"' {
            out.push(c);
            i += 1;
            while i < bytes.len() {
                out.push(bytes[i]);
                if bytes[i] == b'"' {
                    i += 1;
                    // A doubled quote is an escaped literal quote; keep
                    // scanning the same string.
                    if bytes.get(i) == Some(&b'"') {
                        out.push(bytes[i]);
                        i += 1;
                        continue;
                    }
                    break;
                }
                i += 1;
            }
            at_stmt_start = false;
            expect_line_number = false;
            continue;
        }

        if c == b'&' {
            out.push(c);
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
                out.push(bytes[i]);
                i += 1;
            }
            at_stmt_start = false;
            continue;
        }

        if c == b'%' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            out.push(c);
            i += 1;
            while i < bytes.len() && (bytes[i] == b'0' || bytes[i] == b'1') {
                out.push(bytes[i]);
                i += 1;
            }
            at_stmt_start = false;
            continue;
        }

        if expect_line_number && c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let text = std::str::from_utf8(&bytes[start..i]).unwrap_or_default();
            let line: u16 = text
                .parse()
                .map_err(|_| BasicError::with_message(basic_core::ErrorCode::NO_SUCH_LINE, "line number out of range"))?;
            out.push(keyword::TLINO);
            out.extend_from_slice(&tlino::encode(line));
            expect_line_number = false;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'@' {
            if let Some((kw, len)) = keyword::longest_match(&bytes[i..]) {
                emit_keyword(&mut out, kw, at_stmt_start);
                at_stmt_start = keyword::enters_left_mode(kw.name);
                expect_line_number = expects_line_number(kw.name);
                i += len;
                if is_raw_to_eol(kw.name) {
                    out.extend_from_slice(&bytes[i..]);
                    i = bytes.len();
                }
                continue;
            }
        }

        if c == b':' {
            out.push(c);
            i += 1;
            at_stmt_start = true;
            expect_line_number = false;
            continue;
        }

        if !c.is_ascii_whitespace() {
            at_stmt_start = false;
        }
        out.push(c);
        i += 1;
    }

    Ok(out)
}

fn emit_keyword(out: &mut Vec<u8>, kw: &Keyword, at_stmt_start: bool) {
    let token = match (at_stmt_start, kw.left_token) {
        (true, Some(left)) => left,
        _ => kw.token,
    };
    out.push(token);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_identifiers_and_numbers_through_raw() {
        let tokens = tokenize("total% = 12 + count%").unwrap();
        assert_eq!(tokens, b"total% = 12 + count%".to_vec());
    }

    #[test]
    fn tokenizes_a_keyword_to_a_single_byte() {
        let tokens = tokenize("PRINT 42").unwrap();
        assert_eq!(tokens[0], 0xD8); // PRINT
        assert_eq!(&tokens[1..], b" 42");
    }

    #[test]
    fn does_not_swallow_identifier_with_keyword_prefix() {
        let tokens = tokenize("ORIGIN = 1").unwrap();
        // "OR" must not match the start of "ORIGIN".
        assert_eq!(&tokens[..6], b"ORIGIN");
    }

    #[test]
    fn goto_line_number_is_tlino_encoded() {
        let tokens = tokenize("GOTO 100").unwrap();
        assert_eq!(tokens[0], 0x9B); // GOTO
        assert_eq!(tokens[1], b' ');
        assert_eq!(tokens[2], keyword::TLINO);
        assert_eq!(tlino::decode([tokens[3], tokens[4], tokens[5]]), Some(100));
    }

    #[test]
    fn rem_passes_the_rest_of_the_line_raw_even_if_it_looks_like_a_keyword() {
        let tokens = tokenize("REM PRINT this is not code").unwrap();
        assert_eq!(tokens[0], 0xD9); // REM
        assert_eq!(&tokens[1..], b" PRINT this is not code");
    }

    #[test]
    fn data_statement_keeps_commas_and_strings_literal() {
        let tokens = tokenize("DATA 1, \"two, three\", 4").unwrap();
        assert_eq!(tokens[0], 0xCD); // DATA
        assert_eq!(&tokens[1..], b" 1, \"two, three\", 4");
    }

    #[test]
    fn string_literal_is_not_scanned_for_keywords() {
        let tokens = tokenize("PRINT \"GOTO is not a keyword here\"").unwrap();
        assert_eq!(tokens[0], 0xD8);
        let rest = &tokens[1..];
        assert_eq!(rest, b" \"GOTO is not a keyword here\"");
    }

    #[test]
    fn ptr_biases_to_left_form_at_statement_start() {
        let stmt = tokenize("PTR#1=100").unwrap();
        assert_eq!(stmt[0], 0xE5); // PTR left form
        let expr = tokenize("x=PTR#1").unwrap();
        let ptr_pos = expr.iter().position(|&b| b == 0xE4 || b == 0xE5).unwrap();
        assert_eq!(expr[ptr_pos], 0xE4); // PTR right form, mid-expression
    }

    #[test]
    fn hex_literal_digits_are_not_mistaken_for_keywords() {
        let tokens = tokenize("x%=&FACE").unwrap();
        assert_eq!(&tokens[3..], b"&FACE");
    }
}
