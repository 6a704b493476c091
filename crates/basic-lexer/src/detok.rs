//! LIST de-tokenizer: the inverse of [`crate::lexer::tokenize`].

use crate::keyword::{self, TLINO};
use crate::tlino;

/// Render one line's token stream back to source text.
///
/// `indent` is the running indentation level across a whole program
/// listing; it is read and updated in place so callers can thread it
/// across consecutive calls (one per stored line).
#[must_use]
pub fn list_line(indent: &mut u32, tokens: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0usize;

    if let Some(&first) = tokens.first() {
        if is_closer(first) {
            *indent = indent.saturating_sub(1);
        }
    }

    for _ in 0..2 * *indent {
        out.push(' ');
    }

    while i < tokens.len() {
        let b = tokens[i];
        match b {
            TLINO => {
                if i + 3 < tokens.len() {
                    if let Some(line) = tlino::decode([tokens[i + 1], tokens[i + 2], tokens[i + 3]]) {
                        out.push_str(&line.to_string());
                    }
                    i += 4;
                } else {
                    i += 1;
                }
            }
            keyword::FIRST_KEYWORD_TOKEN..=keyword::LAST_KEYWORD_TOKEN => {
                if let Some(text) = keyword::text_for_token(b) {
                    out.push_str(text);
                }
                if is_opener(b) {
                    *indent += 1;
                }
                i += 1;
            }
            _ => {
                out.push(b as char);
                i += 1;
            }
        }
    }

    out
}

fn is_opener(token: u8) -> bool {
    matches!(token, 0xC4 | 0x89 | 0x90 | 0xA3 | 0x97 | 0x80 | 0xC3) // FOR REPEAT WHILE CASE WHEN OTHERWISE DEF
}

fn is_closer(token: u8) -> bool {
    matches!(
        token,
        0xA7 | 0x91 | 0x81 | 0x8D | 0x86 | 0x82 | 0x97 | 0x80 // NEXT UNTIL ENDWHILE ENDIF ENDCASE ENDPROC WHEN OTHERWISE
    )
}

/// Render a token stream with no indentation tracking (used where a caller
/// only wants the text of one statement, e.g. error reporting).
#[must_use]
pub fn detokenize(tokens: &[u8]) -> String {
    let mut indent = 0;
    list_line(&mut indent, tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    #[test]
    fn round_trips_a_plain_statement() {
        let tokens = tokenize("PRINT 42").unwrap();
        assert_eq!(detokenize(&tokens), "PRINT 42");
    }

    #[test]
    fn round_trips_a_goto_line_number() {
        let tokens = tokenize("GOTO 100").unwrap();
        assert_eq!(detokenize(&tokens), "GOTO 100");
    }

    #[test]
    fn indents_a_for_loop_body() {
        let mut indent = 0;
        let header = list_line(&mut indent, &tokenize("FOR i%=1 TO 10").unwrap());
        let body = list_line(&mut indent, &tokenize("PRINT i%").unwrap());
        let footer = list_line(&mut indent, &tokenize("NEXT").unwrap());
        assert_eq!(header, "FOR i%=1 TO 10");
        assert_eq!(body, "  PRINT i%");
        assert_eq!(footer, "NEXT");
    }

    proptest::proptest! {
        /// Tokenizing a `PRINT <n>` line and listing it back recovers the
        /// same text for any integer literal, independent of its width.
        #[test]
        fn print_statement_round_trips(n: i32) {
            let src = format!("PRINT {n}");
            let tokens = tokenize(&src).unwrap();
            proptest::prop_assert_eq!(detokenize(&tokens), src);
        }

        /// A bare line number target round-trips through the packed
        /// `TLINO` encoding the same way for any in-range line number.
        #[test]
        fn goto_line_number_round_trips(line in 0u16..=0x7FFF) {
            let src = format!("GOTO {line}");
            let tokens = tokenize(&src).unwrap();
            proptest::prop_assert_eq!(detokenize(&tokens), src);
        }
    }
}
