//! Escape decoding for code that went through a string-quoting layer.
//!
//! Decoding happens in two steps. [`decode_unicode`] resolves `\uXXXX` and
//! `\UXXXXXXXX` sequences and fails on a malformed one, in which case the
//! caller keeps the line as it was. [`decode_common`] then turns `\n`, `\t`
//! and `\"` into the characters they stand for and never fails.
//!
//! A `\\` pair is an escaped backslash and the character after it is never
//! treated as escaped. [`decode_unicode`] copies pairs through untouched.
//! [`decode_common`] collapses them to one backslash, but only on a line that
//! shows it went through a quoting layer (see [`has_layer_escapes`]); on any
//! other line the pair is part of the program and is kept.
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EscapeError {
    #[error("truncated \\{kind} escape at offset {offset}")]
    Truncated { kind: char, offset: usize },

    #[error("invalid code point U+{0:X}")]
    InvalidCodePoint(u32),

    #[error("unpaired surrogate U+{0:X}")]
    UnpairedSurrogate(u32),
}

/// Whether `line` holds a `\n`, `\t` or `\"` escape outside a `\\` pair.
pub fn has_layer_escapes(line: &str) -> bool {
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.next(), Some('n' | 't' | '"')) {
            return true;
        }
    }
    false
}

/// Decode `\n`, `\t` and `\"`, and `\\` on escaped lines. Any other
/// backslash sequence is copied as is.
pub fn decode_common(line: &str) -> String {
    let collapse_pairs = has_layer_escapes(line);
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('t') => {
                chars.next();
                out.push('\t');
            }
            Some('"') => {
                chars.next();
                out.push('"');
            }
            Some('\\') => {
                chars.next();
                if collapse_pairs {
                    out.push('\\');
                } else {
                    out.push_str("\\\\");
                }
            }
            _ => out.push('\\'),
        }
    }

    out
}

/// Decode `\uXXXX` (surrogate pairs included) and `\UXXXXXXXX` sequences.
pub fn decode_unicode(text: &str) -> Result<String, EscapeError> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            out.push(c);
            i += 1;
            continue;
        }

        match chars[i + 1] {
            '\\' => {
                out.push_str("\\\\");
                i += 2;
            }
            'u' => {
                let unit = read_hex(&chars, i + 2, 4).ok_or(EscapeError::Truncated {
                    kind: 'u',
                    offset: i,
                })?;
                i += 6;

                let code = if (0xD800..0xDC00).contains(&unit) {
                    // High surrogate: a `\uDC00`..`\uDFFF` must follow.
                    let low = (chars.get(i) == Some(&'\\') && chars.get(i + 1) == Some(&'u'))
                        .then(|| read_hex(&chars, i + 2, 4))
                        .flatten()
                        .filter(|low| (0xDC00..0xE000).contains(low))
                        .ok_or(EscapeError::UnpairedSurrogate(unit))?;
                    i += 6;
                    0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    unit
                };

                out.push(to_char(code)?);
            }
            'U' => {
                let code = read_hex(&chars, i + 2, 8).ok_or(EscapeError::Truncated {
                    kind: 'U',
                    offset: i,
                })?;
                i += 10;
                out.push(to_char(code)?);
            }
            _ => {
                out.push('\\');
                i += 1;
            }
        }
    }

    Ok(out)
}

fn read_hex(chars: &[char], start: usize, len: usize) -> Option<u32> {
    let digits = chars.get(start..start + len)?;
    digits
        .iter()
        .try_fold(0u32, |acc, d| d.to_digit(16).map(|v| (acc << 4) | v))
}

fn to_char(code: u32) -> Result<char, EscapeError> {
    if (0xD800..0xE000).contains(&code) {
        return Err(EscapeError::UnpairedSurrogate(code));
    }
    char::from_u32(code).ok_or(EscapeError::InvalidCodePoint(code))
}
