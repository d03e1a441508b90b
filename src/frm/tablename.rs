//! MySQL filename <-> table name conversion.
//!
//! The server stores table files under encoded names: ASCII identifier
//! characters map to themselves and every other UTF-16 code unit becomes
//! a 5-byte `@xxxx` escape (lowercase hex), e.g. `t-1` -> `t@002d1` and
//! `демо` -> `@0434@0435@043c@043e`. Encoding and decoding are exact
//! inverses over every valid identifier.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TablenameError {
    #[error("malformed '@' escape at byte {pos} in '{name}'")]
    BadEscape { name: String, pos: usize },
    #[error("escape sequence decodes to an unpaired surrogate in '{name}'")]
    BadSurrogate { name: String },
}

fn is_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Encode a table (or database) name into its on-disk file name.
pub fn encode(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if is_safe(c) {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push('@');
                out.push_str(&format!("{unit:04x}"));
            }
        }
    }
    out
}

/// Decode an on-disk file name back into the table name.
///
/// Characters outside any `@` escape pass through unchanged (the server
/// emits raw `#` in temporary and partition names); a malformed escape
/// is an error.
pub fn decode(name: &str) -> Result<String, TablenameError> {
    let bytes = name.as_bytes();
    let mut units: Vec<u16> = Vec::with_capacity(name.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'@' {
            if i + 5 > bytes.len() {
                return Err(TablenameError::BadEscape {
                    name: name.to_string(),
                    pos: i,
                });
            }
            let hex = &name[i + 1..i + 5];
            let ok = hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
            let unit = if ok { u16::from_str_radix(hex, 16).ok() } else { None };
            match unit {
                Some(unit) => units.push(unit),
                None => {
                    return Err(TablenameError::BadEscape {
                        name: name.to_string(),
                        pos: i,
                    });
                }
            }
            i += 5;
        } else {
            // pass the full UTF-8 character through
            let c = name[i..].chars().next().expect("offset on a char boundary");
            let mut buf = [0u16; 2];
            units.extend_from_slice(c.encode_utf16(&mut buf));
            i += c.len_utf8();
        }
    }
    String::from_utf16(&units).map_err(|_| TablenameError::BadSurrogate {
        name: name.to_string(),
    })
}
