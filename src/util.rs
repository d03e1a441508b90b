use std::io::{self, Read};

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Translate an fnmatch-style glob (`*`, `?`, `[...]`) into an anchored
/// regular expression matching the whole name.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, FilterError> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push_str("^(?s)");
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                // scan for the closing bracket; a ']' directly after the
                // opening (or after '!') is a literal member
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    // unterminated class matches a literal '['
                    out.push_str("\\[");
                } else {
                    let inner: String = chars[i..j].iter().collect();
                    out.push('[');
                    if let Some(rest) = inner.strip_prefix('!') {
                        out.push('^');
                        out.push_str(&rest.replace('\\', "\\\\"));
                    } else {
                        out.push_str(&inner.replace('\\', "\\\\"));
                    }
                    out.push(']');
                    i = j + 1;
                }
            }
            _ => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|source| FilterError::BadPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Inclusion/exclusion filter over qualified names.
///
/// An inclusion list acts as a whitelist (empty allows everything); the
/// first matching exclusion wins over any inclusion.
#[derive(Debug, Default)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl NameFilter {
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<NameFilter, FilterError> {
        let compile = |patterns: &[S]| -> Result<Vec<Regex>, FilterError> {
            patterns.iter().map(|p| glob_to_regex(p.as_ref())).collect()
        };
        Ok(NameFilter {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Whether `name` is filtered out.
    pub fn excluded(&self, name: &str) -> bool {
        if self.exclude.iter().any(|p| p.is_match(name)) {
            return true;
        }
        if !self.include.is_empty() {
            return !self.include.iter().any(|p| p.is_match(name));
        }
        false
    }
}

/// Split a command line the way a POSIX shell tokenizes it: whitespace
/// separated words, single/double quotes, backslash escapes outside
/// single quotes.
pub fn shell_split(cmdline: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut chars = cmdline.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(other) => current.push(other),
                        None => return None,
                    }
                }
            }
            '"' => {
                in_word = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(esc @ ('"' | '\\' | '$' | '`')) => current.push(esc),
                            Some(other) => {
                                current.push('\\');
                                current.push(other);
                            }
                            None => return None,
                        },
                        Some(other) => current.push(other),
                        None => return None,
                    }
                }
            }
            '\\' => {
                in_word = true;
                match chars.next() {
                    Some(esc) => current.push(esc),
                    None => return None,
                }
            }
            c if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            other => {
                in_word = true;
                current.push(other);
            }
        }
    }
    if in_word {
        words.push(current);
    }
    Some(words)
}

/// Quote a string for safe interpolation into a shell command line.
pub fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./=:,+%@".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Normalize an archive member path: collapse `.` and empty components,
/// resolve `..` without escaping the root, strip any leading slashes.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for comp in path.split('/') {
        match comp {
            "" | "." => continue,
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// A reader that buffers its first bytes so they can be inspected
/// before deciding how to consume the stream.
pub struct PeekReader<R> {
    inner: R,
    buffer: Vec<u8>,
    pos: usize,
}

impl<R: Read> PeekReader<R> {
    /// Read up to `n` bytes ahead (fewer only at end of stream).
    pub fn new(mut inner: R, n: usize) -> io::Result<PeekReader<R>> {
        let mut buffer = vec![0u8; n];
        let mut filled = 0;
        while filled < n {
            let read = inner.read(&mut buffer[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }
        buffer.truncate(filled);
        Ok(PeekReader {
            inner,
            buffer,
            pos: 0,
        })
    }

    /// The buffered prefix of the stream.
    pub fn peeked(&self) -> &[u8] {
        &self.buffer[self.pos..]
    }

    /// Tear down into the unconsumed prefix and the inner reader.
    pub fn into_parts(self) -> (Vec<u8>, R) {
        (self.buffer[self.pos..].to_vec(), self.inner)
    }
}

impl<R: Read> Read for PeekReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buffer.len() {
            let n = (self.buffer.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.buffer[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

/// `(parent, basename)` split of a normalized path.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(idx) => (&path[..idx], &path[idx + 1..]),
        None => ("", path),
    }
}

/// Strip the last `.ext` off a file name, if any.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}
