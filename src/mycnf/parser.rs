//! my.cnf option-file parsing.
//!
//! Follows the server's own rules: `[section]` scoping, inline `#`
//! comments outside quotes, `key = value` pairs, obsolete
//! `set-variable =` syntax, option prefix resolution, and
//! `!include` / `!includedir` directives.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::mycnf::MycnfError;

/// Options the server accepts by unambiguous prefix.
const KNOWN_OPTIONS: &[&str] = &["host", "password", "port", "socket", "user"];

static SET_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(set[-_]variable\s*=\s*)(.*)$").expect("valid regex"));

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([^=\s]+?)\s*(?:=\s*(.*))?$").expect("valid regex"));

/// One occurrence of an option inside a file.
#[derive(Debug, Clone)]
pub struct Occurrence {
    /// Index into the file's line list.
    pub index: usize,
    pub value: Option<String>,
    /// The parsed (possibly sanitized) line, right-trimmed.
    pub line: String,
}

#[derive(Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    /// Original lines without terminators.
    pub lines: Vec<String>,
    /// Normalized option name to its occurrences, `[mysqld]` only.
    pub options: BTreeMap<String, Vec<Occurrence>>,
}

/// Strip a MySQL inline comment, honoring quotes and escapes.
/// Returns (option text, comment text).
pub(crate) fn remove_inline_comment(value: &str) -> (String, String) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (idx, c) in value.char_indices() {
        if (c == '"' || c == '\'') && !escaped {
            match quote {
                None => quote = Some(c),
                Some(open) if open == c => quote = None,
                Some(_) => {}
            }
        }
        if quote.is_none() && c == '#' {
            return (value[..idx].to_string(), value[idx..].to_string());
        }
        escaped = quote.is_some() && c == '\\' && !escaped;
    }
    (value.to_string(), String::new())
}

/// Expand an option prefix to its full name, mimicking the server's
/// ambiguity error.
pub(crate) fn resolve_option(item: &str, path: &Path, line_no: usize) -> Result<String, MycnfError> {
    let candidates: Vec<&str> = KNOWN_OPTIONS
        .iter()
        .copied()
        .filter(|known| known.starts_with(item))
        .collect();
    match candidates.len() {
        0 => Ok(item.to_string()),
        1 => Ok(candidates[0].to_string()),
        _ => Err(MycnfError::AmbiguousOption {
            option: item.to_string(),
            candidates: candidates.join(","),
            path: path.to_path_buf(),
            line_no,
        }),
    }
}

/// Rewrite obsolete `set-variable = key=value` syntax in place.
fn sanitize(line: &str, path: &Path, line_no: usize) -> String {
    if let Some(caps) = SET_VARIABLE.captures(line) {
        let value = caps[2].to_string();
        info!(
            "rewrote obsolete syntax {:?} to {:?} at {}:{}",
            line.trim_end(),
            value.trim_end(),
            path.display(),
            line_no,
        );
        return value;
    }
    line.to_string()
}

/// Split a directive into (key, value), stripping inline comments.
pub(crate) fn parse_option(
    line: &str,
    path: &Path,
    line_no: usize,
) -> Result<Option<(String, Option<String>)>, MycnfError> {
    let Some(caps) = KEY_VALUE.captures(line) else {
        return Ok(None);
    };
    let mut key = caps[1].to_string();
    let value = match caps.get(2) {
        Some(value) if !value.as_str().is_empty() => {
            let (value, _comment) = remove_inline_comment(value.as_str());
            Some(value.trim().to_string())
        }
        _ => {
            let (bare, _comment) = remove_inline_comment(&key);
            key = bare.trim().to_string();
            None
        }
    };
    if key.is_empty() {
        return Ok(None);
    }
    let key = resolve_option(&key, path, line_no)?;
    Ok(Some((key, value)))
}

fn included_files(directive: &str, base: &Path) -> Vec<PathBuf> {
    let resolve = |raw: &str| {
        let path = PathBuf::from(raw);
        if path.is_relative() {
            base.parent().map_or(path.clone(), |dir| dir.join(&path))
        } else {
            path
        }
    };
    if let Some(raw) = directive.strip_prefix("!include ") {
        return vec![resolve(raw.trim())];
    }
    if let Some(raw) = directive.strip_prefix("!includedir ") {
        let dir = resolve(raw.trim());
        let mut found: Vec<PathBuf> = std::fs::read_dir(&dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("cnf"))
                    .collect()
            })
            .unwrap_or_default();
        found.sort();
        return found;
    }
    Vec::new()
}

/// Parse `path` and everything it includes, in include order.
pub fn parse(path: &Path) -> Result<Vec<ParsedFile>, MycnfError> {
    let mut queue: Vec<PathBuf> = vec![path.to_path_buf()];
    let mut parsed = Vec::new();

    while !queue.is_empty() {
        let current = queue.remove(0);
        let contents = std::fs::read_to_string(&current).map_err(|source| MycnfError::Read {
            path: current.clone(),
            source,
        })?;

        let mut section: Option<String> = None;
        let mut lines = Vec::new();
        let mut options: BTreeMap<String, Vec<Occurrence>> = BTreeMap::new();

        for (idx, raw_line) in contents.lines().enumerate() {
            lines.push(raw_line.to_string());
            let line_no = idx + 1;
            let line = sanitize(raw_line, &current, line_no);
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                section = Some(rest.trim_end_matches(']').to_string());
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if line.starts_with('!') {
                queue.extend(included_files(line, &current));
                continue;
            }
            if section.as_deref() != Some("mysqld") {
                debug!(
                    "ignoring [{}] option {:?} at {}:{}",
                    section.as_deref().unwrap_or(""),
                    line,
                    current.display(),
                    line_no,
                );
                continue;
            }
            let Some((key, value)) = parse_option(line, &current, line_no)? else {
                continue;
            };
            let key = key.replace('_', "-");
            options.entry(key).or_default().push(Occurrence {
                index: idx,
                value,
                line: line.to_string(),
            });
        }

        parsed.push(ParsedFile {
            path: current,
            lines,
            options,
        });
    }
    Ok(parsed)
}
