//! Option-file upgrading: parse, rewrite by rule table, and emit the
//! new file or a unified diff.

pub mod parser;
pub mod rules;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

pub use rules::MySQLTarget;

#[derive(Debug, Error)]
pub enum MycnfError {
    #[error("no config file found: {}", .path.display())]
    MissingConfig { path: PathBuf },
    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line_no}: ambiguous option '{option}' ({candidates})", .path.display())]
    AmbiguousOption {
        option: String,
        candidates: String,
        path: PathBuf,
        line_no: usize,
    },
}

/// Apply the rewrite rules for one parsed file; returns the new lines.
fn rewrite_file(file: &parser::ParsedFile, rules: &HashMap<&str, rules::Rule>) -> Vec<String> {
    let mut pending: HashMap<usize, Vec<String>> = HashMap::new();

    for (key, occurrences) in &file.options {
        if occurrences.len() > 1
            && key != "set-variable"
            && !rules::MULTI_VALUED_OPTIONS.contains(&key.as_str())
        {
            warn!("duplicate options for '{key}'");
            for occurrence in occurrences {
                warn!(
                    "  - {}:{}",
                    occurrence.index + 1,
                    file.lines[occurrence.index].trim_end()
                );
            }
        }

        for occurrence in occurrences {
            match rules.get(key.as_str()) {
                Some(rule) => {
                    pending.insert(
                        occurrence.index,
                        rule.rewrite(key, occurrence.value.as_deref()),
                    );
                }
                None => {
                    debug!("no rule to rewrite '{key}'");
                    // set-variable lines are rewritten even without a rule
                    if occurrence.line != file.lines[occurrence.index] {
                        pending.insert(occurrence.index, vec![occurrence.line.clone()]);
                    }
                }
            }
        }
    }

    let mut result = Vec::with_capacity(file.lines.len());
    for (idx, line) in file.lines.iter().enumerate() {
        match pending.get(&idx) {
            Some(replacements) => {
                debug!("rewriting {}:{}", idx + 1, line.trim_end());
                result.extend(replacements.iter().cloned());
            }
            None => result.push(line.clone()),
        }
    }
    result
}

/// Upgrade a my.cnf for `target`. Returns the rewritten file, or a
/// unified diff across all parsed files when `patch` is set.
pub fn upgrade(config: &Path, target: MySQLTarget, patch: bool) -> Result<String, MycnfError> {
    if !config.exists() {
        return Err(MycnfError::MissingConfig {
            path: config.to_path_buf(),
        });
    }
    let rules = rules::rules_for(target);
    let files = parser::parse(config)?;

    if patch {
        let mut out = String::new();
        for file in &files {
            let modified = rewrite_file(file, &rules);
            let pretty = file.path.to_string_lossy();
            let pretty = pretty.trim_start_matches('/');
            out.push_str(&unified_diff(
                &file.lines,
                &modified,
                &format!("a/{pretty}"),
                &format!("b/{pretty}"),
            ));
        }
        Ok(out)
    } else {
        // the root file rewritten in full
        let file = files.first().expect("parse yields at least the root file");
        let modified = rewrite_file(file, &rules);
        let mut out = modified.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Op {
    Equal(usize, usize),
    Delete(usize),
    Insert(usize),
}

/// Minimal line-based unified diff with three lines of context.
pub fn unified_diff(a: &[String], b: &[String], from_file: &str, to_file: &str) -> String {
    let ops = diff_ops(a, b);
    if !ops
        .iter()
        .any(|op| matches!(op, Op::Delete(_) | Op::Insert(_)))
    {
        return String::new();
    }

    const CONTEXT: usize = 3;
    // mark ops within CONTEXT of a change
    let changed: Vec<bool> = ops
        .iter()
        .map(|op| matches!(op, Op::Delete(_) | Op::Insert(_)))
        .collect();
    let mut keep = vec![false; ops.len()];
    for (idx, &is_change) in changed.iter().enumerate() {
        if is_change {
            let lo = idx.saturating_sub(CONTEXT);
            let hi = (idx + CONTEXT + 1).min(ops.len());
            for slot in keep.iter_mut().take(hi).skip(lo) {
                *slot = true;
            }
        }
    }

    let mut out = format!("--- {from_file}\n+++ {to_file}\n");
    let mut idx = 0;
    while idx < ops.len() {
        if !keep[idx] {
            idx += 1;
            continue;
        }
        let start = idx;
        while idx < ops.len() && keep[idx] {
            idx += 1;
        }
        let hunk = &ops[start..idx];
        let a_start = hunk
            .iter()
            .find_map(|op| match op {
                Op::Equal(i, _) | Op::Delete(i) => Some(*i),
                Op::Insert(_) => None,
            })
            .unwrap_or(0);
        let b_start = hunk
            .iter()
            .find_map(|op| match op {
                Op::Equal(_, j) | Op::Insert(j) => Some(*j),
                Op::Delete(_) => None,
            })
            .unwrap_or(0);
        let a_count = hunk
            .iter()
            .filter(|op| matches!(op, Op::Equal(..) | Op::Delete(_)))
            .count();
        let b_count = hunk
            .iter()
            .filter(|op| matches!(op, Op::Equal(..) | Op::Insert(_)))
            .count();
        out.push_str(&format!(
            "@@ -{},{a_count} +{},{b_count} @@\n",
            a_start + 1,
            b_start + 1
        ));
        for op in hunk {
            match op {
                Op::Equal(i, _) => out.push_str(&format!(" {}\n", a[*i])),
                Op::Delete(i) => out.push_str(&format!("-{}\n", a[*i])),
                Op::Insert(j) => out.push_str(&format!("+{}\n", b[*j])),
            }
        }
    }
    out
}

/// Edit script via a longest-common-subsequence table; option files
/// are small enough for the quadratic table.
fn diff_ops(a: &[String], b: &[String]) -> Vec<Op> {
    let n = a.len();
    let m = b.len();
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if a[i] == b[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }
    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            ops.push(Op::Equal(i, j));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(Op::Delete(i));
            i += 1;
        } else {
            ops.push(Op::Insert(j));
            j += 1;
        }
    }
    while i < n {
        ops.push(Op::Delete(i));
        i += 1;
    }
    while j < m {
        ops.push(Op::Insert(j));
        j += 1;
    }
    ops
}
