//! Splitting secondary indexes and foreign keys out of CREATE TABLE.
//!
//! When index creation is deferred, the KEY/CONSTRAINT lines are
//! removed from the CREATE statement and re-emitted as one
//! `ALTER TABLE ... ADD ...` after the table's data section.

use std::sync::LazyLock;

use regex::bytes::Regex;
use tracing::warn;

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^\s*(?:UNIQUE )?KEY (`.+`) \((.+)\)(?: USING (?:BTREE|HASH))?,?$")
        .expect("valid regex")
});

static CONSTRAINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)^\s*CONSTRAINT (`.+`) FOREIGN KEY \((.+)\) REFERENCES").expect("valid regex")
});

static TABLE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)CREATE TABLE .*`(.+)` \($").expect("valid regex"));

/// One KEY or CONSTRAINT line lifted from a CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLine {
    pub name: Vec<u8>,
    pub columns: Vec<Vec<u8>>,
    pub line: Vec<u8>,
}

/// Split a backtick-quoted, comma separated column list.
fn parse_columns(value: &[u8]) -> Vec<Vec<u8>> {
    let mut columns = Vec::new();
    let mut current = Vec::new();
    let mut in_quote = false;
    for &b in value {
        match b {
            b'`' => in_quote = !in_quote,
            b',' if !in_quote => {
                columns.push(std::mem::take(&mut current));
                current.clear();
            }
            _ if in_quote => current.push(b),
            // prefix lengths like `c`(10) stay outside the quotes and
            // are not part of the column name
            _ => {}
        }
    }
    if !current.is_empty() || !columns.is_empty() || !value.is_empty() {
        columns.push(current);
    }
    columns
}

fn rstrip(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    &line[..end]
}

fn lines_of(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    text.split_inclusive(|&b| b == b'\n')
}

/// The CREATE TABLE statement embedded in a table structure section.
pub fn extract_create_table(section_text: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut started = false;
    for line in lines_of(section_text) {
        if line.starts_with(b"CREATE TABLE") {
            started = true;
        }
        if started {
            out.extend_from_slice(line);
            if rstrip(line).ends_with(b";") {
                break;
            }
        }
    }
    out
}

fn extract_matching(table_ddl: &[u8], re: &Regex) -> Vec<IndexLine> {
    let mut found = Vec::new();
    for line in lines_of(table_ddl) {
        let trimmed = rstrip(line);
        if let Some(caps) = re.captures(trimmed) {
            found.push(IndexLine {
                name: parse_columns(&caps[1]).into_iter().next().unwrap_or_default(),
                columns: parse_columns(&caps[2]),
                line: line.to_vec(),
            });
        }
    }
    found
}

pub fn extract_indexes(table_ddl: &[u8]) -> Vec<IndexLine> {
    extract_matching(table_ddl, &KEY_RE)
}

pub fn extract_constraints(table_ddl: &[u8]) -> Vec<IndexLine> {
    extract_matching(table_ddl, &CONSTRAINT_RE)
}

fn extract_table_name(table_ddl: &[u8]) -> Option<Vec<u8>> {
    for line in lines_of(table_ddl) {
        if let Some(caps) = TABLE_NAME_RE.captures(rstrip(line)) {
            return Some(caps[1].to_vec());
        }
    }
    None
}

fn format_alter_table(table_ddl: &[u8], deferred: &[IndexLine]) -> Vec<u8> {
    if deferred.is_empty() {
        return Vec::new();
    }
    let Some(table) = extract_table_name(table_ddl) else {
        return Vec::new();
    };
    let mut ddl = Vec::new();
    ddl.extend_from_slice(b"ALTER TABLE `");
    ddl.extend_from_slice(&table);
    ddl.extend_from_slice(b"`");
    for index in deferred {
        ddl.extend_from_slice(b"\n  ADD ");
        ddl.extend_from_slice(rstrip(&index.line));
    }
    // the per-line trailing commas separate the ADD clauses; the last
    // one must go
    while ddl.last() == Some(&b',') {
        ddl.pop();
    }
    ddl.extend_from_slice(b";\n");
    ddl
}

fn format_create_table(table_ddl: &[u8], deferred: &[IndexLine]) -> Vec<u8> {
    let removed: Vec<&[u8]> = deferred.iter().map(|index| index.line.as_slice()).collect();
    let mut result: Vec<Vec<u8>> = Vec::new();
    for line in lines_of(table_ddl) {
        if !result.is_empty() && line.starts_with(b")") {
            // the line before the closing paren must not end in a comma
            let prev = result.last_mut().expect("non-empty");
            let mut trimmed = rstrip(prev).to_vec();
            if trimmed.last() == Some(&b',') {
                trimmed.pop();
            }
            trimmed.push(b'\n');
            *prev = trimmed;
        }
        if !removed.contains(&line) {
            result.push(line.to_vec());
        }
    }
    result.concat()
}

/// Compute the deferred `ALTER TABLE` and the shortened CREATE TABLE.
///
/// When constraints are kept inline, any index whose leading columns
/// match a constraint's column list must also stay (InnoDB requires an
/// index on the referencing columns); the shortest such index per
/// constraint is preserved.
pub fn split_indexes(table_ddl: &[u8], defer_constraints: bool) -> (Vec<u8>, Vec<u8>) {
    let mut indexes = extract_indexes(table_ddl);
    let constraints = extract_constraints(table_ddl);

    if defer_constraints {
        indexes.extend(constraints);
    } else {
        let mut preserved: Vec<IndexLine> = Vec::new();
        for constraint in &constraints {
            let mut candidates: Vec<&IndexLine> = indexes
                .iter()
                .filter(|index| !preserved.contains(index))
                .collect();
            candidates.sort_by_key(|index| index.columns.len());
            if let Some(index) = candidates
                .into_iter()
                .find(|index| index.columns.starts_with(&constraint.columns))
            {
                warn!(
                    "not deferring index `{}` - used by constraint `{}`",
                    String::from_utf8_lossy(&index.name),
                    String::from_utf8_lossy(&constraint.name),
                );
                preserved.push(index.clone());
            }
        }
        indexes.retain(|index| !preserved.contains(index));
    }

    (
        format_alter_table(table_ddl, &indexes),
        format_create_table(table_ddl, &indexes),
    )
}
