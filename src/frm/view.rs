//! Plaintext view .frm decoding.
//!
//! View definitions are stored as `key=value` lines (the file begins
//! with `TYPE=VIEW`). Values are backslash-escaped; the `md5` key holds
//! a digest of the unescaped `query` body and is verified on parse.

use std::collections::HashMap;
use std::path::Path;

use md5::{Digest, Md5};

use crate::frm::{FrmError, tablename};
use crate::sqlfmt::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAlgorithm {
    Undefined,
    Tmptable,
    Merge,
}

impl ViewAlgorithm {
    fn from_code(code: u32) -> Option<ViewAlgorithm> {
        Some(match code {
            0 => ViewAlgorithm::Undefined,
            1 => ViewAlgorithm::Tmptable,
            2 => ViewAlgorithm::Merge,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            ViewAlgorithm::Undefined => "UNDEFINED",
            ViewAlgorithm::Tmptable => "TMPTABLE",
            ViewAlgorithm::Merge => "MERGE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSuid {
    Invoker,
    Definer,
    Default,
}

impl ViewSuid {
    fn from_code(code: u32) -> Option<ViewSuid> {
        Some(match code {
            0 => ViewSuid::Invoker,
            1 => ViewSuid::Definer,
            2 => ViewSuid::Default,
            _ => return None,
        })
    }

    /// SQL SECURITY clause value; DEFAULT behaves as DEFINER.
    fn security(self) -> &'static str {
        match self {
            ViewSuid::Invoker => "INVOKER",
            ViewSuid::Definer | ViewSuid::Default => "DEFINER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewCheckOption {
    None,
    Local,
    Cascaded,
}

impl ViewCheckOption {
    fn from_code(code: u32) -> Option<ViewCheckOption> {
        Some(match code {
            0 => ViewCheckOption::None,
            1 => ViewCheckOption::Local,
            2 => ViewCheckOption::Cascaded,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            ViewCheckOption::None => "NONE",
            ViewCheckOption::Local => "LOCAL",
            ViewCheckOption::Cascaded => "CASCADED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct View {
    pub name: String,
    pub body: String,
    pub algorithm: ViewAlgorithm,
    pub definer_user: String,
    pub definer_host: String,
    pub suid: ViewSuid,
    pub check_option: ViewCheckOption,
    pub timestamp: String,
    pub stored_md5: String,
    pub computed_md5: String,
}

impl View {
    pub fn format(&self, create_or_replace: bool) -> String {
        let mut out = String::new();
        out.push_str("--\n");
        out.push_str(&format!("-- View:         {}\n", self.name));
        out.push_str(&format!("-- Timestamp:    {}\n", self.timestamp));
        out.push_str(&format!("-- Stored MD5:   {}\n", self.stored_md5));
        out.push_str(&format!("-- Computed MD5: {}\n", self.computed_md5));
        out.push_str("--\n\n");

        let mut parts: Vec<String> = Vec::new();
        parts.push(if create_or_replace {
            "CREATE OR REPLACE".to_string()
        } else {
            "CREATE".to_string()
        });
        parts.push(format!("ALGORITHM={}", self.algorithm.name()));
        parts.push(format!(
            "DEFINER={}@{}",
            quote_ident(&self.definer_user),
            quote_ident(&self.definer_host)
        ));
        parts.push(format!("SQL SECURITY {}", self.suid.security()));
        parts.push("VIEW".to_string());
        parts.push(quote_ident(&self.name));
        parts.push("AS".to_string());
        parts.push(self.body.clone());
        if self.check_option != ViewCheckOption::None {
            parts.push(format!("WITH {} CHECK OPTION", self.check_option.name()));
        }
        out.push_str(&parts.join(" "));
        out.push_str(";\n");
        out
    }
}

/// Remove the backslash escapes the server applies to view bodies.
/// `\s` encodes a space.
pub(crate) fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('b') => out.push('\u{8}'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('s') => out.push(' '),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn bad_view(reason: impl Into<String>) -> FrmError {
    FrmError::BadView {
        reason: reason.into(),
    }
}

fn required<'a>(fields: &'a HashMap<&str, &str>, key: &str) -> Result<&'a str, FrmError> {
    fields
        .get(key)
        .copied()
        .ok_or_else(|| bad_view(format!("missing required key '{key}'")))
}

fn required_int(fields: &HashMap<&str, &str>, key: &str) -> Result<u32, FrmError> {
    required(fields, key)?
        .parse()
        .map_err(|_| bad_view(format!("key '{key}' is not an integer")))
}

fn validate_timestamp(value: &str) -> bool {
    // YYYY-MM-DD HH:MM:SS
    let bytes = value.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    bytes.iter().enumerate().all(|(idx, &b)| match idx {
        4 | 7 => b == b'-',
        10 => b == b' ',
        13 | 16 => b == b':',
        _ => b.is_ascii_digit(),
    })
}

/// Parse a plaintext view .frm.
pub fn parse(path: &Path, data: &[u8]) -> Result<View, FrmError> {
    let text = std::str::from_utf8(data).map_err(|_| bad_view("view body is not UTF-8"))?;
    if !text.starts_with("TYPE=VIEW") {
        return Err(FrmError::InvalidFormat);
    }

    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once('=') {
            fields.entry(key).or_insert(value);
        }
    }

    let algorithm = ViewAlgorithm::from_code(required_int(&fields, "algorithm")?)
        .ok_or_else(|| bad_view("bad algorithm value"))?;
    let suid = ViewSuid::from_code(required_int(&fields, "suid")?)
        .ok_or_else(|| bad_view("bad suid value"))?;
    let check_option = ViewCheckOption::from_code(required_int(&fields, "with_check_option")?)
        .ok_or_else(|| bad_view("bad with_check_option value"))?;
    let definer_user = required(&fields, "definer_user")?.to_string();
    let definer_host = required(&fields, "definer_host")?.to_string();
    let stored_md5 = required(&fields, "md5")?.to_string();
    let timestamp = required(&fields, "timestamp")?.to_string();
    if !validate_timestamp(&timestamp) {
        return Err(bad_view(format!("bad timestamp '{timestamp}'")));
    }

    // "query" matches what SHOW CREATE VIEW prints
    let body = unescape(required(&fields, "query")?);

    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    let computed_md5 = format!("{:x}", hasher.finalize());
    if computed_md5 != stored_md5 {
        return Err(FrmError::ChecksumMismatch {
            stored: stored_md5,
            computed: computed_md5,
        });
    }

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or(FrmError::NotFrm)?;

    Ok(View {
        name: tablename::decode(stem)?,
        body,
        algorithm,
        definer_user,
        definer_host,
        suid,
        check_option,
        timestamp,
        stored_md5,
        computed_md5,
    })
}
