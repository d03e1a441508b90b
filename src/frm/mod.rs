//! MySQL .frm table definition decoding.
//!
//! A `.frm` is either the binary table format (magic `FE 01`) or a
//! plaintext view definition starting with `TYPE=VIEW`. Both decode to
//! a model that renders back to a CREATE statement.

pub mod binfrm;
pub mod charset;
pub mod constants;
pub mod keys;
pub mod tablename;
pub(crate) mod types;
pub mod view;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::bytes::TruncatedInput;
use crate::frm::charset::Charset;
use crate::frm::constants::{FieldFlag, HaOption, HaRowType, MySQLType, Utype};
use crate::frm::keys::Key;
use crate::sqlfmt::{quote_ident, quote_str};

#[derive(Debug, Error)]
pub enum FrmError {
    #[error("not a .frm file")]
    NotFrm,
    #[error("unrecognized .frm magic")]
    InvalidFormat,
    #[error(transparent)]
    Truncated(#[from] TruncatedInput),
    #[error("unknown character set id {id}")]
    UnknownCharset { id: u16 },
    #[error("unknown column type code {code}")]
    UnknownType { code: u8 },
    #[error("unsupported column type {type_name}")]
    UnsupportedType { type_name: &'static str },
    #[error("unknown unireg code {code}")]
    UnknownUnireg { code: u8 },
    #[error("invalid table definition: {reason}")]
    BadTable { reason: String },
    #[error("invalid view definition: {reason}")]
    BadView { reason: String },
    #[error("view checksum mismatch: stored {stored}, computed {computed}")]
    ChecksumMismatch { stored: String, computed: String },
    #[error(transparent)]
    Tablename(#[from] tablename::TablenameError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure to decode one .frm file, carrying its path.
#[derive(Debug, Error)]
#[error("failed to parse '{}': {kind}", .path.display())]
pub struct FrmParseError {
    pub path: PathBuf,
    pub kind: FrmError,
}

/// Options affecting DDL rendering, set from the frmdump command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpOptions {
    /// Append a MYSQL_TYPE_* comment to every column.
    pub type_codes: bool,
    /// Render views as CREATE OR REPLACE.
    pub replace: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MySQLVersion {
    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl MySQLVersion {
    /// Split a MYSQL_VERSION_ID (e.g. 50626) into its components.
    pub fn from_version_id(value: u32) -> MySQLVersion {
        MySQLVersion {
            major: value / 10000,
            minor: value % 1000 / 100,
            release: value % 100,
        }
    }
}

impl fmt::Display for MySQLVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.major == 0 && self.minor == 0 && self.release == 0 {
            // .frm files written before 5.0 carry no version id
            write!(f, "< 5.0")
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.release)
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub connection: Option<String>,
    pub engine: String,
    pub charset: &'static Charset,
    pub min_rows: u32,
    pub max_rows: u32,
    pub avg_row_length: u32,
    pub row_format: HaRowType,
    pub key_block_size: u16,
    pub comment: Option<String>,
    pub partitions: Option<String>,
    pub handler_options: HaOption,
}

impl TableOptions {
    pub fn checksum(&self) -> bool {
        self.handler_options.contains(HaOption::CHECKSUM)
    }

    pub fn delay_key_write(&self) -> bool {
        self.handler_options.contains(HaOption::DELAY_KEY_WRITE)
    }

    /// Table attributes that differ from their defaults, in the order
    /// SHOW CREATE TABLE emits them.
    fn attributes(&self) -> Vec<String> {
        let mut attrs = Vec::new();
        if let Some(connection) = &self.connection {
            attrs.push(format!("CONNECTION={}", quote_str(connection)));
        }
        attrs.push(format!("ENGINE={}", self.engine));
        attrs.push(format!("DEFAULT CHARSET={}", self.charset.name));
        if !self.charset.is_default {
            attrs.push(format!("COLLATE={}", self.charset.collation));
        }
        if self.min_rows != 0 {
            attrs.push(format!("MIN_ROWS={}", self.min_rows));
        }
        if self.max_rows != 0 {
            attrs.push(format!("MAX_ROWS={}", self.max_rows));
        }
        if self.avg_row_length != 0 {
            attrs.push(format!("AVG_ROW_LENGTH={}", self.avg_row_length));
        }
        if let Some(value) = self.handler_options.pack_keys() {
            attrs.push(format!("PACK_KEYS={value}"));
        }
        if let Some(value) = self.handler_options.stats_persistent() {
            attrs.push(format!("STATS_PERSISTENT={value}"));
        }
        if self.checksum() {
            attrs.push("CHECKSUM=1".to_string());
        }
        if self.delay_key_write() {
            attrs.push("DELAY_KEY_WRITE=1".to_string());
        }
        if !self.row_format.is_default() {
            attrs.push(format!("ROW_FORMAT={}", self.row_format.name()));
        }
        if self.key_block_size != 0 {
            attrs.push(format!("KEY_BLOCK_SIZE={}", self.key_block_size));
        }
        if let Some(comment) = &self.comment {
            if !comment.is_empty() {
                attrs.push(format!("COMMENT={}", quote_str(comment)));
            }
        }
        if let Some(partitions) = &self.partitions {
            attrs.push(format!("\n/*!50100 {} */", bridge_partition_comments(partitions)));
        }
        attrs
    }

    pub fn format(&self) -> String {
        self.attributes().join(" ")
    }
}

/// `ALGORITHM = N` appears inside partition clauses as its own
/// versioned comment; close and reopen the outer `/*!50100` comment
/// around it so the combined text stays valid SQL.
fn bridge_partition_comments(partitions: &str) -> String {
    static ALGORITHM: std::sync::LazyLock<regex::Regex> = std::sync::LazyLock::new(|| {
        regex::Regex::new(r"(/\*!\d+ ALGORITHM = \d+ \*/)").expect("valid regex")
    });
    ALGORITHM.replace_all(partitions, "*/ $1 /*!50100").into_owned()
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub type_code: MySQLType,
    pub type_name: String,
    pub length: u32,
    pub flags: FieldFlag,
    pub unireg: Utype,
    pub default: Option<String>,
    pub comment: String,
    pub charset: &'static Charset,
    pub labels: Vec<String>,
}

impl Column {
    pub fn format(&self, options: &DumpOptions) -> String {
        let mut parts = vec![quote_ident(&self.name), self.type_name.clone()];
        if let Some(default) = &self.default {
            parts.push(format!("DEFAULT {default}"));
        }
        if !self.comment.is_empty() {
            parts.push(format!("COMMENT {}", quote_str(&self.comment)));
        }
        if options.type_codes {
            parts.push(format!("/* MYSQL_TYPE_{} */", self.type_code.name()));
        }
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub mysql_version: MySQLVersion,
    pub charset: &'static Charset,
    pub options: TableOptions,
    pub columns: Vec<Column>,
    pub keys: Vec<Key>,
}

impl Table {
    pub fn format(&self, options: &DumpOptions) -> String {
        let mut elements: Vec<String> = self
            .columns
            .iter()
            .map(|column| column.format(options))
            .collect();
        elements.extend(self.keys.iter().map(|key| key.format(&self.columns)));

        let mut out = String::new();
        out.push_str("--\n");
        out.push_str(&format!("-- Table structure for table `{}`\n", self.name));
        out.push_str(&format!(
            "-- Created with MySQL Version {}\n",
            self.mysql_version
        ));
        out.push_str("--\n\n");
        out.push_str(&format!("CREATE TABLE {} (\n", quote_ident(&self.name)));
        out.push_str(
            &elements
                .iter()
                .map(|elt| format!("  {elt}"))
                .collect::<Vec<_>>()
                .join(",\n"),
        );
        out.push_str(&format!("\n) {};\n", self.options.format()));
        out
    }
}

/// A decoded .frm: either a table or a view.
#[derive(Debug, Clone)]
pub enum FrmObject {
    Table(Table),
    View(view::View),
}

impl FrmObject {
    pub fn name(&self) -> &str {
        match self {
            FrmObject::Table(table) => &table.name,
            FrmObject::View(view) => &view.name,
        }
    }

    pub fn format(&self, options: &DumpOptions) -> String {
        match self {
            FrmObject::Table(table) => table.format(options),
            FrmObject::View(view) => view.format(options.replace),
        }
    }
}

/// Parse a .frm file, dispatching on its leading magic.
pub fn parse(path: &Path) -> Result<FrmObject, FrmParseError> {
    parse_inner(path).map_err(|kind| FrmParseError {
        path: path.to_path_buf(),
        kind,
    })
}

fn parse_inner(path: &Path) -> Result<FrmObject, FrmError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("frm") {
        return Err(FrmError::NotFrm);
    }
    let data = fs::read(path)?;
    if data.starts_with(&[0xfe, 0x01]) {
        Ok(FrmObject::Table(binfrm::parse(path, &data)?))
    } else if data.starts_with(b"TYPE=VIEW") {
        Ok(FrmObject::View(view::parse(path, &data)?))
    } else {
        Err(FrmError::InvalidFormat)
    }
}
