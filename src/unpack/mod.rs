//! Unpacking of MySQL backup archives (POSIX tar and xbstream).
//!
//! The input stream (already routed through a decompressor when
//! needed) is sniffed for its container format, then demultiplexed
//! into a datadir layout with optional table filtering.

pub mod tar;
pub mod xbs;

use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, info};

use crate::compression::{self, CommandError};
use crate::frm::tablename;
use crate::util::{self, FilterError, NameFilter, PeekReader};

#[derive(Debug, Error)]
pub enum UnpackError {
    #[error("unknown format for input stream")]
    UnknownFormat,
    #[error("checksum mismatch (offset={offset} path={path})")]
    ChecksumMismatch { path: String, offset: u64 },
    #[error("corrupt archive: {reason}")]
    Corrupt { reason: String },
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// One archive member, as the filter and listing see it.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Normalized archive path.
    pub path: String,
    /// `db.table` after filename decoding, when the path is a table
    /// file.
    pub qualified_name: Option<String>,
    /// Always-extract files MySQL needs regardless of table filters.
    pub required: bool,
    /// Payload offset for xbstream chunks; tar members have none.
    pub chunk_offset: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Options {
    pub destination: PathBuf,
    pub include_tables: Vec<String>,
    pub exclude_tables: Vec<String>,
    /// Print member paths instead of extracting.
    pub list_contents: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub files: u64,
    pub bytes: u64,
}

/// Files with these extensions belong to a table.
static TABLE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.(frm|isl|ibd|MYD|MYI|MAD|MAI|MRG|TRG|TRN|ARM|ARZ|CSM|CSV|par)$")
        .expect("valid regex")
});

/// Files a MySQL datadir cannot function without; these bypass table
/// filtering.
static MYSQL_REQUIRED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)^(?:
            ibdata\d*
          | ib_logfile\d+
          | ib_buffer_pool
          | undo\d+
          | auto\.cnf
          | backup-my\.cnf
          | mysql_upgrade_info
          | xtrabackup_.*
          | aria_log.*
          | tokudb\..*
          | log\d+\.tokulog\d+
          | mysql/slave_.*
          | mysql/innodb_.*
          | [^/]+/db\.opt
        )$",
    )
    .expect("valid regex")
});

pub(crate) fn is_required(path: &str) -> bool {
    MYSQL_REQUIRED.is_match(path)
}

/// Decode `db/table.ext` into `db.table`, stripping any `#P...`
/// partition suffix. Paths that are not table files have no name.
pub(crate) fn qualified_name(path: &str) -> Option<String> {
    if !TABLE_FILE.is_match(path) {
        return None;
    }
    let (parent, base) = util::split_path(path);
    if parent.is_empty() {
        return None;
    }
    let (_, db) = util::split_path(parent);
    let table = util::strip_extension(base);
    let table = table.split_once("#P").map_or(table, |(head, _)| head);
    let db = tablename::decode(db);
    let table = tablename::decode(table);
    match (db, table) {
        (Ok(db), Ok(table)) => Some(format!("{db}.{table}")),
        _ => {
            debug!(path, "undecodable member name");
            None
        }
    }
}

pub(crate) fn make_entry(path: &str, chunk_offset: Option<u64>) -> Entry {
    Entry {
        path: path.to_string(),
        qualified_name: qualified_name(path),
        required: is_required(path),
        chunk_offset,
    }
}

/// Whether the table filter drops this entry. Required files and
/// entries without a decodable name always pass.
pub(crate) fn filtered(entry: &Entry, filter: &NameFilter) -> bool {
    if entry.required {
        return false;
    }
    match &entry.qualified_name {
        Some(name) => filter.excluded(name),
        None => false,
    }
}

/// Unpack a (possibly still compressed) `stream` under
/// `options.destination`, or list its contents to `list_output`.
pub fn unpack(
    options: &Options,
    stream: compression::InputStream,
    list_output: &mut dyn Write,
) -> Result<Summary, UnpackError> {
    let filter = NameFilter::new(&options.include_tables, &options.exclude_tables)?;
    let mut reader = PeekReader::new(stream, 512)?;

    let summary = if tar::is_tar_header(reader.peeked()) {
        tar::unpack(&mut reader, options, &filter, list_output)?
    } else if reader.peeked().starts_with(xbs::XBS_MAGIC) {
        xbs::unpack(&mut reader, options, &filter, list_output)?
    } else {
        return Err(UnpackError::UnknownFormat);
    };

    // drain any trailing padding so the decompressor can exit cleanly
    std::io::copy(&mut reader, &mut std::io::sink())?;
    let (_, input) = reader.into_parts();
    input.finish()?;

    if !options.list_contents {
        info!(
            files = summary.files,
            bytes = summary.bytes,
            "unpack complete"
        );
    }
    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_qualified_name() {
        assert_eq!(
            qualified_name("sakila/actor.frm").as_deref(),
            Some("sakila.actor")
        );
        assert_eq!(
            qualified_name("sakila/actor.ibd").as_deref(),
            Some("sakila.actor")
        );
        assert_eq!(
            qualified_name("backup/sakila/actor.MYD").as_deref(),
            Some("sakila.actor")
        );
        assert_eq!(qualified_name("xtrabackup_checkpoints"), None);
        assert_eq!(qualified_name("actor.frm"), None);
    }

    #[test]
    fn test_qualified_name_decodes_and_strips_partitions() {
        assert_eq!(
            qualified_name("db/t@002d1#P#p0.ibd").as_deref(),
            Some("db.t-1")
        );
        assert_eq!(
            qualified_name("d@0431/t.frm").as_deref(),
            Some("dб.t")
        );
    }

    #[test]
    fn test_required_files() {
        for path in [
            "ibdata1",
            "ib_logfile0",
            "undo001",
            "auto.cnf",
            "backup-my.cnf",
            "xtrabackup_checkpoints",
            "aria_log_control",
            "mysql/slave_relay_log_info.ibd",
            "mysql/innodb_table_stats.ibd",
            "sakila/db.opt",
            "tokudb.environment",
        ] {
            assert!(is_required(path), "{path} should be required");
        }
        assert!(!is_required("sakila/actor.ibd"));
        assert!(!is_required("ib_logfile"));
    }

    #[test]
    fn test_filter_bypass_for_required() {
        let filter = NameFilter::new(&["sakila.actor"], &[]).unwrap();
        let entry = make_entry("mysql/innodb_index_stats.ibd", None);
        assert!(!filtered(&entry, &filter));
        let entry = make_entry("world/city.ibd", None);
        assert!(filtered(&entry, &filter));
        let entry = make_entry("sakila/actor.ibd", None);
        assert!(!filtered(&entry, &filter));
    }
}
