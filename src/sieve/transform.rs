//! Section rewriting: binlog guards, CHANGE MASTER toggling, and
//! index/foreign-key deferral.

use std::collections::VecDeque;

use crate::sieve::parser::Section;
use crate::sieve::{defer, Options, SectionKind, SieveError};

const SKIP_BINLOG: &[u8] = b"/*!40101 SET @OLD_SQL_LOG_BIN=@@SQL_LOG_BIN, SQL_LOG_BIN=0 */;\n";
const ENABLE_BINLOG: &[u8] = b"/*!40101 SET SQL_LOG_BIN=@OLD_SQL_LOG_BIN */;\n";

pub struct SectionTransform {
    write_binlog: bool,
    master_data: Option<bool>,
    defer_indexes: bool,
    defer_foreign_keys: bool,
    /// Deferred ALTER TABLE lines waiting for the matching data section.
    pending_ddl: Option<Vec<Vec<u8>>>,
}

impl SectionTransform {
    pub fn new(options: &Options) -> SectionTransform {
        SectionTransform {
            write_binlog: options.write_binlog,
            master_data: options.master_data,
            defer_indexes: options.defer_indexes,
            defer_foreign_keys: options.defer_foreign_keys,
            pending_ddl: None,
        }
    }

    pub fn apply(&mut self, section: &mut Section<'_, '_>) -> Result<(), SieveError> {
        match section.kind {
            SectionKind::Header => self.transform_header(section),
            SectionKind::Footer => self.transform_footer(section),
            SectionKind::ReplicationInfo => self.transform_replication_info(section),
            SectionKind::TableStructure => self.transform_table_structure(section),
            SectionKind::TableData => self.transform_table_data(section),
            _ => {}
        }
        Ok(())
    }

    fn transform_header(&mut self, section: &mut Section<'_, '_>) {
        if !self.write_binlog {
            let at = section.head.len().saturating_sub(1);
            section.head.insert(at, SKIP_BINLOG.to_vec());
        }
    }

    fn transform_footer(&mut self, section: &mut Section<'_, '_>) {
        if !self.write_binlog {
            let at = section.head.len().saturating_sub(2);
            section.head.insert(at, ENABLE_BINLOG.to_vec());
        }
    }

    fn transform_replication_info(&mut self, section: &mut Section<'_, '_>) {
        let Some(master_data) = self.master_data else {
            // no option given: leave the section untouched
            return;
        };
        let text = section.head.iter().flatten().copied().collect::<Vec<u8>>();
        let text = if master_data {
            replace_all(&text, b"-- CHANGE MASTER", b"CHANGE MASTER")
        } else {
            replace_all(&text, b"CHANGE MASTER", b"-- CHANGE MASTER")
        };
        section.head = split_lines(&text);
    }

    fn transform_table_structure(&mut self, section: &mut Section<'_, '_>) {
        if !self.defer_indexes {
            return;
        }
        let text = section.head.iter().flatten().copied().collect::<Vec<u8>>();
        let create = defer::extract_create_table(&text);
        if create.is_empty() {
            return;
        }
        let (alter, new_create) = defer::split_indexes(&create, self.defer_foreign_keys);
        if alter.is_empty() {
            return;
        }
        let rewritten = replace_once(&text, &create, &new_create);
        section.head = split_lines(&rewritten);

        let mut pending = split_lines(&alter);
        pending.push_back(b"\n".to_vec());
        self.pending_ddl = Some(pending.into());
    }

    fn transform_table_data(&mut self, section: &mut Section<'_, '_>) {
        if let Some(pending) = self.pending_ddl.take() {
            section.tail.extend(pending);
        }
    }
}

fn split_lines(text: &[u8]) -> VecDeque<Vec<u8>> {
    text.split_inclusive(|&b| b == b'\n')
        .map(|line| line.to_vec())
        .collect()
}

fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut idx = 0;
    while idx < haystack.len() {
        if haystack[idx..].starts_with(needle) {
            out.extend_from_slice(replacement);
            idx += needle.len();
        } else {
            out.push(haystack[idx]);
            idx += 1;
        }
    }
    out
}

fn replace_once(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() {
        return haystack.to_vec();
    }
    match haystack
        .windows(needle.len())
        .position(|window| window == needle)
    {
        Some(pos) => {
            let mut out = Vec::with_capacity(haystack.len());
            out.extend_from_slice(&haystack[..pos]);
            out.extend_from_slice(replacement);
            out.extend_from_slice(&haystack[pos + needle.len()..]);
            out
        }
        None => haystack.to_vec(),
    }
}
