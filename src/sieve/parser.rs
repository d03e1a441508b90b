//! Line-oriented mysqldump parsing.
//!
//! Sections are discriminated by peeking at most two lines and matching
//! known prefixes, then collected by a per-kind rule. Most sections are
//! small and buffered whole; table data streams line by line.

use std::collections::VecDeque;
use std::io::BufRead;

use crate::sieve::{SectionKind, SieveError};

/// Match order matters: first hit wins.
const DISCRIMINATORS: &[(&[u8], SectionKind)] = &[
    (b"-- MySQL dump", SectionKind::Header),
    (b"-- Position", SectionKind::ReplicationInfo),
    (b"-- GTID to start replication from", SectionKind::ReplicationInfo),
    (b"-- Current Database", SectionKind::CreateDatabase),
    (b"-- Table structure", SectionKind::TableStructure),
    (b"-- Dumping data for table", SectionKind::TableData),
    (b"-- Temporary table structure", SectionKind::ViewTemporary),
    (b"-- Dumping routines", SectionKind::Routines),
    (b"-- Dumping events", SectionKind::Events),
    (b"-- Final view structure", SectionKind::View),
    (
        b"/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;",
        SectionKind::Footer,
    ),
    (b"/*!50003 SET @saved_cs_client", SectionKind::Triggers),
    (b"-- Flush Grant Tables", SectionKind::FlushPrivileges),
    (b"-- Dump completed", SectionKind::DumpCompleted),
];

/// The identifier between the first backtick or quote and a matching
/// one closing the line.
fn extract_identifier(line: &[u8]) -> Option<String> {
    let trimmed = rstrip(line);
    let first = trimmed.iter().position(|&b| b == b'`' || b == b'\'')?;
    let quote = trimmed[first];
    if trimmed.len() < first + 2 || trimmed[trimmed.len() - 1] != quote {
        return None;
    }
    let ident = &trimmed[first + 1..trimmed.len() - 1];
    Some(String::from_utf8_lossy(ident).into_owned())
}

fn rstrip(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !b.is_ascii_whitespace())
        .map_or(0, |idx| idx + 1);
    &line[..end]
}

struct LineReader<'r> {
    stream: &'r mut dyn BufRead,
    pushback: VecDeque<Vec<u8>>,
    line_no: u64,
}

impl<'r> LineReader<'r> {
    fn new(stream: &'r mut dyn BufRead) -> LineReader<'r> {
        LineReader {
            stream,
            pushback: VecDeque::new(),
            line_no: 0,
        }
    }

    fn next_line(&mut self) -> Result<Option<Vec<u8>>, SieveError> {
        if let Some(line) = self.pushback.pop_front() {
            return Ok(Some(line));
        }
        let mut line = Vec::new();
        let n = self.stream.read_until(b'\n', &mut line)?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some(line))
    }

    fn push_back(&mut self, line: Vec<u8>) {
        self.pushback.push_back(line);
    }

    fn unexpected(&self, line: &[u8]) -> SieveError {
        SieveError::UnexpectedLine {
            line_no: self.line_no,
            line: String::from_utf8_lossy(line).into_owned(),
        }
    }

    fn eof_error(&self) -> SieveError {
        SieveError::UnexpectedLine {
            line_no: self.line_no,
            line: "<eof>".to_string(),
        }
    }

    fn expect_prefix(&mut self, prefix: &[u8]) -> Result<Vec<u8>, SieveError> {
        match self.next_line()? {
            Some(line) if line.starts_with(prefix) => Ok(line),
            Some(line) => {
                let err = self.unexpected(&line);
                self.push_back(line);
                Err(err)
            }
            None => Err(self.eof_error()),
        }
    }

    /// expect_prefix that restores the line and reports a miss without
    /// constructing an error; used for optional lines.
    fn try_prefix(&mut self, prefix: &[u8]) -> Result<Option<Vec<u8>>, SieveError> {
        match self.next_line()? {
            Some(line) if line.starts_with(prefix) => Ok(Some(line)),
            Some(line) => {
                self.push_back(line);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn expect_exact(&mut self, value: &[u8]) -> Result<Vec<u8>, SieveError> {
        match self.next_line()? {
            Some(line) if rstrip(&line) == value => Ok(line),
            Some(line) => {
                let err = self.unexpected(&line);
                self.push_back(line);
                Err(err)
            }
            None => Err(self.eof_error()),
        }
    }

    fn expect_blank(&mut self) -> Result<Vec<u8>, SieveError> {
        self.expect_exact(b"")
    }
}

/// One section of the dump. Lines are pulled with [`Section::next_line`];
/// buffered lines come first, then (for table data) lines streamed from
/// the parser, then any lines a transform appended.
pub struct Section<'p, 'r> {
    pub kind: SectionKind,
    pub database: Option<String>,
    pub table: Option<String>,
    pub(crate) head: VecDeque<Vec<u8>>,
    pub(crate) tail: VecDeque<Vec<u8>>,
    streaming: bool,
    parser: &'p mut DumpParser<'r>,
}

impl Section<'_, '_> {
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>, SieveError> {
        if let Some(line) = self.head.pop_front() {
            return Ok(Some(line));
        }
        if self.streaming {
            if let Some(line) = self.parser.next_data_line()? {
                return Ok(Some(line));
            }
            self.streaming = false;
        }
        Ok(self.tail.pop_front())
    }

    /// Consume and discard the remaining lines.
    pub fn drain(&mut self) -> Result<(), SieveError> {
        while self.next_line()?.is_some() {}
        Ok(())
    }

    /// Qualified `db.table` name used by the table filters.
    pub fn qualified_name(&self) -> Option<String> {
        self.database
            .as_ref()
            .map(|db| format!("{db}.{}", self.table.as_deref().unwrap_or("")))
    }
}

pub struct DumpParser<'r> {
    reader: LineReader<'r>,
    database: Option<String>,
    table: Option<String>,
    data_done: bool,
}

impl<'r> DumpParser<'r> {
    pub fn new(stream: &'r mut dyn BufRead) -> DumpParser<'r> {
        DumpParser {
            reader: LineReader::new(stream),
            database: None,
            table: None,
            data_done: false,
        }
    }

    fn discriminate(&mut self) -> Result<Option<(SectionKind, Vec<u8>)>, SieveError> {
        let mut pending: Vec<Vec<u8>> = Vec::new();
        let mut found = None;
        // the next section must be identifiable within two lines
        for _ in 0..2 {
            let Some(line) = self.reader.next_line()? else {
                break;
            };
            let hit = DISCRIMINATORS
                .iter()
                .find(|(prefix, _)| line.starts_with(prefix))
                .map(|&(_, kind)| kind);
            pending.push(line);
            if let Some(kind) = hit {
                found = Some((kind, pending.last().expect("just pushed").clone()));
                break;
            }
        }
        let empty = pending.is_empty();
        let last = pending.last().cloned();
        for line in pending.into_iter().rev() {
            self.reader.pushback.push_front(line);
        }
        if empty {
            return Ok(None);
        }
        match found {
            Some(hit) => Ok(Some(hit)),
            None => Err(SieveError::UnknownSection {
                line_no: self.reader.line_no,
                line: String::from_utf8_lossy(&last.unwrap_or_default()).into_owned(),
            }),
        }
    }

    /// Yield the next section, or `None` at end of stream.
    pub fn next_section(&mut self) -> Result<Option<Section<'_, 'r>>, SieveError> {
        let Some((kind, marker)) = self.discriminate()? else {
            return Ok(None);
        };

        match kind {
            SectionKind::CreateDatabase | SectionKind::Routines | SectionKind::Events => {
                self.database = extract_identifier(&marker);
                self.table = None;
            }
            SectionKind::TableStructure
            | SectionKind::TableData
            | SectionKind::View
            | SectionKind::ViewTemporary => {
                self.table = extract_identifier(&marker);
            }
            SectionKind::FlushPrivileges => self.table = None,
            SectionKind::Footer => {
                self.database = None;
                self.table = None;
            }
            _ => {}
        }

        let mut streaming = false;
        let head = match kind {
            SectionKind::Header => self.collect_header()?,
            SectionKind::Footer | SectionKind::DumpCompleted => self.collect_remainder()?,
            SectionKind::Triggers => self.collect_triggers()?,
            SectionKind::TableData => {
                self.data_done = false;
                streaming = true;
                self.collect_tabledata_head()?
            }
            _ => self.collect_generic()?,
        };

        Ok(Some(Section {
            kind,
            database: self.database.clone(),
            table: self.table.clone(),
            head,
            tail: VecDeque::new(),
            streaming,
            parser: self,
        }))
    }

    fn collect_header(&mut self) -> Result<VecDeque<Vec<u8>>, SieveError> {
        let mut lines = VecDeque::new();
        lines.push_back(self.reader.expect_prefix(b"-- MySQL dump")?);
        lines.push_back(self.reader.expect_prefix(b"--")?);
        let host_line = self.reader.expect_prefix(b"-- Host:")?;
        // mysqldump records the dumped database on the Host line
        if let Some(pos) = find_subslice(&host_line, b"Database: ") {
            let name = rstrip(&host_line[pos + b"Database: ".len()..]);
            if !name.is_empty() {
                self.database = Some(String::from_utf8_lossy(name).into_owned());
            }
        }
        lines.push_back(host_line);
        lines.push_back(self.reader.expect_prefix(b"-- ---")?);
        lines.push_back(self.reader.expect_prefix(b"-- Server version")?);
        lines.push_back(self.reader.expect_blank()?);
        // session preamble: a run of /*! statements ended by a blank
        lines.push_back(self.reader.expect_prefix(b"/*!")?);
        while let Some(line) = self.reader.try_prefix(b"/*!")? {
            lines.push_back(line);
        }
        lines.push_back(self.reader.expect_blank()?);
        Ok(lines)
    }

    fn collect_generic(&mut self) -> Result<VecDeque<Vec<u8>>, SieveError> {
        let mut lines = VecDeque::new();
        lines.push_back(self.reader.expect_exact(b"--")?);
        lines.push_back(self.reader.expect_prefix(b"-- ")?);
        lines.push_back(self.reader.expect_exact(b"--")?);
        let mut in_delimiter = false;
        while let Some(line) = self.reader.next_line()? {
            if !in_delimiter && rstrip(&line) == b"--" {
                self.reader.push_back(line);
                break;
            }
            if line.starts_with(b"DELIMITER") {
                in_delimiter = !in_delimiter;
            } else if line.starts_with(b"/*!40103 SET TIME_ZONE=@OLD_TIME_ZONE */;") {
                self.reader.push_back(line);
                break;
            }
            lines.push_back(line);
        }
        Ok(lines)
    }

    fn collect_remainder(&mut self) -> Result<VecDeque<Vec<u8>>, SieveError> {
        let mut lines = VecDeque::new();
        while let Some(line) = self.reader.next_line()? {
            lines.push_back(line);
        }
        Ok(lines)
    }

    fn collect_triggers(&mut self) -> Result<VecDeque<Vec<u8>>, SieveError> {
        let mut lines = VecDeque::new();
        let mut in_delimiter = false;
        while let Some(line) = self.reader.next_line()? {
            if line.starts_with(b"DELIMITER ;;") {
                in_delimiter = true;
            }
            if in_delimiter && line.starts_with(b"--\n") {
                self.reader.push_back(line);
                break;
            }
            lines.push_back(line);
        }
        Ok(lines)
    }

    fn collect_tabledata_head(&mut self) -> Result<VecDeque<Vec<u8>>, SieveError> {
        let mut lines = VecDeque::new();
        lines.push_back(self.reader.expect_exact(b"--")?);
        lines.push_back(self.reader.expect_prefix(b"-- ")?);
        lines.push_back(self.reader.expect_exact(b"--")?);
        lines.push_back(self.reader.expect_blank()?);
        Ok(lines)
    }

    /// Pull one table-data line; `None` ends the section.
    fn next_data_line(&mut self) -> Result<Option<Vec<u8>>, SieveError> {
        if self.data_done {
            return Ok(None);
        }
        let Some(line) = self.reader.next_line()? else {
            return Ok(None);
        };
        if line.starts_with(b"INSERT")
            || line.starts_with(b"REPLACE")
            || line.starts_with(b"/*!40000 ALTER")
        {
            return Ok(Some(line));
        }
        if line.starts_with(b"/*!") {
            self.reader.push_back(line);
            return Ok(None);
        }
        if line.starts_with(b"\n") {
            // blank line ends the data block but belongs to it
            self.data_done = true;
        }
        Ok(Some(line))
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::BufReader;

    const SAMPLE_HEADER: &str = "\
-- MySQL dump 10.13  Distrib 5.6.26, for Linux (x86_64)
--
-- Host: localhost    Database: sakila
-- ------------------------------------------------------
-- Server version	5.6.26-log

/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET NAMES utf8 */;

";

    #[test]
    fn test_extract_identifier() {
        assert_eq!(
            extract_identifier(b"-- Table structure for table `actor`\n").as_deref(),
            Some("actor")
        );
        assert_eq!(
            extract_identifier(b"-- Current Database: `sakila`\n").as_deref(),
            Some("sakila")
        );
        assert_eq!(extract_identifier(b"-- nothing here\n"), None);
    }

    #[test]
    fn test_parse_header_section() {
        let mut input = BufReader::new(SAMPLE_HEADER.as_bytes());
        let mut parser = DumpParser::new(&mut input);
        let mut section = parser.next_section().unwrap().unwrap();
        assert_eq!(section.kind, SectionKind::Header);
        assert_eq!(section.database.as_deref(), Some("sakila"));
        let mut collected = Vec::new();
        while let Some(line) = section.next_line().unwrap() {
            collected.extend_from_slice(&line);
        }
        assert_eq!(collected, SAMPLE_HEADER.as_bytes());
        assert!(parser.next_section().unwrap().is_none());
    }

    #[test]
    fn test_parse_table_structure_and_data() {
        let dump = "\
--
-- Table structure for table `actor`
--

DROP TABLE IF EXISTS `actor`;
CREATE TABLE `actor` (
  `actor_id` smallint(5) unsigned NOT NULL AUTO_INCREMENT,
  PRIMARY KEY (`actor_id`)
) ENGINE=InnoDB;

--
-- Dumping data for table `actor`
--

LOCK TABLES `actor` WRITE;
INSERT INTO `actor` VALUES (1);
UNLOCK TABLES;

";
        let mut input = BufReader::new(dump.as_bytes());
        let mut parser = DumpParser::new(&mut input);

        let mut structure = parser.next_section().unwrap().unwrap();
        assert_eq!(structure.kind, SectionKind::TableStructure);
        assert_eq!(structure.table.as_deref(), Some("actor"));
        let mut text = Vec::new();
        while let Some(line) = structure.next_line().unwrap() {
            text.extend_from_slice(&line);
        }
        assert!(text.ends_with(b"ENGINE=InnoDB;\n\n"));

        let mut data = parser.next_section().unwrap().unwrap();
        assert_eq!(data.kind, SectionKind::TableData);
        let mut text = Vec::new();
        while let Some(line) = data.next_line().unwrap() {
            text.extend_from_slice(&line);
        }
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("INSERT INTO `actor`"));
        assert!(text.ends_with("\n\n"));
        assert!(parser.next_section().unwrap().is_none());
    }

    #[test]
    fn test_unknown_section_errors() {
        let mut input = BufReader::new(&b"random garbage\nmore garbage\n"[..]);
        let mut parser = DumpParser::new(&mut input);
        assert!(matches!(
            parser.next_section(),
            Err(SieveError::UnknownSection { .. })
        ));
    }
}
