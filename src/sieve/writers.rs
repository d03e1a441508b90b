//! Output strategies: one concatenated stream, or one file per object
//! under a directory root.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::compression::{self, CompressedWriter};
use crate::sieve::parser::Section;
use crate::sieve::{Options, OutputFormat, SectionKind, SieveError};

pub enum SectionWriter<'w> {
    Stream(&'w mut dyn Write),
    Directory(DirectoryWriter),
}

impl<'w> SectionWriter<'w> {
    pub fn new(options: &Options, output: &'w mut dyn Write) -> SectionWriter<'w> {
        match options.output_format {
            OutputFormat::Stream => SectionWriter::Stream(output),
            OutputFormat::Directory => SectionWriter::Directory(DirectoryWriter {
                directory: options.directory.clone(),
                compress_command: options.compress_command.clone(),
                header: None,
                first_view: false,
                replication_seen: false,
            }),
        }
    }

    pub fn write(&mut self, section: &mut Section<'_, '_>) -> Result<(), SieveError> {
        match self {
            SectionWriter::Stream(out) => {
                while let Some(line) = section.next_line()? {
                    out.write_all(&line)?;
                }
                Ok(())
            }
            SectionWriter::Directory(writer) => writer.write(section),
        }
    }
}

enum Sink {
    Plain(File),
    Compressed(CompressedWriter),
}

impl Sink {
    fn write_all(&mut self, data: &[u8]) -> Result<(), SieveError> {
        match self {
            Sink::Plain(file) => file.write_all(data)?,
            Sink::Compressed(writer) => writer.write_all(data)?,
        }
        Ok(())
    }

    fn close(self) -> Result<(), SieveError> {
        match self {
            Sink::Plain(_) => Ok(()),
            Sink::Compressed(writer) => Ok(writer.finish()?),
        }
    }
}

pub struct DirectoryWriter {
    directory: PathBuf,
    compress_command: Option<String>,
    /// The dump header, replayed at the top of schema files.
    header: Option<Vec<u8>>,
    first_view: bool,
    replication_seen: bool,
}

impl DirectoryWriter {
    fn open(&self, parts: &[&str], append: bool) -> Result<Sink, SieveError> {
        let mut path = self.directory.clone();
        for part in parts {
            path.push(part);
        }
        if let Some(command) = &self.compress_command {
            let ext = compression::extension_for_command(command);
            if !ext.is_empty() {
                let mut name = path
                    .file_name()
                    .map(|name| name.to_os_string())
                    .unwrap_or_default();
                name.push(ext);
                path.set_file_name(name);
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), append, "writing section");
        let file = OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(&path)?;
        match &self.compress_command {
            Some(command) => Ok(Sink::Compressed(CompressedWriter::spawn(command, file)?)),
            None => Ok(Sink::Plain(file)),
        }
    }

    fn database_of(section: &Section<'_, '_>) -> Result<String, SieveError> {
        section.database.clone().ok_or(SieveError::NoDatabase)
    }

    fn table_file(section: &Section<'_, '_>) -> String {
        format!("{}.sql", section.table.as_deref().unwrap_or("unknown"))
    }

    fn write(&mut self, section: &mut Section<'_, '_>) -> Result<(), SieveError> {
        let mut prepend_header = false;
        let sink = match section.kind {
            SectionKind::Header => {
                // stash it for the schema files
                let mut header = Vec::new();
                while let Some(line) = section.next_line()? {
                    header.extend_from_slice(&line);
                }
                self.header = Some(header);
                return Ok(());
            }
            SectionKind::ReplicationInfo => {
                let append = self.replication_seen;
                self.replication_seen = true;
                self.open(&["replication_info.sql"], append)?
            }
            SectionKind::CreateDatabase => {
                let db = Self::database_of(section)?;
                self.open(&[&db, &format!("{db}.createdb")], false)?
            }
            SectionKind::TableStructure => {
                prepend_header = true;
                let db = Self::database_of(section)?;
                self.open(&[&db, &Self::table_file(section)], false)?
            }
            SectionKind::TableData | SectionKind::Triggers => {
                let db = Self::database_of(section)?;
                self.open(&[&db, &Self::table_file(section)], true)?
            }
            SectionKind::View | SectionKind::ViewTemporary => {
                let first = !self.first_view;
                self.first_view = true;
                prepend_header = first;
                let db = Self::database_of(section)?;
                self.open(&[&db, "views.ddl"], !first)?
            }
            SectionKind::Routines => {
                prepend_header = true;
                let db = Self::database_of(section)?;
                self.open(&[&db, "routines.ddl"], false)?
            }
            SectionKind::Events => {
                prepend_header = true;
                let db = Self::database_of(section)?;
                self.open(&[&db, "events.ddl"], false)?
            }
            SectionKind::Footer
            | SectionKind::FlushPrivileges
            | SectionKind::DumpCompleted => {
                // no per-object file for these
                debug!(kind = section.kind.as_str(), "discarding section");
                return section.drain();
            }
        };

        let mut sink = sink;
        if prepend_header {
            if let Some(header) = &self.header {
                sink.write_all(header)?;
            } else {
                warn!("no dump header seen before {}", section.kind.as_str());
            }
        }
        while let Some(line) = section.next_line()? {
            sink.write_all(&line)?;
        }
        sink.close()
    }
}
