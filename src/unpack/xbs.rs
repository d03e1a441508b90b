//! Percona xbstream demultiplexing.
//!
//! xbstream interleaves chunks of many files so XtraBackup can write
//! them in parallel; every payload chunk carries an absolute file
//! offset and a zlib CRC32. Files are reassembled with positioned
//! writes and closed on their final chunk.

use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};

use tracing::debug;

use crate::unpack::{Options, Summary, UnpackError, filtered, make_entry};
use crate::util::{self, NameFilter};

pub const XBS_MAGIC: &[u8] = b"XBSTCK01";

// magic + flags + type + pathlen
const HEADER_SIZE: usize = 8 + 1 + 1 + 4;

enum Chunk {
    Payload {
        path: String,
        offset: u64,
        payload: Vec<u8>,
    },
    Eof {
        path: String,
    },
}

fn corrupt(reason: impl Into<String>) -> UnpackError {
    UnpackError::Corrupt {
        reason: reason.into(),
    }
}

/// Read one chunk; `None` at a clean end of stream.
fn read_chunk(stream: &mut dyn Read) -> Result<Option<Chunk>, UnpackError> {
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;
    while filled < HEADER_SIZE {
        let n = stream.read(&mut header[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(corrupt("truncated chunk header"));
        }
        filled += n;
    }

    if &header[..8] != XBS_MAGIC {
        return Err(corrupt(format!(
            "bad chunk magic {:02x?}",
            &header[..8]
        )));
    }
    let _flags = header[8];
    let chunk_type = header[9];
    let path_len = u32::from_le_bytes(header[10..14].try_into().expect("4 bytes")) as usize;

    let mut path = vec![0u8; path_len];
    stream.read_exact(&mut path)?;
    let path = String::from_utf8_lossy(&path).into_owned();

    match chunk_type {
        b'E' => Ok(Some(Chunk::Eof { path })),
        b'P' => {
            let mut fixed = [0u8; 20];
            stream.read_exact(&mut fixed)?;
            let payload_length = u64::from_le_bytes(fixed[0..8].try_into().expect("8 bytes"));
            let payload_offset = u64::from_le_bytes(fixed[8..16].try_into().expect("8 bytes"));
            let checksum = u32::from_le_bytes(fixed[16..20].try_into().expect("4 bytes"));

            let mut payload = vec![0u8; payload_length as usize];
            stream.read_exact(&mut payload)?;

            if crc32fast::hash(&payload) != checksum {
                return Err(UnpackError::ChecksumMismatch {
                    path,
                    offset: payload_offset,
                });
            }
            Ok(Some(Chunk::Payload {
                path,
                offset: payload_offset,
                payload,
            }))
        }
        other => Err(corrupt(format!("unknown chunk type {:?}", other as char))),
    }
}

/// Demultiplex the stream, extracting (or listing) each file.
pub fn unpack(
    stream: &mut dyn Read,
    options: &Options,
    filter: &NameFilter,
    list_output: &mut dyn Write,
) -> Result<Summary, UnpackError> {
    let mut open_files: HashMap<String, File> = HashMap::new();
    let mut listed: HashSet<String> = HashSet::new();
    let mut summary = Summary::default();

    while let Some(chunk) = read_chunk(stream)? {
        let raw_path = match &chunk {
            Chunk::Payload { path, .. } | Chunk::Eof { path } => path.clone(),
        };
        let path = util::normalize_path(&raw_path);
        let entry = make_entry(&path, chunk_offset(&chunk));

        if filtered(&entry, filter) {
            debug!(path = %entry.path, "skipping");
            continue;
        }
        if options.list_contents {
            if listed.insert(entry.path.clone()) {
                writeln!(list_output, "{}", entry.path)?;
            }
            continue;
        }

        match chunk {
            Chunk::Payload {
                offset, payload, ..
            } => {
                if !open_files.contains_key(&path) {
                    let target = options.destination.join(&path);
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let file = OpenOptions::new()
                        .create(true)
                        .write(true)
                        .truncate(false)
                        .open(&target)?;
                    summary.files += 1;
                    open_files.insert(path.clone(), file);
                }
                let file = open_files.get_mut(&path).expect("inserted above");
                file.seek(SeekFrom::Start(offset))?;
                file.write_all(&payload)?;
                summary.bytes += payload.len() as u64;
            }
            Chunk::Eof { .. } => {
                open_files.remove(&path);
            }
        }
    }
    Ok(summary)
}

fn chunk_offset(chunk: &Chunk) -> Option<u64> {
    match chunk {
        Chunk::Payload { offset, .. } => Some(*offset),
        Chunk::Eof { .. } => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn payload_chunk(path: &str, offset: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(XBS_MAGIC);
        out.push(0); // flags
        out.push(b'P');
        out.extend_from_slice(&(path.len() as u32).to_le_bytes());
        out.extend_from_slice(path.as_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn eof_chunk(path: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(XBS_MAGIC);
        out.push(0);
        out.push(b'E');
        out.extend_from_slice(&(path.len() as u32).to_le_bytes());
        out.extend_from_slice(path.as_bytes());
        out
    }

    fn options(dir: &std::path::Path) -> Options {
        Options {
            destination: dir.to_path_buf(),
            include_tables: vec![],
            exclude_tables: vec![],
            list_contents: false,
        }
    }

    #[test]
    fn test_reassembles_out_of_order_chunks() {
        let mut stream = Vec::new();
        stream.extend(payload_chunk("mysql/user.MYD", 6, b"world!"));
        stream.extend(payload_chunk("mysql/user.MYD", 0, b"hello "));
        stream.extend(eof_chunk("mysql/user.MYD"));

        let dir = tempfile::tempdir().unwrap();
        let filter = NameFilter::new::<String>(&[], &[]).unwrap();
        let mut sink = Vec::new();
        let summary =
            unpack(&mut stream.as_slice(), &options(dir.path()), &filter, &mut sink).unwrap();
        assert_eq!(summary.files, 1);
        assert_eq!(summary.bytes, 12);
        let written = std::fs::read(dir.path().join("mysql/user.MYD")).unwrap();
        assert_eq!(written, b"hello world!");
    }

    #[test]
    fn test_crc_mismatch_fails() {
        let mut chunk = payload_chunk("db/t.ibd", 0, b"payload");
        // corrupt one payload byte past the header
        let last = chunk.len() - 1;
        chunk[last] ^= 0xff;
        let dir = tempfile::tempdir().unwrap();
        let filter = NameFilter::new::<String>(&[], &[]).unwrap();
        let mut sink = Vec::new();
        let err = unpack(&mut chunk.as_slice(), &options(dir.path()), &filter, &mut sink)
            .unwrap_err();
        assert!(matches!(err, UnpackError::ChecksumMismatch { offset: 0, .. }));
    }

    #[test]
    fn test_list_prints_each_path_once() {
        let mut stream = Vec::new();
        stream.extend(payload_chunk("db/t.ibd", 0, b"aa"));
        stream.extend(payload_chunk("db/t.ibd", 2, b"bb"));
        stream.extend(eof_chunk("db/t.ibd"));

        let dir = tempfile::tempdir().unwrap();
        let mut opts = options(dir.path());
        opts.list_contents = true;
        let filter = NameFilter::new::<String>(&[], &[]).unwrap();
        let mut listing = Vec::new();
        unpack(&mut stream.as_slice(), &opts, &filter, &mut listing).unwrap();
        assert_eq!(String::from_utf8(listing).unwrap(), "db/t.ibd\n");
        assert!(!dir.path().join("db/t.ibd").exists());
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut stream = b"NOTMAGIC".to_vec();
        stream.extend_from_slice(&[0u8; 6]);
        let dir = tempfile::tempdir().unwrap();
        let filter = NameFilter::new::<String>(&[], &[]).unwrap();
        let mut sink = Vec::new();
        assert!(matches!(
            unpack(&mut stream.as_slice(), &options(dir.path()), &filter, &mut sink),
            Err(UnpackError::Corrupt { .. })
        ));
    }
}
