//! POSIX tar member iteration.

use std::io::{Read, Write};

use tracing::debug;

use crate::unpack::{Entry, Options, Summary, UnpackError, filtered, make_entry};
use crate::util::{self, NameFilter};

const BLOCK_SIZE: usize = 512;
const CHECKSUM_RANGE: std::ops::Range<usize> = 148..156;

/// Validate a tar header block by its checksum field, the same test
/// `tar` itself applies when sniffing.
pub fn is_tar_header(header: &[u8]) -> bool {
    if header.len() < BLOCK_SIZE {
        return false;
    }
    let block = &header[..BLOCK_SIZE];
    if block.iter().all(|&b| b == 0) {
        return false;
    }
    let recorded = parse_octal(&block[CHECKSUM_RANGE]);
    let Some(recorded) = recorded else {
        return false;
    };
    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (idx, &byte) in block.iter().enumerate() {
        let byte = if CHECKSUM_RANGE.contains(&idx) {
            b' '
        } else {
            byte
        };
        unsigned += u64::from(byte);
        signed += i64::from(byte as i8);
    }
    // pre-POSIX tars computed the checksum with signed bytes
    unsigned == recorded || signed == recorded as i64
}

fn parse_octal(field: &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    let mut seen = false;
    for &byte in field {
        match byte {
            b'0'..=b'7' => {
                value = value.checked_mul(8)?.checked_add(u64::from(byte - b'0'))?;
                seen = true;
            }
            b' ' | 0 => {
                if seen {
                    break;
                }
            }
            _ => return None,
        }
    }
    seen.then_some(value)
}

/// Iterate the archive, extracting (or listing) each member.
pub fn unpack(
    stream: &mut dyn Read,
    options: &Options,
    filter: &NameFilter,
    list_output: &mut dyn Write,
) -> Result<Summary, UnpackError> {
    let mut archive = tar::Archive::new(stream);
    let mut summary = Summary::default();

    for member in archive.entries()? {
        let mut member = member?;
        let path = util::normalize_path(&String::from_utf8_lossy(&member.path_bytes()));
        let entry: Entry = make_entry(&path, None);
        if filtered(&entry, filter) {
            debug!(path = %entry.path, "skipping");
            continue;
        }
        if options.list_contents {
            writeln!(list_output, "{}", entry.path)?;
            continue;
        }
        let size = member.size();
        if member.unpack_in(&options.destination)? {
            summary.files += 1;
            summary.bytes += size;
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    /// Build a small archive in memory with the tar crate.
    fn sample_archive() -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in [
            ("ibdata1", &b"sysdata"[..]),
            ("sakila/actor.frm", b"frmdata"),
            ("world/city.frm", b"frmdata"),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn test_is_tar_header() {
        let archive = sample_archive();
        assert!(is_tar_header(&archive));
        assert!(!is_tar_header(&[0u8; 512]));
        assert!(!is_tar_header(b"XBSTCK01"));
        assert!(!is_tar_header(&archive[..100]));
    }

    #[test]
    fn test_parse_octal() {
        assert_eq!(parse_octal(b"000644 \0"), Some(0o644));
        assert_eq!(parse_octal(b"  12 "), Some(0o12));
        assert_eq!(parse_octal(b"xyz"), None);
    }

    #[test]
    fn test_unpack_with_filter() {
        let archive = sample_archive();
        let tempdir = tempfile::tempdir().unwrap();
        let options = Options {
            destination: tempdir.path().to_path_buf(),
            include_tables: vec!["sakila.*".to_string()],
            exclude_tables: vec![],
            list_contents: false,
        };
        let filter = NameFilter::new(&options.include_tables, &options.exclude_tables).unwrap();
        let mut cursor = Cursor::new(archive);
        let mut sink = Vec::new();
        let summary = unpack(&mut cursor, &options, &filter, &mut sink).unwrap();
        assert_eq!(summary.files, 2);
        assert!(tempdir.path().join("ibdata1").is_file());
        assert!(tempdir.path().join("sakila/actor.frm").is_file());
        assert!(!tempdir.path().join("world/city.frm").exists());
    }

    #[test]
    fn test_list_contents() {
        let archive = sample_archive();
        let tempdir = tempfile::tempdir().unwrap();
        let options = Options {
            destination: tempdir.path().to_path_buf(),
            include_tables: vec![],
            exclude_tables: vec![],
            list_contents: true,
        };
        let filter = NameFilter::new::<String>(&[], &[]).unwrap();
        let mut cursor = Cursor::new(archive);
        let mut listing = Vec::new();
        unpack(&mut cursor, &options, &filter, &mut listing).unwrap();
        let listing = String::from_utf8(listing).unwrap();
        assert_eq!(listing, "ibdata1\nsakila/actor.frm\nworld/city.frm\n");
        assert!(!tempdir.path().join("ibdata1").exists());
    }
}
