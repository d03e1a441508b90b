use std::io::Cursor;
use std::io::Read;

use dbsake::compression::InputStream;
use dbsake::unpack::{self, Options, UnpackError};
use dbsake::util::PeekReader;

fn plain_stream(data: Vec<u8>) -> InputStream {
    InputStream::Plain(
        PeekReader::new(Box::new(Cursor::new(data)) as Box<dyn Read + Send>, 0).unwrap(),
    )
}

fn tar_archive() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in [
        ("backup-my.cnf", &b"[mysqld]\n"[..]),
        ("sakila/actor.frm", b"frm bytes"),
        ("sakila/actor.ibd", b"ibd bytes"),
        ("world/city.frm", b"frm bytes"),
    ] {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn xbs_payload(path: &str, offset: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"XBSTCK01");
    out.push(0);
    out.push(b'P');
    out.extend_from_slice(&(path.len() as u32).to_le_bytes());
    out.extend_from_slice(path.as_bytes());
    out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn xbs_eof(path: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"XBSTCK01");
    out.push(0);
    out.push(b'E');
    out.extend_from_slice(&(path.len() as u32).to_le_bytes());
    out.extend_from_slice(path.as_bytes());
    out
}

#[test]
fn sniffs_and_unpacks_tar() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options {
        destination: dir.path().to_path_buf(),
        include_tables: vec!["sakila.*".to_string()],
        exclude_tables: vec![],
        list_contents: false,
    };
    let mut sink = Vec::new();
    let summary = unpack::unpack(&options, plain_stream(tar_archive()), &mut sink).unwrap();
    // the required file plus both sakila table files
    assert_eq!(summary.files, 3);
    assert!(dir.path().join("backup-my.cnf").is_file());
    assert!(dir.path().join("sakila/actor.frm").is_file());
    assert!(dir.path().join("sakila/actor.ibd").is_file());
    assert!(!dir.path().join("world/city.frm").exists());
}

#[test]
fn sniffs_and_unpacks_xbstream() {
    let mut stream = Vec::new();
    stream.extend(xbs_payload("mysql/user.frm", 0, b"abcd"));
    stream.extend(xbs_payload("mysql/user.frm", 4, b"efgh"));
    stream.extend(xbs_eof("mysql/user.frm"));

    let dir = tempfile::tempdir().unwrap();
    let options = Options {
        destination: dir.path().to_path_buf(),
        include_tables: vec![],
        exclude_tables: vec![],
        list_contents: false,
    };
    let mut sink = Vec::new();
    let summary = unpack::unpack(&options, plain_stream(stream), &mut sink).unwrap();
    assert_eq!(summary.files, 1);
    assert_eq!(summary.bytes, 8);
    assert_eq!(
        std::fs::read(dir.path().join("mysql/user.frm")).unwrap(),
        b"abcdefgh"
    );
}

#[test]
fn list_contents_prints_paths_without_extracting() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options {
        destination: dir.path().to_path_buf(),
        include_tables: vec![],
        exclude_tables: vec![],
        list_contents: true,
    };
    let mut listing = Vec::new();
    unpack::unpack(&options, plain_stream(tar_archive()), &mut listing).unwrap();
    let listing = String::from_utf8(listing).unwrap();
    assert!(listing.contains("sakila/actor.frm\n"));
    assert!(listing.contains("backup-my.cnf\n"));
    assert!(!dir.path().join("sakila").exists());
}

#[test]
fn unknown_format_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let options = Options {
        destination: dir.path().to_path_buf(),
        include_tables: vec![],
        exclude_tables: vec![],
        list_contents: false,
    };
    let mut sink = Vec::new();
    let err = unpack::unpack(
        &options,
        plain_stream(b"not an archive at all".to_vec()),
        &mut sink,
    )
    .unwrap_err();
    assert!(matches!(err, UnpackError::UnknownFormat));
}
