use std::path::Path;

use dbsake::frm::{self, DumpOptions, FrmObject};

/// Write a little-endian u16 at an absolute offset.
fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u24(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 3].copy_from_slice(&value.to_le_bytes()[..3]);
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Keyinfo section: a single PRIMARY key over 1-based field numbers.
fn build_keyinfo(parts: &[(u16, u16)]) -> Vec<u8> {
    let mut buf = vec![1u8, parts.len() as u8, 0, 0];
    let mut names = vec![0xffu8];
    names.extend_from_slice(b"PRIMARY");
    names.push(0xff);
    buf.extend_from_slice(&((names.len() + 1) as u16).to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // flags (bit 0 inverted)
    buf.extend_from_slice(&0u16.to_le_bytes()); // key length
    buf.push(parts.len() as u8);
    buf.push(0); // algorithm: undefined
    buf.extend_from_slice(&0u16.to_le_bytes()); // block size
    for &(fieldnr, length) in parts {
        buf.extend_from_slice(&fieldnr.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes()); // record offset
        buf.push(0); // flags
        buf.extend_from_slice(&0u16.to_le_bytes()); // key type
        buf.extend_from_slice(&length.to_le_bytes());
    }
    buf.extend_from_slice(&names);
    buf.push(0);
    buf
}

struct ColumnSpec {
    name: &'static str,
    length: u16,
    recpos: u32,
    flags: u16,
    unireg: u8,
    type_code: u8,
    charset_lo: u8,
}

fn build_metadata(columns: &[ColumnSpec]) -> Vec<u8> {
    let mut buf = vec![0u8; 17 * columns.len()];
    for (idx, column) in columns.iter().enumerate() {
        let base = idx * 17;
        put_u16(&mut buf, base + 3, column.length);
        put_u24(&mut buf, base + 5, column.recpos);
        put_u16(&mut buf, base + 8, column.flags);
        buf[base + 10] = column.unireg;
        buf[base + 11] = 0; // charset high byte
        buf[base + 12] = 0; // label group
        buf[base + 13] = column.type_code;
        buf[base + 14] = column.charset_lo;
        put_u16(&mut buf, base + 15, 0); // comment length
    }
    buf
}

fn build_column_names(names: &[&str]) -> Vec<u8> {
    let mut buf = vec![0xffu8];
    for (idx, name) in names.iter().enumerate() {
        if idx > 0 {
            buf.push(0xff);
        }
        buf.extend_from_slice(name.as_bytes());
    }
    buf.push(0xff);
    buf.push(0x00);
    buf
}

/// Assemble a complete binary .frm for:
///   CREATE TABLE `t1` (
///     `id` int(10) unsigned NOT NULL AUTO_INCREMENT,
///     `name` varchar(45) NOT NULL DEFAULT 'abc',
///     `score` double NOT NULL DEFAULT '2.5',
///     PRIMARY KEY (`id`)
///   ) ENGINE=InnoDB DEFAULT CHARSET=latin1
fn build_fixture_frm() -> Vec<u8> {
    const NAMES_LENGTH: usize = 4;
    const HEADER: usize = 64;
    let keyinfo = build_keyinfo(&[(1, 4)]);
    let keyinfo_offset = HEADER + NAMES_LENGTH + 4;

    // defaults record: 1 null byte, 4 bytes for id, 1+45 for name,
    // 8 for score
    let mut defaults = vec![0u8; 59];
    defaults[5] = 3;
    defaults[6..9].copy_from_slice(b"abc");
    defaults[51..59].copy_from_slice(&2.5f64.to_le_bytes());

    // DOUBLE without (M,D): signed, scale byte at NOT_FIXED_DEC
    let real_flags: u16 = 1 | (31 << 8);
    let columns = [
        ColumnSpec {
            name: "id",
            length: 10,
            recpos: 2,
            flags: 0,
            unireg: 15, // NEXT_NUMBER
            type_code: 3, // LONG
            charset_lo: 63,
        },
        ColumnSpec {
            name: "name",
            length: 45,
            recpos: 6,
            flags: 0,
            unireg: 0,
            type_code: 15, // VARCHAR
            charset_lo: 8, // latin1
        },
        ColumnSpec {
            name: "score",
            length: 22,
            recpos: 52,
            flags: real_flags,
            unireg: 0,
            type_code: 5, // DOUBLE
            charset_lo: 63,
        },
    ];
    let metadata = build_metadata(&columns);
    let column_names = build_column_names(&["id", "name", "score"]);

    let defaults_offset = keyinfo_offset + keyinfo.len();
    let forminfo_offset = defaults_offset + defaults.len();
    let metadata_offset = forminfo_offset + 288;

    let total = metadata_offset + metadata.len() + column_names.len();
    let mut frm = vec![0u8; total];

    // header
    frm[0] = 0xfe;
    frm[1] = 0x01;
    frm[3] = 12; // legacy_db_type: InnoDB
    put_u16(&mut frm, 0x0004, NAMES_LENGTH as u16);
    put_u16(&mut frm, 0x0006, keyinfo_offset as u16);
    put_u16(&mut frm, 0x000e, keyinfo.len() as u16);
    put_u16(&mut frm, 0x0010, defaults.len() as u16);
    frm[0x0026] = 8; // latin1_swedish_ci
    put_u32(&mut frm, 0x0033, 50626);
    put_u32(&mut frm, 0x0037, 0); // no extra section

    // forminfo pointer lives right after the names block
    put_u32(&mut frm, HEADER + NAMES_LENGTH, forminfo_offset as u32);

    frm[keyinfo_offset..keyinfo_offset + keyinfo.len()].copy_from_slice(&keyinfo);
    frm[defaults_offset..defaults_offset + defaults.len()].copy_from_slice(&defaults);

    put_u16(&mut frm, forminfo_offset + 258, columns.len() as u16);
    put_u16(&mut frm, forminfo_offset + 260, 0); // screens
    put_u16(&mut frm, forminfo_offset + 268, column_names.len() as u16);
    put_u16(&mut frm, forminfo_offset + 274, 0); // labels
    put_u16(&mut frm, forminfo_offset + 282, 0); // nullable fields
    put_u16(&mut frm, forminfo_offset + 284, 0); // comments

    frm[metadata_offset..metadata_offset + metadata.len()].copy_from_slice(&metadata);
    let names_at = metadata_offset + metadata.len();
    frm[names_at..names_at + column_names.len()].copy_from_slice(&column_names);
    frm
}

#[test]
fn binary_frm_renders_expected_ddl() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t1.frm");
    std::fs::write(&path, build_fixture_frm()).unwrap();

    let object = frm::parse(&path).unwrap();
    let FrmObject::Table(table) = &object else {
        panic!("expected a table");
    };
    assert_eq!(table.name, "t1");
    assert_eq!(table.mysql_version.to_string(), "5.6.26");

    let ddl = object.format(&DumpOptions::default());
    let expected = "\
--
-- Table structure for table `t1`
-- Created with MySQL Version 5.6.26
--

CREATE TABLE `t1` (
  `id` int(10) unsigned NOT NULL AUTO_INCREMENT,
  `name` varchar(45) NOT NULL DEFAULT 'abc',
  `score` double NOT NULL DEFAULT '2.5',
  PRIMARY KEY (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=latin1;
";
    assert_eq!(ddl, expected);
}

#[test]
fn type_codes_annotate_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t1.frm");
    std::fs::write(&path, build_fixture_frm()).unwrap();

    let object = frm::parse(&path).unwrap();
    let ddl = object.format(&DumpOptions {
        type_codes: true,
        replace: false,
    });
    assert!(ddl.contains("`id` int(10) unsigned NOT NULL AUTO_INCREMENT /* MYSQL_TYPE_LONG */"));
    assert!(ddl.contains("/* MYSQL_TYPE_VARCHAR */"));
}

#[test]
fn encoded_file_names_decode_in_table_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("t@002d1.frm");
    std::fs::write(&path, build_fixture_frm()).unwrap();

    let object = frm::parse(&path).unwrap();
    assert_eq!(object.name(), "t-1");
}

#[test]
fn view_frm_dispatches_to_view_parser() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("v.frm");
    // md5 of "SELECT 1 AS one"
    let contents = "TYPE=VIEW\nquery=SELECT 1 AS one\nmd5=4ca5ee67225bbf83b9e9ef995a08dfce\n\
                    algorithm=0\ndefiner_user=root\ndefiner_host=localhost\nsuid=2\n\
                    with_check_option=0\ntimestamp=2014-06-18 16:38:15\n";
    std::fs::write(&path, contents).unwrap();

    let object = frm::parse(&path).unwrap();
    let ddl = object.format(&DumpOptions::default());
    assert!(ddl.ends_with(
        "CREATE ALGORITHM=UNDEFINED DEFINER=`root`@`localhost` \
         SQL SECURITY DEFINER VIEW `v` AS SELECT 1 AS one;\n"
    ));

    let replaced = object.format(&DumpOptions {
        type_codes: false,
        replace: true,
    });
    assert!(replaced.contains("CREATE OR REPLACE ALGORITHM=UNDEFINED"));
}

#[test]
fn garbage_files_are_invalid_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("junk.frm");
    std::fs::write(&path, b"this is not a table definition").unwrap();
    let err = frm::parse(&path).unwrap_err();
    assert!(err.to_string().contains("unrecognized .frm magic"));
    assert_eq!(err.path, path);

    let not_frm = dir.path().join("t1.ibd");
    std::fs::write(&not_frm, b"x").unwrap();
    assert!(frm::parse(Path::new(&not_frm)).is_err());
}
