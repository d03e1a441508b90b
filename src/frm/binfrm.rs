//! Binary .frm parsing.
//!
//! Layout reference: sql/table.cc:open_binary_frm() and unireg.cc in
//! the MySQL server tree. All offsets are relative to the start of the
//! file; multi-byte integers are little-endian.

use std::path::Path;

use tracing::debug;

use crate::bytes::ByteReader;
use crate::frm::charset::{self, Charset};
use crate::frm::constants::{
    FieldFlag, GeometryType, HaOption, HaRowType, LegacyDbType, MySQLType, Utype,
};
use crate::frm::types::{self, ColumnMeta};
use crate::frm::{keys, tablename};
use crate::frm::{Column, FrmError, MySQLVersion, Table, TableOptions};

const HEADER_SIZE: usize = 64;
const FORMINFO_LENGTH: usize = 288;
const BYTES_PER_COLUMN: usize = 17;

/// The variable-length sections trailing the forminfo block.
struct PackedColumns<'a> {
    count: usize,
    null_count: u16,
    metadata: &'a [u8],
    names: &'a [u8],
    labels: &'a [u8],
    comments: &'a [u8],
}

/// Contents of the "extra" section: connect string, engine name,
/// partition clause, optional long table comment and fulltext parser
/// names.
struct ExtraInfo<'a> {
    connection: Option<String>,
    engine: Option<String>,
    partitions: Option<String>,
    reader: ByteReader<'a>,
}

fn parse_extra<'a>(extrainfo: &'a [u8]) -> Result<ExtraInfo<'a>, FrmError> {
    let mut reader = ByteReader::new(extrainfo);
    let mut connection = None;
    let mut engine = None;
    let mut partitions = None;
    if !extrainfo.is_empty() {
        if reader.remaining() > 0 {
            let raw = reader.bytes_prefix16()?;
            if !raw.is_empty() {
                connection = Some(String::from_utf8_lossy(raw).into_owned());
            }
        }
        if reader.remaining() > 0 {
            let raw = reader.bytes_prefix16()?;
            if !raw.is_empty() {
                engine = Some(String::from_utf8_lossy(raw).into_owned());
            }
        }
        if reader.remaining() > 0 {
            let raw = reader.bytes_prefix32()?;
            if !raw.is_empty() {
                partitions = Some(String::from_utf8_lossy(raw).into_owned());
            }
            // null terminator + autopartition flag
            reader.skip(2.min(reader.remaining()))?;
        }
    }
    Ok(ExtraInfo {
        connection,
        engine,
        partitions,
        reader,
    })
}

/// Column names are a 0xff separated list with one leading and two
/// trailing framing bytes.
fn unpack_column_names(names: &[u8]) -> Vec<String> {
    if names.len() < 3 {
        return Vec::new();
    }
    names[1..names.len() - 2]
        .split(|&b| b == 0xff)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Labels are NUL separated groups of 0xff separated values, with a
/// trailing byte stripped before the split.
fn unpack_column_labels(labels: &[u8]) -> Vec<Vec<String>> {
    if labels.is_empty() {
        return Vec::new();
    }
    labels[..labels.len() - 1]
        .split(|&b| b == 0)
        .map(|group| {
            if group.len() < 2 {
                return Vec::new();
            }
            group[1..group.len() - 1]
                .split(|&b| b == 0xff)
                .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                .collect()
        })
        .collect()
}

/// Walks the NULL bitmap at the head of the defaults record.
struct NullBitmap<'a> {
    map: &'a [u8],
    bit: usize,
}

impl NullBitmap<'_> {
    fn next(&mut self) -> bool {
        let offset = self.bit / 8;
        let bit = self.bit % 8;
        self.bit += 1;
        self.map
            .get(offset)
            .is_some_and(|byte| byte & (1 << bit) != 0)
    }
}

struct ColumnRecord {
    length: u32,
    flags: FieldFlag,
    unireg: Utype,
    type_code: MySQLType,
    charset: &'static Charset,
    subtype: GeometryType,
    label_group: usize,
    defaults_offset: usize,
    comment_length: usize,
}

fn read_column_record(metadata: &mut ByteReader<'_>) -> Result<ColumnRecord, FrmError> {
    let base = metadata.tell();
    let length = u32::from(metadata.u16_at(base + 3)?);
    let flags = FieldFlag::from_bits_retain(metadata.u16_at(base + 8)?);
    let unireg_code = metadata.u8_at(base + 10)?;
    let unireg = Utype::from_code(unireg_code)
        .ok_or(FrmError::UnknownUnireg { code: unireg_code })?;
    let type_byte = metadata.u8_at(base + 13)?;
    let type_code =
        MySQLType::from_code(type_byte).ok_or(FrmError::UnknownType { code: type_byte })?;
    let label_group = usize::from(metadata.u8_at(base + 12)?);
    let defaults_offset = metadata.u24_at(base + 5)? as usize;
    let comment_length = usize::from(metadata.u16_at(base + 15)?);

    let (charset_id, subtype) = if type_code == MySQLType::Geometry {
        let code = metadata.u8_at(base + 14)?;
        let subtype = GeometryType::from_code(code).ok_or_else(|| FrmError::BadTable {
            reason: format!("unknown geometry subtype {code}"),
        })?;
        (63u16, subtype)
    } else {
        let hi = u16::from(metadata.u8_at(base + 11)?);
        let lo = u16::from(metadata.u8_at(base + 14)?);
        ((hi << 8) | lo, GeometryType::Geometry)
    };
    let charset = charset::lookup(charset_id).ok_or(FrmError::UnknownCharset { id: charset_id })?;
    metadata.skip(BYTES_PER_COLUMN)?;

    Ok(ColumnRecord {
        length,
        flags,
        unireg,
        type_code,
        charset,
        subtype,
        label_group,
        defaults_offset: defaults_offset.saturating_sub(1),
        comment_length,
    })
}

fn unpack_columns(
    packed: &PackedColumns<'_>,
    defaults: &[u8],
    table_charset: &'static Charset,
    handler_options: HaOption,
) -> Result<Vec<Column>, FrmError> {
    let names = unpack_column_names(packed.names);
    let label_groups = unpack_column_labels(packed.labels);
    if names.len() != packed.count {
        debug!(
            expected = packed.count,
            found = names.len(),
            "column name count disagrees with forminfo"
        );
    }

    let mut metadata = ByteReader::new(packed.metadata);
    let mut comments = ByteReader::new(packed.comments);
    let mut defaults_reader = ByteReader::new(defaults);

    let null_bytes = (usize::from(packed.null_count) + 1).div_ceil(8);
    let null_map = if defaults.len() >= null_bytes {
        &defaults[..null_bytes]
    } else {
        &[][..]
    };
    let mut null_bitmap = NullBitmap {
        map: null_map,
        bit: if handler_options.contains(HaOption::PACK_RECORD) {
            0
        } else {
            1
        },
    };

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let record = read_column_record(&mut metadata)?;

        let labels: Vec<String> = if matches!(record.type_code, MySQLType::Enum | MySQLType::Set) {
            // label group ids are 1-based
            record
                .label_group
                .checked_sub(1)
                .and_then(|idx| label_groups.get(idx))
                .cloned()
                .ok_or_else(|| FrmError::BadTable {
                    reason: format!("column '{name}' references missing label group"),
                })?
        } else {
            Vec::new()
        };

        let meta = ColumnMeta {
            length: record.length,
            flags: record.flags,
            unireg: record.unireg,
            type_code: record.type_code,
            charset: record.charset,
            table_charset,
            labels: &labels,
            subtype: record.subtype,
        };

        let default = if record.flags.contains(FieldFlag::NO_DEFAULT)
            || record.unireg == Utype::NextNumber
        {
            None
        } else {
            let is_null = if record.flags.contains(FieldFlag::MAYBE_NULL) {
                null_bitmap.next()
            } else {
                false
            };
            if is_null && record.unireg != Utype::BlobField {
                Some("NULL".to_string())
            } else if record.unireg == Utype::BlobField {
                // some forks omit the NO_DEFAULT flag on blobs
                None
            } else {
                defaults_reader.at(record.defaults_offset, |r| types::unpack_default(r, &meta))?
            }
        };

        let type_name = types::format_type(&meta)?;
        let comment = String::from_utf8_lossy(comments.read(record.comment_length)?).into_owned();

        columns.push(Column {
            name,
            type_code: record.type_code,
            type_name,
            length: record.length,
            flags: record.flags,
            unireg: record.unireg,
            default,
            comment,
            charset: record.charset,
            labels,
        });
    }
    Ok(columns)
}

/// Parse a binary .frm into a [`Table`].
pub fn parse(path: &Path, data: &[u8]) -> Result<Table, FrmError> {
    let mut r = ByteReader::new(data);
    if r.read(2)? != [0xfe, 0x01] {
        return Err(FrmError::InvalidFormat);
    }

    let mysql_version = MySQLVersion::from_version_id(r.u32_at(0x0033)?);

    let keyinfo_offset = usize::from(r.u16_at(0x0006)?);
    let mut keyinfo_length = usize::from(r.u16_at(0x000e)?);
    if keyinfo_length == 0xffff {
        keyinfo_length = r.u32_at(0x002f)? as usize;
    }

    let defaults_offset = keyinfo_offset + keyinfo_length;
    let defaults_length = usize::from(r.u16_at(0x0010)?);

    let extrainfo_offset = defaults_offset + defaults_length;
    let extrainfo_length = r.u32_at(0x0037)? as usize;

    let names_length = usize::from(r.u16_at(0x0004)?);
    let forminfo_offset = r.u32_at(HEADER_SIZE + names_length)? as usize;

    let screens_length = usize::from(r.u16_at(forminfo_offset + 260)?);
    let null_count = r.u16_at(forminfo_offset + 282)?;
    let column_count = usize::from(r.u16_at(forminfo_offset + 258)?);
    let col_names_length = usize::from(r.u16_at(forminfo_offset + 268)?);
    let labels_length = usize::from(r.u16_at(forminfo_offset + 274)?);
    let comments_length = usize::from(r.u16_at(forminfo_offset + 284)?);

    let metadata_offset = forminfo_offset + FORMINFO_LENGTH + screens_length;
    let metadata_length = BYTES_PER_COLUMN * column_count;

    let metadata = r.read_at(metadata_length, metadata_offset)?;
    let names = r.read_at(col_names_length, metadata_offset + metadata_length)?;
    let labels = r.read_at(labels_length, metadata_offset + metadata_length + col_names_length)?;
    let comments = r.read_at(
        comments_length,
        metadata_offset + metadata_length + col_names_length + labels_length,
    )?;
    let packed = PackedColumns {
        count: column_count,
        null_count,
        metadata,
        names,
        labels,
        comments,
    };

    let keyinfo = r.read_at(keyinfo_length, keyinfo_offset)?;
    let defaults = r.read_at(defaults_length, defaults_offset)?;
    let extrainfo = r.read_at(extrainfo_length, extrainfo_offset)?;

    let charset_id = u16::from(r.u8_at(0x0026)?);
    let table_charset =
        charset::lookup(charset_id).ok_or(FrmError::UnknownCharset { id: charset_id })?;

    let handler_options = HaOption::from_bits_retain(r.u16_at(0x001e)?);
    let extra = parse_extra(extrainfo)?;

    let engine = match extra.engine.as_deref() {
        None | Some("") => LegacyDbType(r.u8_at(0x0003)?).name().to_string(),
        Some("partition") => {
            // the underlying engine of a partitioned table
            LegacyDbType(r.u8_at(0x003d)?).name().to_string()
        }
        Some(other) => other.to_string(),
    };

    let columns = unpack_columns(&packed, defaults, table_charset, handler_options)?;

    // the extra reader now sits past the partition clause; the long
    // table comment (if flagged) precedes the parser names
    let mut extra_reader = extra.reader;
    let comment_length = r.u8_at(forminfo_offset + 46)?;
    let table_comment = if comment_length != 0xff {
        let raw = r.read_at(usize::from(comment_length), forminfo_offset + 47)?;
        String::from_utf8_lossy(raw).into_owned()
    } else {
        String::from_utf8_lossy(extra_reader.bytes_prefix16()?).into_owned()
    };

    let keys = keys::unpack_keys(keyinfo, &columns, &mut extra_reader)?;

    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or(FrmError::NotFrm)?;
    let name = tablename::decode(stem)?;

    let options = TableOptions {
        connection: extra.connection,
        engine,
        charset: table_charset,
        min_rows: r.u32_at(0x0016)?,
        max_rows: r.u32_at(0x0012)?,
        avg_row_length: r.u32_at(0x0022)?,
        row_format: HaRowType(r.u8_at(0x0028)?),
        key_block_size: r.u16_at(0x003e)?,
        comment: if table_comment.is_empty() {
            None
        } else {
            Some(table_comment)
        },
        partitions: extra.partitions,
        handler_options,
    };

    Ok(Table {
        name,
        mysql_version,
        charset: table_charset,
        options,
        columns,
        keys,
    })
}
