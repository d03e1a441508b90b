//! Formatting of column types and decoding of column defaults.
//!
//! Defaults live in the .frm "record" buffer laid out exactly as a table
//! row, so each type decodes its own binary layout: the same packings
//! the server uses for row storage (packed decimal groups, the
//! DATETIME2 `year*13+month` scheme, big-endian TIME2 with a biased
//! sign bit, and so on).

use crate::bytes::ByteReader;
use crate::frm::FrmError;
use crate::frm::charset::Charset;
use crate::frm::constants::{
    FieldFlag, GeometryType, MAX_DATETIME_WIDTH, MAX_TIME_WIDTH, MySQLType, Utype,
};
use crate::sqlfmt::{quote_bytes, quote_str};

/// Bytes needed to store 0..=9 packed decimal digits.
const DIGITS_TO_BYTES: [u32; 10] = [0, 1, 1, 2, 2, 3, 3, 4, 4, 4];

/// Everything needed to format one column's type and decode its default.
pub(crate) struct ColumnMeta<'a> {
    pub length: u32,
    pub flags: FieldFlag,
    pub unireg: Utype,
    pub type_code: MySQLType,
    pub charset: &'static Charset,
    pub table_charset: &'static Charset,
    pub labels: &'a [String],
    pub subtype: GeometryType,
}

impl ColumnMeta<'_> {
    fn fractional_scale(&self, base_width: u32) -> u32 {
        (self.length as i64 - base_width as i64 - 1).max(0) as u32
    }
}

fn charset_clause(meta: &ColumnMeta) -> String {
    let mut out = String::new();
    if meta.charset.id != meta.table_charset.id {
        out.push_str(&format!(" CHARACTER SET {}", meta.charset.name));
    }
    if !meta.charset.is_default {
        out.push_str(&format!(" COLLATE {}", meta.charset.collation));
    }
    out
}

fn format_number(name: &str, meta: &ColumnMeta) -> String {
    let mut out = name.to_string();
    if meta.length > 0 {
        out.push_str(&format!("({})", meta.length));
    }
    if !meta.flags.contains(FieldFlag::DECIMAL) {
        out.push_str(" unsigned");
    }
    if meta.flags.contains(FieldFlag::ZEROFILL) {
        out.push_str(" zerofill");
    }
    out
}

fn format_real(name: &str, meta: &ColumnMeta) -> String {
    let mut out = if meta.flags.contains(FieldFlag::DECIMAL) {
        let scale = meta.flags.scale();
        if scale > 30 {
            // NOT_FIXED_DEC: plain FLOAT/DOUBLE without (M,D)
            name.to_string()
        } else {
            format!("{name}({},{scale})", meta.length)
        }
    } else {
        format!("{name} unsigned")
    };
    if meta.flags.contains(FieldFlag::ZEROFILL) {
        out.push_str(" zerofill");
    }
    out
}

fn decimal_precision(meta: &ColumnMeta) -> (u32, u32) {
    let mut precision = meta.length;
    let scale = meta.flags.scale();
    if scale > 0 {
        precision = precision.saturating_sub(1);
    }
    if precision > 0 {
        precision -= 1;
    }
    (precision, scale)
}

fn format_labels(kind: &str, meta: &ColumnMeta) -> String {
    let body = meta
        .labels
        .iter()
        .map(|label| quote_str(label))
        .collect::<Vec<_>>()
        .join(",");
    format!("{kind}({body}){}", charset_clause(meta))
}

/// Render the SQL type of a column, including NOT NULL / AUTO_INCREMENT.
pub(crate) fn format_type(meta: &ColumnMeta) -> Result<String, FrmError> {
    let mut out = match meta.type_code {
        MySQLType::Tiny => format_number("tinyint", meta),
        MySQLType::Short => format_number("smallint", meta),
        MySQLType::Int24 => format_number("mediumint", meta),
        MySQLType::Long => format_number("int", meta),
        MySQLType::LongLong => format_number("bigint", meta),
        MySQLType::Float => format_real("float", meta),
        MySQLType::Double => format_real("double", meta),
        MySQLType::Decimal | MySQLType::NewDecimal => {
            let (precision, scale) = decimal_precision(meta);
            format!("decimal({precision},{scale})")
        }
        MySQLType::String => {
            let display = meta.length / meta.charset.maxlen;
            format!("char({display}){}", charset_clause(meta))
        }
        MySQLType::Varchar | MySQLType::VarString => {
            let display = meta.length / meta.charset.maxlen;
            format!("varchar({display}){}", charset_clause(meta))
        }
        MySQLType::Enum => format_labels("enum", meta),
        MySQLType::Set => format_labels("set", meta),
        MySQLType::TinyBlob => blob_name(meta, "tinyblob", "tinytext"),
        MySQLType::Blob => blob_name(meta, "blob", "text"),
        MySQLType::MediumBlob => blob_name(meta, "mediumblob", "mediumtext"),
        MySQLType::LongBlob => blob_name(meta, "longblob", "longtext"),
        MySQLType::Bit => format!("bit({})", meta.length),
        MySQLType::Time | MySQLType::Time2 => {
            let scale = meta.fractional_scale(MAX_TIME_WIDTH);
            if scale > 0 {
                format!("time({scale})")
            } else {
                "time".to_string()
            }
        }
        MySQLType::Timestamp | MySQLType::Timestamp2 => {
            let scale = meta.fractional_scale(MAX_DATETIME_WIDTH);
            if scale > 0 {
                format!("timestamp({scale})")
            } else {
                "timestamp".to_string()
            }
        }
        MySQLType::DateTime | MySQLType::DateTime2 => {
            let scale = meta.fractional_scale(MAX_DATETIME_WIDTH);
            if scale > 0 {
                format!("datetime({scale})")
            } else {
                "datetime".to_string()
            }
        }
        MySQLType::Year => format!("year({})", meta.length),
        MySQLType::Date | MySQLType::NewDate => "date".to_string(),
        MySQLType::Geometry => meta.subtype.sql_name().to_string(),
        MySQLType::Null => {
            return Err(FrmError::UnsupportedType {
                type_name: meta.type_code.name(),
            });
        }
    };

    if !meta.flags.contains(FieldFlag::MAYBE_NULL) {
        out.push_str(" NOT NULL");
    }
    if meta.unireg == Utype::NextNumber {
        out.push_str(" AUTO_INCREMENT");
    }
    Ok(out)
}

fn blob_name(meta: &ColumnMeta, blob: &'static str, text: &'static str) -> String {
    if meta.charset.name == "binary" {
        blob.to_string()
    } else {
        text.to_string()
    }
}

/// Decode the default value of a column from the defaults buffer,
/// positioned at the column's record offset. Returns `None` when the
/// type admits no default (blobs, geometry).
pub(crate) fn unpack_default(
    defaults: &mut ByteReader<'_>,
    meta: &ColumnMeta,
) -> Result<Option<String>, FrmError> {
    let formatted = match meta.type_code {
        MySQLType::Decimal => {
            let raw = defaults.read(meta.length as usize)?;
            quote_bytes(raw)
        }
        MySQLType::Tiny => quote_int(if meta.flags.contains(FieldFlag::DECIMAL) {
            i64::from(defaults.i8()?)
        } else {
            i64::from(defaults.u8()?)
        }),
        MySQLType::Short => quote_int(if meta.flags.contains(FieldFlag::DECIMAL) {
            i64::from(defaults.i16()?)
        } else {
            i64::from(defaults.u16()?)
        }),
        MySQLType::Int24 => quote_int(if meta.flags.contains(FieldFlag::DECIMAL) {
            i64::from(defaults.i24()?)
        } else {
            i64::from(defaults.u24()?)
        }),
        MySQLType::Long => quote_int(if meta.flags.contains(FieldFlag::DECIMAL) {
            i64::from(defaults.i32()?)
        } else {
            i64::from(defaults.u32()?)
        }),
        MySQLType::LongLong => {
            if meta.flags.contains(FieldFlag::DECIMAL) {
                quote_int(defaults.i64()?)
            } else {
                format!("'{}'", defaults.u64()?)
            }
        }
        MySQLType::NewDecimal => unpack_newdecimal(defaults, meta)?,
        MySQLType::Float => format_real_default(f64::from(defaults.f32()?)),
        MySQLType::Double => format_real_default(defaults.f64()?),
        MySQLType::Year => {
            let value = defaults.u8()?;
            if value == 0 {
                "'0000'".to_string()
            } else {
                format!("'{}'", 1900 + u32::from(value))
            }
        }
        MySQLType::NewDate => {
            let value = defaults.u24()?;
            let year = value >> 9;
            let month = (value >> 5) & 15;
            let day = value & 31;
            format!("'{year:04}-{month:02}-{day:02}'")
        }
        MySQLType::Time => {
            let value = defaults.u24()?;
            format!("'{}:{}:{}'", value / 10000, value / 100 % 100, value % 100)
        }
        MySQLType::Time2 => unpack_time2(defaults, meta)?,
        MySQLType::Timestamp => {
            let epoch = defaults.i32()?;
            timestamp_default(meta, &format_epoch(i64::from(epoch)), 0)
        }
        MySQLType::Timestamp2 => unpack_timestamp2(defaults, meta)?,
        MySQLType::DateTime => {
            let mut value = defaults.u64()?;
            let second = value % 100;
            value /= 100;
            let minute = value % 100;
            value /= 100;
            let hour = value % 100;
            value /= 100;
            let day = value % 100;
            value /= 100;
            let month = value % 100;
            value /= 100;
            let year = value;
            format!("'{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}'")
        }
        MySQLType::DateTime2 => unpack_datetime2(defaults, meta)?,
        MySQLType::Enum => {
            let index = if meta.labels.len() < 256 {
                usize::from(defaults.u8()?)
            } else {
                usize::from(defaults.u16()?)
            };
            match index.checked_sub(1).and_then(|idx| meta.labels.get(idx)) {
                Some(label) => quote_str(label),
                None => "''".to_string(),
            }
        }
        MySQLType::Set => unpack_set(defaults, meta)?,
        MySQLType::Bit => {
            let nbytes = (meta.length as usize).div_ceil(8).clamp(1, 8);
            let value = defaults.uint_be(nbytes)?;
            format!("b'{value:b}'")
        }
        MySQLType::Varchar => {
            let raw = read_varchar(defaults, meta)?;
            quote_bytes(raw)
        }
        MySQLType::VarString => {
            let raw = read_varchar(defaults, meta)?;
            quote_bytes(strip_trailing_spaces(raw))
        }
        MySQLType::String => {
            let raw = defaults.read(meta.length as usize)?;
            quote_bytes(strip_trailing_spaces(raw))
        }
        MySQLType::Null
        | MySQLType::TinyBlob
        | MySQLType::MediumBlob
        | MySQLType::LongBlob
        | MySQLType::Blob
        | MySQLType::Geometry => return Ok(None),
        MySQLType::Date => {
            // pre-4.1 date storage; never produced by the versions that
            // write parseable .frm files
            return Err(FrmError::UnsupportedType {
                type_name: meta.type_code.name(),
            });
        }
    };
    Ok(Some(formatted))
}

fn quote_int(value: i64) -> String {
    format!("'{value}'")
}

/// FLOAT and DOUBLE defaults render as the double-precision value's
/// shortest decimal form (a FLOAT is widened first, so its stored
/// excess digits show through), always carrying a decimal point, with
/// trailing zeros stripped: 2.0 -> '2.' and 0.5 -> '0.5'.
fn format_real_default(value: f64) -> String {
    let mut repr = format!("{value}");
    if value.is_finite() && !repr.contains('.') {
        repr.push_str(".0");
    }
    format!("'{}'", repr.trim_end_matches('0'))
}

fn read_varchar<'a>(
    defaults: &mut ByteReader<'a>,
    meta: &ColumnMeta,
) -> Result<&'a [u8], FrmError> {
    let len = if meta.length < 256 {
        usize::from(defaults.u8()?)
    } else {
        usize::from(defaults.u16()?)
    };
    Ok(defaults.read(len)?)
}

fn strip_trailing_spaces(raw: &[u8]) -> &[u8] {
    let end = raw
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |idx| idx + 1);
    &raw[..end]
}

fn unpack_set(defaults: &mut ByteReader<'_>, meta: &ColumnMeta) -> Result<String, FrmError> {
    let mut nbytes = meta.labels.len().div_ceil(8);
    if nbytes > 4 {
        nbytes = 8;
    }
    let value = match nbytes {
        0 | 1 => u64::from(defaults.u8()?),
        2 => u64::from(defaults.u16()?),
        3 => u64::from(defaults.u24()?),
        4 => u64::from(defaults.u32()?),
        _ => defaults.u64()?,
    };
    let members: Vec<&str> = meta
        .labels
        .iter()
        .enumerate()
        .filter(|&(bit, _)| value & (1 << bit) != 0)
        .map(|(_, label)| label.as_str())
        .collect();
    Ok(quote_str(&members.join(",")))
}

/// Decode one packed-decimal group (at most 9 digits in 4 bytes). The
/// group is front-padded, and negative values arrive bit-inverted.
fn decode_decimal_group(bytes: &[u8], negative: bool) -> u32 {
    let pad = if negative { 0xff } else { 0x00 };
    let mut buf = [pad; 4];
    buf[4 - bytes.len()..].copy_from_slice(bytes);
    let value = i32::from_be_bytes(buf);
    let value = if negative { !value } else { value };
    value as u32
}

fn unpack_newdecimal(defaults: &mut ByteReader<'_>, meta: &ColumnMeta) -> Result<String, FrmError> {
    let (precision, scale) = decimal_precision(meta);
    let intg = precision.saturating_sub(scale);
    let int_bytes = (intg / 9) * 4 + DIGITS_TO_BYTES[(intg % 9) as usize];
    let frac_bytes = (scale / 9) * 4 + DIGITS_TO_BYTES[(scale % 9) as usize];
    let mut data = defaults.read((int_bytes + frac_bytes) as usize)?.to_vec();
    if data.is_empty() {
        return Ok("'0'".to_string());
    }

    let negative = data[0] & 0x80 == 0;
    data[0] ^= 0x80;
    let (int_part, frac_part) = data.split_at(int_bytes as usize);

    let mut int_digits = String::new();
    if !int_part.is_empty() {
        // a partial leading group, then full 4-byte groups
        let lead = DIGITS_TO_BYTES[(intg % 9) as usize] as usize;
        let (head, full) = int_part.split_at(lead);
        if !head.is_empty() {
            int_digits.push_str(&decode_decimal_group(head, negative).to_string());
        }
        for group in full.chunks(4) {
            int_digits.push_str(&format!("{:09}", decode_decimal_group(group, negative)));
        }
        int_digits = int_digits.trim_start_matches('0').to_string();
    }
    if int_digits.is_empty() {
        int_digits.push('0');
    }

    let mut frac_digits = String::new();
    if !frac_part.is_empty() {
        // full groups first, then a partial trailing group
        let tail = DIGITS_TO_BYTES[(scale % 9) as usize] as usize;
        let (full, last) = frac_part.split_at(frac_part.len() - tail);
        for group in full.chunks(4) {
            frac_digits.push_str(&format!("{:09}", decode_decimal_group(group, negative)));
        }
        if !last.is_empty() {
            let width = (scale % 9) as usize;
            frac_digits.push_str(&format!(
                "{:0width$}",
                decode_decimal_group(last, negative)
            ));
        }
    }

    let sign = if negative { "-" } else { "" };
    if frac_digits.is_empty() {
        Ok(format!("'{sign}{int_digits}'"))
    } else {
        Ok(format!("'{sign}{int_digits}.{frac_digits}'"))
    }
}

fn unpack_time2(defaults: &mut ByteReader<'_>, meta: &ColumnMeta) -> Result<String, FrmError> {
    let raw = defaults.read(3)?;
    let negative = raw[0] & 0x80 == 0;
    let mut value = i32::from_be_bytes([0, raw[0].wrapping_sub(0x80), raw[1], raw[2]]);
    if negative {
        value = !value;
    }
    let hour = (value >> 12) & 0x3ff;
    let minute = (value >> 6) & 0x3f;
    let second = value & 0x3f;
    let mut out = format!("{hour}:{minute}:{second}");

    let scale = meta.fractional_scale(MAX_TIME_WIDTH);
    if scale > 0 {
        let nbytes = DIGITS_TO_BYTES[scale as usize] as usize;
        let raw = defaults.read(nbytes)?;
        let pad = if negative { 0xff } else { 0x00 };
        let mut buf = [pad; 4];
        buf[4 - nbytes..].copy_from_slice(raw);
        let frac = i32::from_be_bytes(buf).unsigned_abs();
        out.push_str(&format!(".{frac:0width$}", width = scale as usize));
    }
    if negative {
        out.insert(0, '-');
    }
    Ok(format!("'{out}'"))
}

fn timestamp_default(meta: &ColumnMeta, value: &str, scale: u32) -> String {
    let scale_str = if scale > 0 {
        format!("({scale})")
    } else {
        String::new()
    };
    match meta.unireg {
        Utype::TimestampDnField => format!("CURRENT_TIMESTAMP{scale_str}"),
        Utype::TimestampUnField => {
            format!("'{value}' ON UPDATE CURRENT_TIMESTAMP{scale_str}")
        }
        Utype::TimestampDnunField => {
            format!("CURRENT_TIMESTAMP{scale_str} ON UPDATE CURRENT_TIMESTAMP{scale_str}")
        }
        _ => format!("'{value}'"),
    }
}

fn unpack_timestamp2(defaults: &mut ByteReader<'_>, meta: &ColumnMeta) -> Result<String, FrmError> {
    let epoch = defaults.i32_be()?;
    let mut value = format_epoch(i64::from(epoch));
    let scale = meta.fractional_scale(MAX_DATETIME_WIDTH);
    if scale > 0 {
        let nbytes = DIGITS_TO_BYTES[scale as usize] as usize;
        let frac = defaults.uint_be(nbytes)?;
        value.push_str(&format!(".{frac:0width$}", width = scale as usize));
    }
    Ok(timestamp_default(meta, &value, scale))
}

fn unpack_datetime2(defaults: &mut ByteReader<'_>, meta: &ColumnMeta) -> Result<String, FrmError> {
    let value = defaults.u40_be()?;
    // 1 sign bit (always set), 17 bits year*13+month, 5 bits day,
    // 5 bits hour, 6 bits minute, 6 bits second
    let year_month = (value >> 22) & 0x1ffff;
    let year = year_month / 13;
    let month = year_month % 13;
    let day = (value >> 17) & 0x1f;
    let hour = (value >> 12) & 0x1f;
    let minute = (value >> 6) & 0x3f;
    let second = value & 0x3f;
    let mut out =
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");

    let scale = meta.fractional_scale(MAX_DATETIME_WIDTH);
    if scale > 0 {
        let nbytes = DIGITS_TO_BYTES[scale as usize] as usize;
        let frac = defaults.uint_be(nbytes)?;
        out.push_str(&format!(".{frac:0width$}", width = scale as usize));
    }
    Ok(format!("'{out}'"))
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS` in UTC.
fn format_epoch(epoch: i64) -> String {
    let days = epoch.div_euclid(86400);
    let secs = epoch.rem_euclid(86400);
    let (year, month, day) = civil_from_days(days);
    format!(
        "{year:04}-{month:02}-{day:02} {:02}:{:02}:{:02}",
        secs / 3600,
        secs % 3600 / 60,
        secs % 60
    )
}

/// Proleptic Gregorian date from days since 1970-01-01.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = z.div_euclid(146097);
    let doe = z.rem_euclid(146097);
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let year = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    (if month <= 2 { year + 1 } else { year }, month, day)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frm::charset;

    fn meta(type_code: MySQLType, length: u32, flags: u16) -> ColumnMeta<'static> {
        ColumnMeta {
            length,
            flags: FieldFlag::from_bits_retain(flags),
            unireg: Utype::None,
            type_code,
            charset: charset::lookup(8).unwrap(),
            table_charset: charset::lookup(8).unwrap(),
            labels: &[],
            subtype: GeometryType::Geometry,
        }
    }

    #[test]
    fn test_integer_defaults() {
        // unsigned int 42
        let m = meta(MySQLType::Long, 10, 0);
        let mut r = ByteReader::new(&[42, 0, 0, 0]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'42'");

        // signed tinyint -1
        let m = meta(MySQLType::Tiny, 4, FieldFlag::DECIMAL.bits());
        let mut r = ByteReader::new(&[0xff]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'-1'");
    }

    #[test]
    fn test_integer_max_values_round_trip() {
        let cases: [(MySQLType, Vec<u8>, &str); 4] = [
            (MySQLType::Tiny, vec![0xff], "'255'"),
            (MySQLType::Short, vec![0xff, 0xff], "'65535'"),
            (MySQLType::Int24, vec![0xff, 0xff, 0xff], "'16777215'"),
            (MySQLType::Long, vec![0xff, 0xff, 0xff, 0xff], "'4294967295'"),
        ];
        for (type_code, data, expected) in cases {
            let m = meta(type_code, 10, 0);
            let mut r = ByteReader::new(&data);
            assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), expected);
        }
    }

    #[test]
    fn test_newdecimal_positive() {
        // decimal(4,2) default 12.34: intg=2 (1 byte), frac=2 (1 byte)
        // first byte carries the sign bit
        let m = meta(MySQLType::NewDecimal, 6, 2 << 8);
        let mut r = ByteReader::new(&[0x80 | 12, 34]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'12.34'");
    }

    #[test]
    fn test_newdecimal_negative() {
        // -12.34 is the bitwise inversion of the positive encoding
        let raw = [!(0x80u8 | 12), !34u8];
        let m = meta(MySQLType::NewDecimal, 6, 2 << 8);
        let mut r = ByteReader::new(&raw);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'-12.34'");
    }

    #[test]
    fn test_newdecimal_wide() {
        // decimal(12,0) default 1000000005: one partial group (3 digits,
        // two bytes) plus one full nine-digit group
        let m = meta(MySQLType::NewDecimal, 13, 0);
        let mut head = vec![0x80, 1];
        head.extend_from_slice(&5u32.to_be_bytes());
        let mut r = ByteReader::new(&head);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'1000000005'");
    }

    #[test]
    fn test_real_defaults() {
        let real_flags = FieldFlag::DECIMAL.bits() | (31 << FieldFlag::DEC_SHIFT);
        let m = meta(MySQLType::Double, 22, real_flags);
        let bytes = 0.5f64.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'0.5'");

        // whole values keep the decimal point after the zero strip
        let bytes = 2.0f64.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'2.'");
        let bytes = 100.0f64.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'100.'");

        // a FLOAT is widened to double, so its stored imprecision shows
        let m = meta(MySQLType::Float, 12, real_flags);
        let bytes = 0.1f32.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            unpack_default(&mut r, &m).unwrap().unwrap(),
            "'0.10000000149011612'"
        );
        let bytes = (-1.5f32).to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'-1.5'");
    }

    #[test]
    fn test_year_default() {
        let m = meta(MySQLType::Year, 4, 0);
        let mut r = ByteReader::new(&[121]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'2021'");
        let mut r = ByteReader::new(&[0]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'0000'");
    }

    #[test]
    fn test_newdate_default() {
        // 2014-06-15 -> (2014 << 9) | (6 << 5) | 15
        let packed: u32 = (2014 << 9) | (6 << 5) | 15;
        let bytes = packed.to_le_bytes();
        let m = meta(MySQLType::NewDate, 10, 0);
        let mut r = ByteReader::new(&bytes[..3]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'2014-06-15'");
    }

    #[test]
    fn test_datetime_packed_decimal() {
        let value: u64 = 20140615_123059;
        let m = meta(MySQLType::DateTime, 19, 0);
        let bytes = value.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        assert_eq!(
            unpack_default(&mut r, &m).unwrap().unwrap(),
            "'2014-06-15 12:30:59'"
        );
    }

    #[test]
    fn test_datetime2_default() {
        // 2014-06-15 12:30:59
        let ym = 2014u64 * 13 + 6;
        let packed: u64 =
            (1 << 39) | (ym << 22) | (15 << 17) | (12 << 12) | (30 << 6) | 59;
        let bytes = packed.to_be_bytes();
        let m = meta(MySQLType::DateTime2, 19, 0);
        let mut r = ByteReader::new(&bytes[3..]);
        assert_eq!(
            unpack_default(&mut r, &m).unwrap().unwrap(),
            "'2014-06-15 12:30:59'"
        );
    }

    #[test]
    fn test_timestamp_current_timestamp_variants() {
        let mut m = meta(MySQLType::Timestamp, 19, 0);
        m.unireg = Utype::TimestampDnunField;
        let mut r = ByteReader::new(&[0, 0, 0, 0]);
        assert_eq!(
            unpack_default(&mut r, &m).unwrap().unwrap(),
            "CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );

        m.unireg = Utype::None;
        let bytes = 1_000_000_000i32.to_le_bytes();
        let mut r = ByteReader::new(&bytes);
        let formatted = unpack_default(&mut r, &m).unwrap().unwrap();
        assert_eq!(formatted, "'2001-09-09 01:46:40'");
    }

    #[test]
    fn test_time2_default() {
        // 838:59:58, stored big-endian with the sign bit set
        let packed: i32 = (1 << 23) | (838 << 12) | (59 << 6) | 58;
        let bytes = packed.to_be_bytes();
        let m = meta(MySQLType::Time2, 10, 0);
        let mut r = ByteReader::new(&bytes[1..]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'838:59:58'");
    }

    #[test]
    fn test_enum_and_set_defaults() {
        let labels = vec!["red".to_string(), "green".to_string(), "blue".to_string()];
        let mut m = meta(MySQLType::Enum, 1, 0);
        m.labels = &labels;
        let mut r = ByteReader::new(&[2]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'green'");
        let mut r = ByteReader::new(&[0]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "''");

        let mut m = meta(MySQLType::Set, 1, 0);
        m.labels = &labels;
        let mut r = ByteReader::new(&[0b101]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'red,blue'");
    }

    #[test]
    fn test_bit_default() {
        let m = meta(MySQLType::Bit, 10, 0);
        let mut r = ByteReader::new(&[0x02, 0xaa]);
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "b'1010101010'");
    }

    #[test]
    fn test_string_defaults() {
        // CHAR(5) 'ab   ' strips trailing spaces
        let m = meta(MySQLType::String, 5, 0);
        let mut r = ByteReader::new(b"ab   ");
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'ab'");

        // VARCHAR is length-prefixed and keeps its spaces
        let m = meta(MySQLType::Varchar, 20, 0);
        let mut r = ByteReader::new(b"\x03a b");
        assert_eq!(unpack_default(&mut r, &m).unwrap().unwrap(), "'a b'");
    }

    #[test]
    fn test_blob_has_no_default() {
        let m = meta(MySQLType::Blob, 10, 0);
        let mut r = ByteReader::new(&[]);
        assert_eq!(unpack_default(&mut r, &m).unwrap(), None);
    }

    #[test]
    fn test_format_numeric_types() {
        let m = meta(MySQLType::Long, 10, 0);
        assert_eq!(format_type(&m).unwrap(), "int(10) unsigned NOT NULL");

        let mut m = meta(
            MySQLType::Long,
            10,
            FieldFlag::DECIMAL.bits() | FieldFlag::MAYBE_NULL.bits(),
        );
        m.unireg = Utype::NextNumber;
        assert_eq!(format_type(&m).unwrap(), "int(10) AUTO_INCREMENT");
    }

    #[test]
    fn test_format_char_scales_by_maxlen() {
        let mut m = meta(MySQLType::String, 30, FieldFlag::MAYBE_NULL.bits());
        m.charset = charset::lookup(33).unwrap(); // utf8, maxlen 3
        assert_eq!(
            format_type(&m).unwrap(),
            "char(10) CHARACTER SET utf8"
        );
    }

    #[test]
    fn test_format_temporal_scales() {
        let m = meta(MySQLType::DateTime2, 19 + 1 + 3, FieldFlag::MAYBE_NULL.bits());
        assert_eq!(format_type(&m).unwrap(), "datetime(3)");
        let m = meta(MySQLType::Time2, 10, FieldFlag::MAYBE_NULL.bits());
        assert_eq!(format_type(&m).unwrap(), "time");
    }

    #[test]
    fn test_civil_from_days() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(11_016), (2000, 2, 29));
        assert_eq!(format_epoch(0), "1970-01-01 00:00:00");
    }
}
