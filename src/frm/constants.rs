//! Constants shared across .frm parsing.
//!
//! The enums below mirror the numeric codes MySQL writes into the .frm
//! header and per-column metadata (include/mysql_com.h, sql/field.h and
//! include/my_base.h in the server tree).

use bitflags::bitflags;

// from sql/sql_const.h
pub const MAX_TIME_WIDTH: u32 = 10;
pub const MAX_DATETIME_WIDTH: u32 = 19;

/// Column type codes (enum enum_field_types).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MySQLType {
    Decimal,
    Tiny,
    Short,
    Long,
    Float,
    Double,
    Null,
    Timestamp,
    LongLong,
    Int24,
    Date,
    Time,
    DateTime,
    Year,
    NewDate,
    Varchar,
    Bit,
    Timestamp2,
    DateTime2,
    Time2,
    NewDecimal,
    Enum,
    Set,
    TinyBlob,
    MediumBlob,
    LongBlob,
    Blob,
    VarString,
    String,
    Geometry,
}

impl MySQLType {
    pub fn from_code(code: u8) -> Option<MySQLType> {
        Some(match code {
            0 => MySQLType::Decimal,
            1 => MySQLType::Tiny,
            2 => MySQLType::Short,
            3 => MySQLType::Long,
            4 => MySQLType::Float,
            5 => MySQLType::Double,
            6 => MySQLType::Null,
            7 => MySQLType::Timestamp,
            8 => MySQLType::LongLong,
            9 => MySQLType::Int24,
            10 => MySQLType::Date,
            11 => MySQLType::Time,
            12 => MySQLType::DateTime,
            13 => MySQLType::Year,
            14 => MySQLType::NewDate,
            15 => MySQLType::Varchar,
            16 => MySQLType::Bit,
            17 => MySQLType::Timestamp2,
            18 => MySQLType::DateTime2,
            19 => MySQLType::Time2,
            246 => MySQLType::NewDecimal,
            247 => MySQLType::Enum,
            248 => MySQLType::Set,
            249 => MySQLType::TinyBlob,
            250 => MySQLType::MediumBlob,
            251 => MySQLType::LongBlob,
            252 => MySQLType::Blob,
            253 => MySQLType::VarString,
            254 => MySQLType::String,
            255 => MySQLType::Geometry,
            _ => return None,
        })
    }

    /// The MYSQL_TYPE_* suffix, used by `frmdump --type-codes`.
    pub fn name(self) -> &'static str {
        match self {
            MySQLType::Decimal => "DECIMAL",
            MySQLType::Tiny => "TINY",
            MySQLType::Short => "SHORT",
            MySQLType::Long => "LONG",
            MySQLType::Float => "FLOAT",
            MySQLType::Double => "DOUBLE",
            MySQLType::Null => "NULL",
            MySQLType::Timestamp => "TIMESTAMP",
            MySQLType::LongLong => "LONGLONG",
            MySQLType::Int24 => "INT24",
            MySQLType::Date => "DATE",
            MySQLType::Time => "TIME",
            MySQLType::DateTime => "DATETIME",
            MySQLType::Year => "YEAR",
            MySQLType::NewDate => "NEWDATE",
            MySQLType::Varchar => "VARCHAR",
            MySQLType::Bit => "BIT",
            MySQLType::Timestamp2 => "TIMESTAMP2",
            MySQLType::DateTime2 => "DATETIME2",
            MySQLType::Time2 => "TIME2",
            MySQLType::NewDecimal => "NEWDECIMAL",
            MySQLType::Enum => "ENUM",
            MySQLType::Set => "SET",
            MySQLType::TinyBlob => "TINY_BLOB",
            MySQLType::MediumBlob => "MEDIUM_BLOB",
            MySQLType::LongBlob => "LONG_BLOB",
            MySQLType::Blob => "BLOB",
            MySQLType::VarString => "VAR_STRING",
            MySQLType::String => "STRING",
            MySQLType::Geometry => "GEOMETRY",
        }
    }

    pub fn is_blob(self) -> bool {
        matches!(
            self,
            MySQLType::TinyBlob | MySQLType::MediumBlob | MySQLType::LongBlob | MySQLType::Blob
        )
    }
}

/// Per-column unireg_check codes (enum utype in sql/field.h).
///
/// Only a few matter for DDL output: NEXT_NUMBER flags AUTO_INCREMENT,
/// BLOB_FIELD suppresses defaults, and the TIMESTAMP_*_FIELD values
/// select the CURRENT_TIMESTAMP default/on-update combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utype {
    None,
    Date,
    Shield,
    NoEmpty,
    CaseUp,
    Pnr,
    Bgnr,
    Pgnr,
    Yes,
    No,
    Rel,
    Check,
    Empty,
    UnknownField,
    CaseDn,
    NextNumber,
    IntervalField,
    BitField,
    TimestampOldField,
    Capitalize,
    BlobField,
    TimestampDnField,
    TimestampUnField,
    TimestampDnunField,
}

impl Utype {
    pub fn from_code(code: u8) -> Option<Utype> {
        Some(match code {
            0 => Utype::None,
            1 => Utype::Date,
            2 => Utype::Shield,
            3 => Utype::NoEmpty,
            4 => Utype::CaseUp,
            5 => Utype::Pnr,
            6 => Utype::Bgnr,
            7 => Utype::Pgnr,
            8 => Utype::Yes,
            9 => Utype::No,
            10 => Utype::Rel,
            11 => Utype::Check,
            12 => Utype::Empty,
            13 => Utype::UnknownField,
            14 => Utype::CaseDn,
            15 => Utype::NextNumber,
            16 => Utype::IntervalField,
            17 => Utype::BitField,
            18 => Utype::TimestampOldField,
            19 => Utype::Capitalize,
            20 => Utype::BlobField,
            21 => Utype::TimestampDnField,
            22 => Utype::TimestampUnField,
            23 => Utype::TimestampDnunField,
            _ => return None,
        })
    }
}

/// Legacy storage engine codes (enum legacy_db_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyDbType(pub u8);

impl LegacyDbType {
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "UNKNOWN",
            1 => "DIAB_ISAM",
            2 => "HASH",
            3 => "MISAM",
            4 => "PISAM",
            5 => "RMS_ISAM",
            6 => "HEAP",
            7 => "ISAM",
            8 => "MRG_ISAM",
            9 => "MyISAM",
            10 => "MRG_MYISAM",
            11 => "BERKELEYDB",
            12 => "InnoDB",
            13 => "GEMINI",
            14 => "NDBCLUSTER",
            15 => "EXAMPLE_DB",
            16 => "ARCHIVE_DB",
            17 => "CSV",
            18 => "FEDERATED",
            19 => "BLACKHOLE",
            20 => "PARTITION_DB",
            21 => "BINLOG",
            22 => "SOLID",
            23 => "PBXT",
            24 => "TABLE_FUNCTION",
            25 => "MEMCACHE",
            26 => "FALCON",
            27 => "MARIA",
            28 => "PERFORMANCE_SCHEMA",
            42 => "FIRST_DYNAMIC",
            127 => "DEFAULT",
            _ => "UNKNOWN",
        }
    }
}

/// ROW_FORMAT codes, including the TokuDB compression formats that
/// piggyback on the same byte. TokuDB aliases a few of its names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HaRowType(pub u8);

impl HaRowType {
    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "DEFAULT",
            1 => "FIXED",
            2 => "DYNAMIC",
            3 => "COMPRESSED",
            4 => "REDUNDANT",
            5 => "COMPACT",
            7 => "TOKUDB_UNCOMPRESSED",
            8 => "TOKUDB_ZLIB",
            9 => "TOKUDB_SNAPPY",
            10 => "TOKUDB_QUICKLZ",
            11 => "TOKUDB_LZMA",
            // TOKUDB_FAST / TOKUDB_SMALL / TOKUDB_DEFAULT alias the
            // concrete compression they select
            12 => "TOKUDB_QUICKLZ",
            13 => "TOKUDB_LZMA",
            14 => "TOKUDB_ZLIB",
            _ => "?",
        }
    }

    pub fn is_default(self) -> bool {
        self.0 == 0
    }
}

/// GEOMETRY column subtypes (enum geometry_type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryType {
    #[default]
    Geometry,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    pub fn from_code(code: u8) -> Option<GeometryType> {
        Some(match code {
            0 => GeometryType::Geometry,
            1 => GeometryType::Point,
            2 => GeometryType::LineString,
            3 => GeometryType::Polygon,
            4 => GeometryType::MultiPoint,
            5 => GeometryType::MultiLineString,
            6 => GeometryType::MultiPolygon,
            7 => GeometryType::GeometryCollection,
            _ => return None,
        })
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            GeometryType::Geometry => "geometry",
            GeometryType::Point => "point",
            GeometryType::LineString => "linestring",
            GeometryType::Polygon => "polygon",
            GeometryType::MultiPoint => "multipoint",
            GeometryType::MultiLineString => "multilinestring",
            GeometryType::MultiPolygon => "multipolygon",
            GeometryType::GeometryCollection => "geometrycollection",
        }
    }
}

bitflags! {
    /// Per-column field flags (FIELDFLAG_* in sql/field.h). The scale of
    /// decimal/real columns shares the upper byte (`>> DEC_SHIFT`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldFlag: u16 {
        const DECIMAL = 1;
        const NUMBER = 2;
        const ZEROFILL = 4;
        const PACK = 120;
        const INTERVAL = 256;
        const BITFIELD = 512;
        const BLOB = 1024;
        const GEOM = 2048;
        const TREAT_BIT_AS_CHAR = 4096;
        const NO_DEFAULT = 16384;
        const MAYBE_NULL = 32768;
        const _ = !0;
    }
}

impl FieldFlag {
    pub const DEC_SHIFT: u16 = 8;
    pub const MAX_DEC: u16 = 31;

    /// Decimal scale encoded in the upper byte of the flags.
    pub fn scale(self) -> u32 {
        u32::from((self.bits() >> Self::DEC_SHIFT) & Self::MAX_DEC)
    }
}

bitflags! {
    /// Table-level handler options (HA_OPTION_* in include/my_base.h),
    /// a 16-bit set at offset 0x001e of the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HaOption: u16 {
        const PACK_RECORD = 1;
        const PACK_KEYS = 2;
        const COMPRESS_RECORD = 4;
        const LONG_BLOB_PTR = 8;
        const TMP_TABLE = 16;
        const CHECKSUM = 32;
        const DELAY_KEY_WRITE = 64;
        const NO_PACK_KEYS = 128;
        const CREATE_FROM_ENGINE = 256;
        const RELIES_ON_SQL_LAYER = 512;
        const NULL_FIELDS = 1024;
        const PAGE_CHECKSUM = 2048;
        const STATS_PERSISTENT = 4096;
        const NO_STATS_PERSISTENT = 8192;
        const TEMP_COMPRESS_RECORD = 16384;
        const READ_ONLY_DATA = 32768;
    }
}

impl HaOption {
    /// PACK_KEYS tri-state: explicitly on, explicitly off, or unset.
    pub fn pack_keys(self) -> Option<u8> {
        if self.contains(HaOption::PACK_KEYS) {
            Some(1)
        } else if self.contains(HaOption::NO_PACK_KEYS) {
            Some(0)
        } else {
            None
        }
    }

    /// STATS_PERSISTENT tri-state.
    pub fn stats_persistent(self) -> Option<u8> {
        if self.contains(HaOption::STATS_PERSISTENT) {
            Some(1)
        } else if self.contains(HaOption::NO_STATS_PERSISTENT) {
            Some(0)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_type_codes_round_trip() {
        assert_eq!(MySQLType::from_code(3), Some(MySQLType::Long));
        assert_eq!(MySQLType::from_code(246), Some(MySQLType::NewDecimal));
        assert_eq!(MySQLType::from_code(20), None);
        assert_eq!(MySQLType::Long.name(), "LONG");
    }

    #[test]
    fn test_tokudb_row_format_aliases() {
        assert_eq!(HaRowType(14).name(), "TOKUDB_ZLIB");
        assert_eq!(HaRowType(12).name(), "TOKUDB_QUICKLZ");
        assert_eq!(HaRowType(13).name(), "TOKUDB_LZMA");
        assert_eq!(HaRowType(5).name(), "COMPACT");
    }

    #[test]
    fn test_field_flag_scale() {
        let flags = FieldFlag::from_bits_retain((2 << FieldFlag::DEC_SHIFT) | 1);
        assert_eq!(flags.scale(), 2);
        assert!(flags.contains(FieldFlag::DECIMAL));
    }

    #[test]
    fn test_handler_option_tri_states() {
        assert_eq!(HaOption::PACK_KEYS.pack_keys(), Some(1));
        assert_eq!(HaOption::NO_PACK_KEYS.pack_keys(), Some(0));
        assert_eq!(HaOption::empty().pack_keys(), None);
        assert_eq!(HaOption::STATS_PERSISTENT.stats_persistent(), Some(1));
    }
}
