//! Index metadata decoding from the .frm keyinfo section.

use crate::bytes::ByteReader;
use crate::frm::constants::MySQLType;
use crate::frm::{Column, FrmError};
use crate::sqlfmt::{quote_ident, quote_str};

// HA_* key flags from include/my_base.h
const HA_NOSAME: u16 = 1;
const HA_FULLTEXT: u16 = 128;
const HA_SPATIAL: u16 = 1024;
const HA_USES_COMMENT: u16 = 4096;
const HA_USES_PARSER: u16 = 16384;

const BYTES_PER_KEY: usize = 8;
const BYTES_PER_KEY_PART: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAlgorithm {
    Undefined,
    Btree,
    Rtree,
    Hash,
    Fulltext,
}

impl KeyAlgorithm {
    fn from_code(code: u8) -> Result<KeyAlgorithm, FrmError> {
        Ok(match code {
            0 => KeyAlgorithm::Undefined,
            1 => KeyAlgorithm::Btree,
            2 => KeyAlgorithm::Rtree,
            3 => KeyAlgorithm::Hash,
            4 => KeyAlgorithm::Fulltext,
            _ => {
                return Err(FrmError::BadTable {
                    reason: format!("unknown key algorithm {code}"),
                });
            }
        })
    }

    fn name(self) -> &'static str {
        match self {
            KeyAlgorithm::Undefined => "",
            KeyAlgorithm::Btree => "BTREE",
            KeyAlgorithm::Rtree => "RTREE",
            KeyAlgorithm::Hash => "HASH",
            KeyAlgorithm::Fulltext => "FULLTEXT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    Btree,
    Hash,
    Fulltext,
    Spatial,
}

#[derive(Debug, Clone)]
pub struct KeyPart {
    /// Index into the table's column list.
    pub column: usize,
    /// Stored part length in bytes; drives index prefix rendering.
    pub length: u16,
}

#[derive(Debug, Clone)]
pub struct Key {
    pub name: String,
    pub parts: Vec<KeyPart>,
    pub algorithm: KeyAlgorithm,
    pub block_size: u16,
    pub index_type: IndexType,
    pub is_unique: bool,
    pub parser: Option<String>,
    pub comment: Option<String>,
}

impl Key {
    fn format_part(&self, part: &KeyPart, columns: &[Column]) -> String {
        let column = &columns[part.column];
        let mut out = quote_ident(&column.name);
        if matches!(self.index_type, IndexType::Fulltext | IndexType::Spatial) {
            // FULLTEXT/SPATIAL keys never render a prefix
            return out;
        }
        let maybe_prefix = matches!(
            column.type_code,
            MySQLType::Varchar | MySQLType::VarString | MySQLType::String
        );
        let always_prefix = column.type_code.is_blob() || column.type_code == MySQLType::Geometry;
        if (maybe_prefix && u32::from(part.length) != column.length) || always_prefix {
            let prefix = u32::from(part.length) / column.charset.maxlen;
            out.push_str(&format!("({prefix})"));
        }
        out
    }

    pub fn format(&self, columns: &[Column]) -> String {
        let mut components = Vec::new();
        if self.name == "PRIMARY" {
            components.push("PRIMARY KEY".to_string());
        } else if self.is_unique {
            components.push("UNIQUE KEY".to_string());
        } else if self.index_type == IndexType::Fulltext {
            components.push("FULLTEXT KEY".to_string());
        } else if self.index_type == IndexType::Spatial {
            components.push("SPATIAL KEY".to_string());
        } else {
            components.push("KEY".to_string());
        }

        if !self.name.is_empty() && self.name != "PRIMARY" {
            components.push(quote_ident(&self.name));
        }

        let parts = self
            .parts
            .iter()
            .map(|part| self.format_part(part, columns))
            .collect::<Vec<_>>()
            .join(",");
        components.push(format!("({parts})"));

        if self.algorithm != KeyAlgorithm::Undefined {
            components.push(format!("USING {}", self.algorithm.name()));
        }
        if self.block_size != 0 {
            components.push(format!("KEY_BLOCK_SIZE={}", self.block_size));
        }
        if let Some(comment) = &self.comment {
            components.push(format!("COMMENT {}", quote_str(comment)));
        }
        if let Some(parser) = &self.parser {
            // the server emits a trailing space after this comment
            components.push(format!("/*!50100 WITH PARSER {} */ ", quote_ident(parser)));
        }
        components.join(" ")
    }
}

fn decode_utf8(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// Unpack the keyinfo section. `parser_info` is the tail of the extra
/// section holding NUL-terminated fulltext parser plugin names.
pub fn unpack_keys(
    keyinfo: &[u8],
    columns: &[Column],
    parser_info: &mut ByteReader<'_>,
) -> Result<Vec<Key>, FrmError> {
    if keyinfo.is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = ByteReader::new(keyinfo);
    let mut key_count = usize::from(reader.u8()?);
    let key_parts_count;
    if key_count < 128 {
        key_parts_count = usize::from(reader.u8()?);
        reader.skip(2)?;
    } else {
        key_count = (key_count & 0x7f) | (usize::from(reader.u8()?) << 7);
        key_parts_count = usize::from(reader.u16()?);
    }
    let key_extra_length = usize::from(reader.u16()?);

    // names and comments trail the fixed-size key records
    let extra_offset = reader.tell() + key_count * BYTES_PER_KEY + key_parts_count * BYTES_PER_KEY_PART;
    let key_extra = reader.read_at(key_extra_length, extra_offset)?;
    let nul = key_extra.iter().position(|&b| b == 0).ok_or_else(|| {
        FrmError::BadTable {
            reason: "key names are not NUL terminated".to_string(),
        }
    })?;
    let names: Vec<String> = key_extra[..nul]
        .split(|&b| b == 0xff)
        .filter(|chunk| !chunk.is_empty())
        .map(decode_utf8)
        .collect();
    let mut comments = ByteReader::new(&key_extra[nul + 1..]);

    let mut keys = Vec::with_capacity(names.len());
    for name in names {
        let flags = reader.u16()? ^ HA_NOSAME;
        reader.u16()?; // key length
        let parts_count = usize::from(reader.u8()?);
        let algorithm = KeyAlgorithm::from_code(reader.u8()?)?;
        let block_size = reader.u16()?;
        let comment = if flags & HA_USES_COMMENT != 0 {
            Some(decode_utf8(comments.bytes_prefix16()?))
        } else {
            None
        };
        let parser = if flags & HA_USES_PARSER != 0 {
            Some(decode_utf8(parser_info.bytes_nul()?))
        } else {
            None
        };

        let mut parts = Vec::with_capacity(parts_count);
        for _ in 0..parts_count {
            let fieldnr = usize::from(reader.u16()? & 0x3fff);
            reader.u16()?; // offset
            reader.u8()?; // flags
            reader.u16()?; // key type
            let length = reader.u16()?;
            let column = fieldnr.checked_sub(1).filter(|&idx| idx < columns.len());
            let column = column.ok_or_else(|| FrmError::BadTable {
                reason: format!("key '{name}' references field #{fieldnr}"),
            })?;
            parts.push(KeyPart { column, length });
        }

        let index_type = if flags & HA_FULLTEXT != 0 {
            IndexType::Fulltext
        } else if flags & HA_SPATIAL != 0 {
            IndexType::Spatial
        } else if algorithm == KeyAlgorithm::Hash {
            IndexType::Hash
        } else {
            IndexType::Btree
        };

        keys.push(Key {
            name,
            parts,
            algorithm,
            block_size,
            index_type,
            is_unique: flags & HA_NOSAME != 0,
            parser,
            comment,
        });
    }
    Ok(keys)
}
