//! MySQL character set / collation table.
//!
//! .frm files reference collations by numeric id. The table below covers
//! the collations shipped with MySQL through 5.7: the fixed low ids plus
//! the Unicode collation blocks, which repeat the same language suffixes
//! at fixed bases per character set.

use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    pub id: u16,
    pub name: &'static str,
    pub collation: String,
    pub maxlen: u32,
    /// Whether this collation is the default for its character set, in
    /// which case DDL omits the COLLATE clause.
    pub is_default: bool,
}

// (id, charset, collation, maxlen, default)
const BASE_COLLATIONS: &[(u16, &str, &str, u32, bool)] = &[
    (1, "big5", "big5_chinese_ci", 2, true),
    (2, "latin2", "latin2_czech_cs", 1, false),
    (3, "dec8", "dec8_swedish_ci", 1, true),
    (4, "cp850", "cp850_general_ci", 1, true),
    (5, "latin1", "latin1_german1_ci", 1, false),
    (6, "hp8", "hp8_english_ci", 1, true),
    (7, "koi8r", "koi8r_general_ci", 1, true),
    (8, "latin1", "latin1_swedish_ci", 1, true),
    (9, "latin2", "latin2_general_ci", 1, true),
    (10, "swe7", "swe7_swedish_ci", 1, true),
    (11, "ascii", "ascii_general_ci", 1, true),
    (12, "ujis", "ujis_japanese_ci", 3, true),
    (13, "sjis", "sjis_japanese_ci", 2, true),
    (14, "cp1251", "cp1251_bulgarian_ci", 1, false),
    (15, "latin1", "latin1_danish_ci", 1, false),
    (16, "hebrew", "hebrew_general_ci", 1, true),
    (18, "tis620", "tis620_thai_ci", 1, true),
    (19, "euckr", "euckr_korean_ci", 2, true),
    (20, "latin7", "latin7_estonian_cs", 1, false),
    (21, "latin2", "latin2_hungarian_ci", 1, false),
    (22, "koi8u", "koi8u_general_ci", 1, true),
    (23, "cp1251", "cp1251_ukrainian_ci", 1, false),
    (24, "gb2312", "gb2312_chinese_ci", 2, true),
    (25, "greek", "greek_general_ci", 1, true),
    (26, "cp1250", "cp1250_general_ci", 1, true),
    (27, "latin2", "latin2_croatian_ci", 1, false),
    (28, "gbk", "gbk_chinese_ci", 2, true),
    (29, "cp1257", "cp1257_lithuanian_ci", 1, false),
    (30, "latin5", "latin5_turkish_ci", 1, true),
    (31, "latin1", "latin1_german2_ci", 1, false),
    (32, "armscii8", "armscii8_general_ci", 1, true),
    (33, "utf8", "utf8_general_ci", 3, true),
    (34, "cp1250", "cp1250_czech_cs", 1, false),
    (35, "ucs2", "ucs2_general_ci", 2, true),
    (36, "cp866", "cp866_general_ci", 1, true),
    (37, "keybcs2", "keybcs2_general_ci", 1, true),
    (38, "macce", "macce_general_ci", 1, true),
    (39, "macroman", "macroman_general_ci", 1, true),
    (40, "cp852", "cp852_general_ci", 1, true),
    (41, "latin7", "latin7_general_ci", 1, true),
    (42, "latin7", "latin7_general_cs", 1, false),
    (43, "macce", "macce_bin", 1, false),
    (44, "cp1250", "cp1250_croatian_ci", 1, false),
    (45, "utf8mb4", "utf8mb4_general_ci", 4, true),
    (46, "utf8mb4", "utf8mb4_bin", 4, false),
    (47, "latin1", "latin1_bin", 1, false),
    (48, "latin1", "latin1_general_ci", 1, false),
    (49, "latin1", "latin1_general_cs", 1, false),
    (50, "cp1251", "cp1251_bin", 1, false),
    (51, "cp1251", "cp1251_general_ci", 1, true),
    (52, "cp1251", "cp1251_general_cs", 1, false),
    (53, "macroman", "macroman_bin", 1, false),
    (54, "utf16", "utf16_general_ci", 4, true),
    (55, "utf16", "utf16_bin", 4, false),
    (56, "utf16le", "utf16le_general_ci", 4, true),
    (57, "cp1256", "cp1256_general_ci", 1, true),
    (58, "cp1257", "cp1257_bin", 1, false),
    (59, "cp1257", "cp1257_general_ci", 1, true),
    (60, "utf32", "utf32_general_ci", 4, true),
    (61, "utf32", "utf32_bin", 4, false),
    (62, "utf16le", "utf16le_bin", 4, false),
    (63, "binary", "binary", 1, true),
    (64, "armscii8", "armscii8_bin", 1, false),
    (65, "ascii", "ascii_bin", 1, false),
    (66, "cp1250", "cp1250_bin", 1, false),
    (67, "cp1256", "cp1256_bin", 1, false),
    (68, "cp866", "cp866_bin", 1, false),
    (69, "dec8", "dec8_bin", 1, false),
    (70, "greek", "greek_bin", 1, false),
    (71, "hebrew", "hebrew_bin", 1, false),
    (72, "hp8", "hp8_bin", 1, false),
    (73, "keybcs2", "keybcs2_bin", 1, false),
    (74, "koi8r", "koi8r_bin", 1, false),
    (75, "koi8u", "koi8u_bin", 1, false),
    (77, "latin2", "latin2_bin", 1, false),
    (78, "latin5", "latin5_bin", 1, false),
    (79, "latin7", "latin7_bin", 1, false),
    (80, "cp850", "cp850_bin", 1, false),
    (81, "cp852", "cp852_bin", 1, false),
    (82, "swe7", "swe7_bin", 1, false),
    (83, "utf8", "utf8_bin", 3, false),
    (84, "big5", "big5_bin", 2, false),
    (85, "euckr", "euckr_bin", 2, false),
    (86, "gb2312", "gb2312_bin", 2, false),
    (87, "gbk", "gbk_bin", 2, false),
    (88, "sjis", "sjis_bin", 2, false),
    (89, "tis620", "tis620_bin", 1, false),
    (90, "ucs2", "ucs2_bin", 2, false),
    (91, "ujis", "ujis_bin", 3, false),
    (92, "geostd8", "geostd8_general_ci", 1, true),
    (93, "geostd8", "geostd8_bin", 1, false),
    (94, "latin1", "latin1_spanish_ci", 1, false),
    (95, "cp932", "cp932_japanese_ci", 2, true),
    (96, "cp932", "cp932_bin", 2, false),
    (97, "eucjpms", "eucjpms_japanese_ci", 3, true),
    (98, "eucjpms", "eucjpms_bin", 3, false),
    (99, "cp1250", "cp1250_polish_ci", 1, false),
    (159, "ucs2", "ucs2_general_mysql500_ci", 2, false),
    (223, "utf8", "utf8_general_mysql500_ci", 3, false),
    (255, "utf8mb4", "utf8mb4_0900_ai_ci", 4, false),
];

// Unicode collation suffixes; each character set repeats them from a
// fixed base id (utf16 from 101, ucs2 from 128, utf32 from 160, utf8
// from 192, utf8mb4 from 224).
const UCA_SUFFIXES: &[&str] = &[
    "unicode_ci",
    "icelandic_ci",
    "latvian_ci",
    "romanian_ci",
    "slovenian_ci",
    "polish_ci",
    "estonian_ci",
    "spanish_ci",
    "swedish_ci",
    "turkish_ci",
    "czech_ci",
    "danish_ci",
    "lithuanian_ci",
    "slovak_ci",
    "spanish2_ci",
    "roman_ci",
    "persian_ci",
    "esperanto_ci",
    "hungarian_ci",
    "sinhala_ci",
    "german2_ci",
    "croatian_ci",
    "unicode_520_ci",
    "vietnamese_ci",
];

const UCA_BLOCKS: &[(u16, &str, u32)] = &[
    (101, "utf16", 4),
    (128, "ucs2", 2),
    (160, "utf32", 4),
    (192, "utf8", 3),
    (224, "utf8mb4", 4),
];

static COLLATIONS: LazyLock<Vec<Charset>> = LazyLock::new(|| {
    let mut table: Vec<Charset> = BASE_COLLATIONS
        .iter()
        .map(|&(id, name, collation, maxlen, is_default)| Charset {
            id,
            name,
            collation: collation.to_string(),
            maxlen,
            is_default,
        })
        .collect();
    for &(base, name, maxlen) in UCA_BLOCKS {
        for (offset, suffix) in UCA_SUFFIXES.iter().enumerate() {
            table.push(Charset {
                id: base + offset as u16,
                name,
                collation: format!("{name}_{suffix}"),
                maxlen,
                is_default: false,
            });
        }
    }
    table.sort_by_key(|cs| cs.id);
    table
});

/// Look up a collation by id.
pub fn lookup(id: u16) -> Option<&'static Charset> {
    COLLATIONS
        .binary_search_by_key(&id, |cs| cs.id)
        .ok()
        .map(|idx| &COLLATIONS[idx])
}
